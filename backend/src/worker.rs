//! Background worker draining the snapshot refresh queue
//!
//! Runs as a periodic task separate from request handling. Each cycle
//! claims and processes one batch; crash recovery comes from the queue's
//! stale-claim protocol, not from anything the worker tracks itself.

use std::time::Duration;

use crate::services::RefreshQueueService;

/// Periodic refresh-queue worker
pub struct RefreshWorker {
    queue: RefreshQueueService,
    batch_limit: i64,
    poll_interval: Duration,
}

impl RefreshWorker {
    pub fn new(queue: RefreshQueueService, batch_limit: i64, poll_interval: Duration) -> Self {
        Self {
            queue,
            batch_limit,
            poll_interval,
        }
    }

    /// Run the drain loop until the process exits
    pub async fn run(self) {
        tracing::info!(
            interval_secs = self.poll_interval.as_secs(),
            "Refresh worker started"
        );

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            match self.queue.process_batch(self.batch_limit).await {
                Ok(0) => {}
                Ok(processed) => {
                    tracing::info!(processed, "Refresh worker drained batch");
                }
                Err(e) => {
                    tracing::error!(error = %e, "Refresh worker batch failed");
                }
            }
        }
    }
}
