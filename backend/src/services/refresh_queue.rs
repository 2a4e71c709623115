//! Durable, deduplicated work queue for deferred snapshot recomputation

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::refresher::SnapshotRefresher;

/// A queued refresh job. `item_id` null means every active item in the
/// branch.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RefreshQueueJob {
    pub id: Uuid,
    pub company_id: Uuid,
    pub branch_id: Uuid,
    pub item_id: Option<Uuid>,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
}

/// Queue depth counters for operational diagnostics
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct QueueStats {
    pub pending: i64,
    pub claimed: i64,
    pub processed: i64,
}

/// Number of committed chunks a branch of `total_items` produces
pub fn chunk_count(total_items: i64, chunk_size: i64) -> i64 {
    if total_items <= 0 {
        return 0;
    }
    (total_items + chunk_size - 1) / chunk_size
}

/// Whether a job may be claimed: unprocessed, and either never claimed
/// or claimed long enough ago that the worker is presumed dead
pub fn claim_eligible(
    claimed_at: Option<DateTime<Utc>>,
    processed_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    stale_claim_secs: i64,
) -> bool {
    if processed_at.is_some() {
        return false;
    }
    match claimed_at {
        None => true,
        Some(claimed) => (now - claimed).num_seconds() > stale_claim_secs,
    }
}

/// Refresh queue service: enqueue on the write path, drain from the
/// background worker
#[derive(Clone)]
pub struct RefreshQueueService {
    db: PgPool,
    refresher: SnapshotRefresher,
    stale_claim_secs: i64,
}

impl RefreshQueueService {
    /// Create a new RefreshQueueService instance
    pub fn new(db: PgPool, refresher: SnapshotRefresher, stale_claim_secs: i64) -> Self {
        Self {
            db,
            refresher,
            stale_claim_secs,
        }
    }

    /// Enqueue a branch-wide job unless an unprocessed one already
    /// exists. Single conditional-insert statement; a lost race at worst
    /// produces a duplicate job, which idempotent processing absorbs.
    pub async fn enqueue_branch(
        conn: &mut PgConnection,
        company_id: Uuid,
        branch_id: Uuid,
        reason: Option<&str>,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO snapshot_refresh_queue (company_id, branch_id, item_id, reason)
            SELECT $1, $2, NULL, $3
            WHERE NOT EXISTS (
                SELECT 1 FROM snapshot_refresh_queue
                WHERE company_id = $1 AND branch_id = $2
                  AND item_id IS NULL AND processed_at IS NULL
            )
            "#,
        )
        .bind(company_id)
        .bind(branch_id)
        .bind(reason)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Enqueue one deduplicated job per item
    pub async fn enqueue_items(
        conn: &mut PgConnection,
        company_id: Uuid,
        branch_id: Uuid,
        item_ids: &[Uuid],
    ) -> AppResult<()> {
        let mut seen = HashSet::new();
        for item_id in item_ids.iter().filter(|id| seen.insert(**id)) {
            sqlx::query(
                r#"
                INSERT INTO snapshot_refresh_queue (company_id, branch_id, item_id)
                SELECT $1, $2, $3
                WHERE NOT EXISTS (
                    SELECT 1 FROM snapshot_refresh_queue
                    WHERE company_id = $1 AND branch_id = $2
                      AND item_id = $3 AND processed_at IS NULL
                )
                "#,
            )
            .bind(company_id)
            .bind(branch_id)
            .bind(item_id)
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }

    /// Claim up to `limit` eligible jobs in one atomic statement.
    /// SKIP LOCKED lets concurrent workers pass over rows another worker
    /// is claiming, so no two workers process the same job.
    async fn claim_batch(&self, limit: i64) -> AppResult<Vec<RefreshQueueJob>> {
        let jobs = sqlx::query_as::<_, RefreshQueueJob>(
            r#"
            WITH claimable AS (
                SELECT id
                FROM snapshot_refresh_queue
                WHERE processed_at IS NULL
                  AND (claimed_at IS NULL
                       OR claimed_at < now() - make_interval(secs => $2))
                ORDER BY created_at ASC, id ASC
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE snapshot_refresh_queue q
            SET claimed_at = now()
            FROM claimable c
            WHERE q.id = c.id
            RETURNING q.id, q.company_id, q.branch_id, q.item_id, q.reason,
                      q.created_at, q.claimed_at, q.processed_at
            "#,
        )
        .bind(limit)
        .bind(self.stale_claim_secs as f64)
        .fetch_all(&self.db)
        .await?;

        Ok(jobs)
    }

    /// Drain one batch of up to `limit` queued jobs. Returns the number
    /// of jobs fully processed. A failing job is logged and left claimed;
    /// its claim goes stale and a later cycle retries it.
    pub async fn process_batch(&self, limit: i64) -> AppResult<usize> {
        let jobs = self.claim_batch(limit).await?;
        let mut processed = 0;

        for job in jobs {
            let outcome = match job.item_id {
                Some(item_id) => self.process_item_job(&job, item_id).await,
                None => self.process_branch_job(&job).await,
            };
            match outcome {
                Ok(()) => processed += 1,
                Err(e) => {
                    tracing::warn!(
                        job_id = %job.id, company_id = %job.company_id,
                        branch_id = %job.branch_id, error = %e,
                        "Refresh job failed; claim left to go stale for retry"
                    );
                }
            }
        }

        Ok(processed)
    }

    /// Item-scoped job: refresh the pair in its own transaction, then
    /// mark processed
    async fn process_item_job(&self, job: &RefreshQueueJob, item_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        SnapshotRefresher::refresh_item_sync(&mut tx, job.company_id, job.branch_id, item_id)
            .await?;
        tx.commit().await?;
        self.mark_processed(job.id).await
    }

    /// Branch-wide job: the claim was already committed by claim_batch,
    /// so other workers cannot re-claim it mid-processing. Iterate the
    /// branch in chunk-size pages, committing per chunk and renewing the
    /// lease after each commit so a long branch outlives the stale
    /// window. Marked processed only once the whole branch is covered;
    /// a crash mid-branch leaves the claim to go stale and the job
    /// restarts from the beginning (idempotent, merely wasteful).
    async fn process_branch_job(&self, job: &RefreshQueueJob) -> AppResult<()> {
        let mut cursor: Option<Uuid> = None;
        loop {
            let chunk = self
                .refresher
                .refresh_chunk(job.company_id, job.branch_id, cursor)
                .await?;
            cursor = chunk.next_cursor;
            self.extend_lease(job.id).await?;
            if chunk.exhausted {
                break;
            }
        }
        self.mark_processed(job.id).await
    }

    async fn mark_processed(&self, job_id: Uuid) -> AppResult<()> {
        sqlx::query("UPDATE snapshot_refresh_queue SET processed_at = now() WHERE id = $1")
            .bind(job_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn extend_lease(&self, job_id: Uuid) -> AppResult<()> {
        sqlx::query(
            "UPDATE snapshot_refresh_queue SET claimed_at = now() WHERE id = $1 AND processed_at IS NULL",
        )
        .bind(job_id)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    /// Queue depth for a company (operational diagnostics)
    pub async fn stats(&self, company_id: Uuid) -> AppResult<QueueStats> {
        let stats = sqlx::query_as::<_, QueueStats>(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE processed_at IS NULL AND claimed_at IS NULL) AS pending,
                COUNT(*) FILTER (WHERE processed_at IS NULL AND claimed_at IS NOT NULL) AS claimed,
                COUNT(*) FILTER (WHERE processed_at IS NOT NULL) AS processed
            FROM snapshot_refresh_queue
            WHERE company_id = $1
            "#,
        )
        .bind(company_id)
        .fetch_one(&self.db)
        .await?;

        Ok(stats)
    }

    /// Unprocessed jobs for a company, oldest first (diagnostics view)
    pub async fn list_unprocessed(
        &self,
        company_id: Uuid,
        limit: i64,
    ) -> AppResult<Vec<RefreshQueueJob>> {
        let jobs = sqlx::query_as::<_, RefreshQueueJob>(
            r#"
            SELECT id, company_id, branch_id, item_id, reason,
                   created_at, claimed_at, processed_at
            FROM snapshot_refresh_queue
            WHERE company_id = $1 AND processed_at IS NULL
            ORDER BY created_at ASC, id ASC
            LIMIT $2
            "#,
        )
        .bind(company_id)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        Ok(jobs)
    }
}
