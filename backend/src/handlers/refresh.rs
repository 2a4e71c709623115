//! HTTP handlers for refresh queue administration

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::refresh_queue::{QueueStats, RefreshQueueJob};
use crate::services::RefreshQueueService;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct EnqueueBranchInput {
    pub reason: Option<String>,
}

#[derive(Serialize)]
pub struct ProcessBatchResponse {
    pub processed: usize,
}

#[derive(Serialize)]
pub struct EnqueuedResponse {
    pub enqueued: bool,
}

/// Enqueue a branch-wide snapshot refresh (manual corrective trigger)
pub async fn enqueue_branch_refresh(
    State(state): State<AppState>,
    Path((company_id, branch_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<EnqueueBranchInput>,
) -> AppResult<Json<EnqueuedResponse>> {
    let mut conn = state.db.acquire().await?;
    RefreshQueueService::enqueue_branch(
        &mut conn,
        company_id,
        branch_id,
        input.reason.as_deref(),
    )
    .await?;
    Ok(Json(EnqueuedResponse { enqueued: true }))
}

/// Drain one batch of queued refresh jobs immediately
pub async fn run_refresh_batch(
    State(state): State<AppState>,
) -> AppResult<Json<ProcessBatchResponse>> {
    let limit = state.config.refresh.batch_limit;
    let processed = state.refresh_queue().process_batch(limit).await?;
    Ok(Json(ProcessBatchResponse { processed }))
}

/// Queue depth counters for a company
pub async fn get_queue_stats(
    State(state): State<AppState>,
    Path(company_id): Path<Uuid>,
) -> AppResult<Json<QueueStats>> {
    let stats = state.refresh_queue().stats(company_id).await?;
    Ok(Json(stats))
}

/// Unprocessed jobs for a company, oldest first
pub async fn list_queue_jobs(
    State(state): State<AppState>,
    Path(company_id): Path<Uuid>,
    Query(query): Query<ListJobsQuery>,
) -> AppResult<Json<Vec<RefreshQueueJob>>> {
    let jobs = state
        .refresh_queue()
        .list_unprocessed(company_id, query.limit.unwrap_or(100))
        .await?;
    Ok(Json(jobs))
}
