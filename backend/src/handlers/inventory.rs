//! HTTP handlers for stock queries and ledger-backed reports

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use shared::DateRange;

use crate::error::{AppError, AppResult};
use crate::services::reporting::{BatchReportRow, MovementReport, ReconciliationReport};
use crate::services::snapshot::ItemSnapshot;
use crate::services::{ReportingService, SnapshotService};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct BatchReportQuery {
    pub item_id: Option<Uuid>,
}

/// Stock overview of a branch from the snapshot table
pub async fn list_branch_stock(
    State(state): State<AppState>,
    Path((company_id, branch_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<Vec<ItemSnapshot>>> {
    let service = SnapshotService::new(state.db);
    let snapshots = service.list_branch(company_id, branch_id).await?;
    Ok(Json(snapshots))
}

/// Stock of one pair from the snapshot table
pub async fn get_item_stock(
    State(state): State<AppState>,
    Path((company_id, branch_id, item_id)): Path<(Uuid, Uuid, Uuid)>,
) -> AppResult<Json<ItemSnapshot>> {
    let service = SnapshotService::new(state.db);
    let snapshot = service
        .get(company_id, branch_id, item_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Snapshot".to_string()))?;
    Ok(Json(snapshot))
}

/// Movement report for one pair
pub async fn get_movement_report(
    State(state): State<AppState>,
    Path((company_id, branch_id, item_id)): Path<(Uuid, Uuid, Uuid)>,
    Query(range): Query<DateRange>,
) -> AppResult<Json<MovementReport>> {
    let service = ReportingService::new(state.db);
    let report = service
        .movement_report(company_id, branch_id, item_id, range)
        .await?;
    Ok(Json(report))
}

/// Movement report for one pair as CSV
pub async fn export_movement_report(
    State(state): State<AppState>,
    Path((company_id, branch_id, item_id)): Path<(Uuid, Uuid, Uuid)>,
    Query(range): Query<DateRange>,
) -> AppResult<impl IntoResponse> {
    let service = ReportingService::new(state.db);
    let report = service
        .movement_report(company_id, branch_id, item_id, range)
        .await?;
    let csv = ReportingService::export_movements_csv(&report)?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"movements.csv\"",
            ),
        ],
        csv,
    ))
}

/// Batch stock report for a branch
pub async fn get_batch_report(
    State(state): State<AppState>,
    Path((company_id, branch_id)): Path<(Uuid, Uuid)>,
    Query(query): Query<BatchReportQuery>,
) -> AppResult<Json<Vec<BatchReportRow>>> {
    let service = ReportingService::new(state.db);
    let rows = service
        .batch_report(company_id, branch_id, query.item_id)
        .await?;
    Ok(Json(rows))
}

/// Snapshot-vs-ledger reconciliation diagnostic for a branch
pub async fn get_reconciliation(
    State(state): State<AppState>,
    Path((company_id, branch_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<ReconciliationReport>> {
    let service = ReportingService::new(state.db);
    let report = service.reconciliation(company_id, branch_id).await?;
    Ok(Json(report))
}
