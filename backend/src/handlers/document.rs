//! HTTP handlers for document posting

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::document::{
    OpeningBalanceInput, OpeningCorrectionInput, PostedDocument, PurchaseReceiptInput,
    SalesInvoiceInput, StockAdjustmentInput, TransferInput,
};
use crate::services::ledger::OpeningCorrection;
use crate::services::DocumentService;
use crate::AppState;

/// Post a purchase receipt
pub async fn post_purchase_receipt(
    State(state): State<AppState>,
    Path(company_id): Path<Uuid>,
    Json(input): Json<PurchaseReceiptInput>,
) -> AppResult<Json<PostedDocument>> {
    let service = DocumentService::new(state.db.clone(), state.refresher());
    let posted = service.post_purchase_receipt(company_id, input).await?;
    Ok(Json(posted))
}

/// Post a sales invoice
pub async fn post_sales_invoice(
    State(state): State<AppState>,
    Path(company_id): Path<Uuid>,
    Json(input): Json<SalesInvoiceInput>,
) -> AppResult<Json<PostedDocument>> {
    let service = DocumentService::new(state.db.clone(), state.refresher());
    let posted = service.post_sales_invoice(company_id, input).await?;
    Ok(Json(posted))
}

/// Post a stock adjustment
pub async fn post_stock_adjustment(
    State(state): State<AppState>,
    Path(company_id): Path<Uuid>,
    Json(input): Json<StockAdjustmentInput>,
) -> AppResult<Json<PostedDocument>> {
    let service = DocumentService::new(state.db.clone(), state.refresher());
    let posted = service.post_stock_adjustment(company_id, input).await?;
    Ok(Json(posted))
}

/// Post a branch-to-branch transfer
pub async fn post_transfer(
    State(state): State<AppState>,
    Path(company_id): Path<Uuid>,
    Json(input): Json<TransferInput>,
) -> AppResult<Json<PostedDocument>> {
    let service = DocumentService::new(state.db.clone(), state.refresher());
    let posted = service.post_transfer(company_id, input).await?;
    Ok(Json(posted))
}

/// Record opening balances at a branch
pub async fn post_opening_balance(
    State(state): State<AppState>,
    Path(company_id): Path<Uuid>,
    Json(input): Json<OpeningBalanceInput>,
) -> AppResult<Json<PostedDocument>> {
    let service = DocumentService::new(state.db.clone(), state.refresher());
    let posted = service.post_opening_balance(company_id, input).await?;
    Ok(Json(posted))
}

/// Correct a posted opening balance
pub async fn correct_opening_balance(
    State(state): State<AppState>,
    Path(company_id): Path<Uuid>,
    Json(input): Json<OpeningCorrectionInput>,
) -> AppResult<Json<OpeningCorrection>> {
    let service = DocumentService::new(state.db.clone(), state.refresher());
    let correction = service.correct_opening_balance(company_id, input).await?;
    Ok(Json(correction))
}
