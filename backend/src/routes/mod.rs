//! Route definitions for the Pharmacy Retail ERP API

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Company and branch management
        .route("/companies", post(handlers::create_company))
        .route(
            "/companies/:company_id",
            get(handlers::get_company).put(handlers::update_company),
        )
        .route(
            "/companies/:company_id/branches",
            get(handlers::list_branches).post(handlers::create_branch),
        )
        // Item master and snapshot-backed search
        .nest("/companies/:company_id/items", item_routes())
        // Document posting
        .nest("/companies/:company_id/documents", document_routes())
        // Stock queries and reports
        .nest("/companies/:company_id/inventory", inventory_routes())
        // Refresh queue administration
        .route(
            "/companies/:company_id/branches/:branch_id/refresh",
            post(handlers::enqueue_branch_refresh),
        )
        .route(
            "/companies/:company_id/refresh/stats",
            get(handlers::get_queue_stats),
        )
        .route(
            "/companies/:company_id/refresh/jobs",
            get(handlers::list_queue_jobs),
        )
        .route("/refresh/run", post(handlers::run_refresh_batch))
}

/// Item master routes
fn item_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_items).post(handlers::create_item))
        .route("/search", get(handlers::search_items))
        .route(
            "/:item_id",
            get(handlers::get_item).put(handlers::update_item),
        )
}

/// Document posting routes
fn document_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/purchase-receipts",
            post(handlers::post_purchase_receipt),
        )
        .route("/sales-invoices", post(handlers::post_sales_invoice))
        .route("/adjustments", post(handlers::post_stock_adjustment))
        .route("/transfers", post(handlers::post_transfer))
        .route("/opening-balances", post(handlers::post_opening_balance))
        .route(
            "/opening-balances/corrections",
            put(handlers::correct_opening_balance),
        )
}

/// Stock and report routes
fn inventory_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/branches/:branch_id/stock",
            get(handlers::list_branch_stock),
        )
        .route(
            "/branches/:branch_id/stock/:item_id",
            get(handlers::get_item_stock),
        )
        .route(
            "/branches/:branch_id/items/:item_id/movements",
            get(handlers::get_movement_report),
        )
        .route(
            "/branches/:branch_id/items/:item_id/movements/export",
            get(handlers::export_movement_report),
        )
        .route(
            "/branches/:branch_id/batches",
            get(handlers::get_batch_report),
        )
        .route(
            "/branches/:branch_id/reconciliation",
            get(handlers::get_reconciliation),
        )
}
