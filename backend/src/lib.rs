//! Pharmacy Retail ERP backend library
//!
//! Multi-tenant pharmacy retail backend: company/branch management,
//! append-only inventory ledger, snapshot consistency engine, document
//! posting, pricing and reporting.

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod services;
pub mod worker;

pub use config::Config;

use services::{RefreshQueueService, SnapshotRefresher};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub config: Arc<Config>,
}

impl AppState {
    /// Snapshot refresher configured from this process's settings
    pub fn refresher(&self) -> SnapshotRefresher {
        SnapshotRefresher::new(self.db.clone(), self.config.refresh.chunk_size)
    }

    /// Refresh queue configured from this process's settings
    pub fn refresh_queue(&self) -> RefreshQueueService {
        RefreshQueueService::new(
            self.db.clone(),
            self.refresher(),
            self.config.refresh.stale_claim_secs,
        )
    }
}

/// Create the application router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .nest("/api/v1", routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Root endpoint
async fn root() -> &'static str {
    "Pharmacy Retail ERP API v1.0"
}

/// Liveness endpoint (no database check)
async fn health() -> &'static str {
    "OK"
}
