//! mentora-relay - Workflow Relay Microservice
//!
//! Bridges the Mentora platform to its no-code automation engine:
//! scoring, career recommendation, and content generation run as remote
//! workflows invoked over HTTP webhooks. The relay owns endpoint
//! failover, response normalization, deterministic fallbacks, the
//! result cache, and canonical result persistence.
//!
//! Library interface exposed for integration testing.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod types;

pub use error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use services::orchestrator::ComputeOrchestrator;

/// Application state shared across request handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Orchestrator owning the result cache, webhook client, and engine
    /// endpoint configuration
    pub relay: Arc<ComputeOrchestrator>,
    /// Service startup time for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, relay: ComputeOrchestrator) -> Self {
        Self {
            db,
            relay: Arc::new(relay),
            startup_time: Utc::now(),
        }
    }
}

/// Build the application router with all endpoints
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::compute_routes())
        .merge(api::results_routes())
        .merge(api::cache_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
