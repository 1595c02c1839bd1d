//! roster-lists library interface
//!
//! Contact list upload and round-robin distribution across the agent roster.
//! Exposes the router and pipeline for integration testing.

pub mod api;
pub mod db;
pub mod error;
pub mod ingest;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;

use crate::ingest::ListPipeline;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Where uploads are staged while a request is processed
    pub uploads_dir: PathBuf,
    /// Largest accepted upload file, in bytes
    pub max_upload_bytes: usize,
    /// Serializes roster fetch through persist across concurrent uploads
    pub distribution_lock: Arc<Mutex<()>>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, uploads_dir: PathBuf) -> Self {
        Self {
            db,
            uploads_dir,
            max_upload_bytes: roster_common::config::DEFAULT_MAX_UPLOAD_BYTES,
            distribution_lock: Arc::new(Mutex::new(())),
            startup_time: Utc::now(),
        }
    }

    pub fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }

    /// Pipeline bound to this state's database and write guard
    pub fn pipeline(&self) -> ListPipeline {
        ListPipeline::new(self.db.clone(), Arc::clone(&self.distribution_lock))
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::list_routes(state.max_upload_bytes))
        .merge(api::agent_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
