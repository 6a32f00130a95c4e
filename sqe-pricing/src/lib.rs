//! sqe-pricing library interface
//!
//! Signal fusion and pricing evaluation for service-business quotes, plus
//! the collaborators a worker needs around them (inference client, SQLite
//! persistence, HTTP job surface).

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod fusion;
pub mod inference;
pub mod matching;
pub mod models;
pub mod policy;
pub mod pricing;
pub mod types;
pub mod workflow;

pub use crate::error::{ApiError, ApiResult, ExtractionError, PipelineError};
pub use crate::workflow::{PipelineConfig, PricingPipeline};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<PricingPipeline>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Error of the most recent failed job, cleared by the next success
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(pipeline: Arc<PricingPipeline>) -> Self {
        Self {
            pipeline,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::job_routes())
        .merge(api::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
