//! Job endpoints
//!
//! `POST /jobs` runs one pricing job and answers with the job output, so
//! the caller decides on retries from `success`/`retryable`.
//! `GET /quotes/{id}/result` returns the stored result record.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{get, post},
    Json, Router,
};
use tracing::debug;
use uuid::Uuid;

use crate::db::QuoteRepository;
use crate::error::{ApiError, ApiResult};
use crate::models::{JobOutput, PricingJob, QuoteRecord};
use crate::AppState;

/// POST /jobs
pub async fn run_job(
    State(state): State<AppState>,
    payload: Result<Json<PricingJob>, JsonRejection>,
) -> ApiResult<Json<JobOutput>> {
    let Json(job) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    debug!(quote_id = %job.quote_id, "Job received over HTTP");

    let output = state.pipeline.run(&job).await;

    let mut last_error = state.last_error.write().await;
    *last_error = output.error.clone();

    Ok(Json(output))
}

/// GET /quotes/:quote_id/result
pub async fn get_result(
    State(state): State<AppState>,
    Path(quote_id): Path<Uuid>,
) -> ApiResult<Json<QuoteRecord>> {
    state
        .pipeline
        .repository()
        .load_result(quote_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No pricing result for quote {}", quote_id)))
}

/// Build job routes
pub fn job_routes() -> Router<AppState> {
    Router::new()
        .route("/jobs", post(run_job))
        .route("/quotes/:quote_id/result", get(get_result))
}
