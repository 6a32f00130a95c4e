//! Error types for sqe-pricing
//!
//! Signal-quality problems degrade the run with a note; only persistence
//! failures are fatal to it.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

/// Inference collaborator failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractionError {
    /// Service down, unreachable or not configured
    #[error("Extraction unavailable: {0}")]
    Unavailable(String),

    /// Quota exhausted; the job should be retried later
    #[error("Extraction rate limited (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    /// Model output could not be decoded
    #[error("Extraction output could not be parsed: {0}")]
    ParseFailed(String),

    #[error("Extraction timed out after {0}s")]
    Timeout(u64),
}

impl ExtractionError {
    /// Human-readable degradation note for the result
    pub fn degradation_note(&self) -> String {
        match self {
            ExtractionError::Unavailable(_) => {
                "Photo analysis was unavailable; price is based on form answers only".to_string()
            }
            ExtractionError::ParseFailed(_) => {
                "Photo analysis returned unreadable results; price is based on form answers only"
                    .to_string()
            }
            ExtractionError::Timeout(secs) => format!(
                "Photo analysis did not finish within {}s; price is based on form answers only",
                secs
            ),
            ExtractionError::RateLimited { .. } => {
                "Photo analysis is busy; pricing will be retried".to_string()
            }
        }
    }
}

/// Pipeline failures
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// No pricing rules for the service (run continues with defaults)
    #[error("No pricing configuration for service {0}")]
    ConfigurationMissing(Uuid),

    /// Reading or writing the data store failed
    #[error("Persistence failure: {0}")]
    Persistence(#[from] sqe_common::Error),

    #[error("Quote not found: {0}")]
    QuoteNotFound(Uuid),
}

impl PipelineError {
    /// Whether the upstream queue should retry the job
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::Persistence(_)
                | PipelineError::Extraction(ExtractionError::RateLimited { .. })
        )
    }

    /// Backoff hint for the upstream queue
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            PipelineError::Extraction(ExtractionError::RateLimited { retry_after_secs }) => {
                Some(*retry_after_secs)
            }
            _ => None,
        }
    }
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Common error: {0}")]
    Common(#[from] sqe_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMON_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
