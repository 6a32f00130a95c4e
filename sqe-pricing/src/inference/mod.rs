//! Inference collaborator boundary
//!
//! The vision/text extraction service is external. The pipeline talks to it
//! through [`InferenceClient`] and never lets a slow or failing call block a
//! quote: every call is bounded by [`extract_with_timeout`], and failures
//! other than rate limiting degrade to [`ExtractionOutput::no_signals`].

pub mod http_client;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub use http_client::HttpInferenceClient;

use crate::error::ExtractionError;
use crate::types::{Confidence, ExpectedSignalDef, Signal};

/// Confidence reported when no photos were expected or supplied
pub const NO_SIGNAL_CONFIDENCE: Confidence = 0.3;

/// What the extraction service is told about the job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionContext {
    pub service_name: String,
    pub expected_signals: Vec<ExpectedSignalDef>,
    pub customer_notes: String,
    pub photos_required: bool,
}

/// Signals extracted from photos and text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionOutput {
    pub signals: Vec<Signal>,
    pub overall_confidence: Confidence,
    #[serde(default)]
    pub low_confidence_keys: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl ExtractionOutput {
    /// Default used when extraction produced nothing usable
    ///
    /// Photos that were optional (or never uploaded) leave the estimate
    /// resting on form answers at a modest 0.3. Required photos that could
    /// not be read give 0 and a warning explaining why.
    pub fn no_signals(photos_required: bool, images_present: bool) -> Self {
        if !photos_required || !images_present {
            return Self {
                overall_confidence: NO_SIGNAL_CONFIDENCE,
                ..Default::default()
            };
        }
        Self {
            overall_confidence: 0.0,
            warnings: vec![
                "Photos were required but could not be analysed; estimate is unverified"
                    .to_string(),
            ],
            ..Default::default()
        }
    }
}

/// Vision/text extraction service
#[async_trait]
pub trait InferenceClient: Send + Sync {
    async fn extract(
        &self,
        images: &[String],
        context: &ExtractionContext,
    ) -> Result<ExtractionOutput, ExtractionError>;
}

/// Run one extraction bounded by `timeout`
pub async fn extract_with_timeout(
    client: &dyn InferenceClient,
    images: &[String],
    context: &ExtractionContext,
    timeout: Duration,
) -> Result<ExtractionOutput, ExtractionError> {
    match tokio::time::timeout(timeout, client.extract(images, context)).await {
        Ok(result) => result,
        Err(_) => {
            warn!(timeout_secs = timeout.as_secs(), "Extraction timed out");
            Err(ExtractionError::Timeout(timeout.as_secs()))
        }
    }
}

/// Client used when no inference endpoint is configured
pub struct DisabledInferenceClient;

#[async_trait]
impl InferenceClient for DisabledInferenceClient {
    async fn extract(
        &self,
        _images: &[String],
        _context: &ExtractionContext,
    ) -> Result<ExtractionOutput, ExtractionError> {
        Err(ExtractionError::Unavailable(
            "no inference endpoint configured".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowClient;

    #[async_trait]
    impl InferenceClient for SlowClient {
        async fn extract(
            &self,
            _images: &[String],
            _context: &ExtractionContext,
        ) -> Result<ExtractionOutput, ExtractionError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(ExtractionOutput::default())
        }
    }

    #[test]
    fn test_no_signal_defaults() {
        let optional = ExtractionOutput::no_signals(false, true);
        assert_eq!(optional.overall_confidence, 0.3);
        assert!(optional.warnings.is_empty());

        let absent = ExtractionOutput::no_signals(true, false);
        assert_eq!(absent.overall_confidence, 0.3);

        let unreadable = ExtractionOutput::no_signals(true, true);
        assert_eq!(unreadable.overall_confidence, 0.0);
        assert_eq!(unreadable.warnings.len(), 1);
        assert!(unreadable.signals.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_wrapper() {
        let result = extract_with_timeout(
            &SlowClient,
            &[],
            &ExtractionContext::default(),
            Duration::from_millis(20),
        )
        .await;
        assert_eq!(result, Err(ExtractionError::Timeout(0)));
    }

    #[tokio::test]
    async fn test_disabled_client_is_unavailable() {
        let result = DisabledInferenceClient
            .extract(&[], &ExtractionContext::default())
            .await;
        assert!(matches!(result, Err(ExtractionError::Unavailable(_))));
    }
}
