//! HTTP client for the extraction service
//!
//! Posts image URLs plus the job context to `<endpoint>/extract` and maps
//! the response to vision-sourced signals. Requests are paced client-side
//! so a burst of jobs does not exhaust the service's quota.

use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use reqwest::{header::RETRY_AFTER, Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{ExtractionContext, ExtractionOutput, InferenceClient};
use crate::error::ExtractionError;
use crate::types::{Signal, SignalSource, SignalValue};

/// Backoff suggested when a 429 carries no usable Retry-After header
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

const CONNECT_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExtractRequest<'a> {
    images: &'a [String],
    context: &'a ExtractionContext,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtractResponse {
    #[serde(default)]
    signals: Vec<RawSignal>,
    #[serde(default)]
    overall_confidence: f64,
    #[serde(default)]
    low_confidence_keys: Vec<String>,
    #[serde(default)]
    warnings: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawSignal {
    key: String,
    value: SignalValue,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    evidence: Option<String>,
}

impl From<ExtractResponse> for ExtractionOutput {
    fn from(response: ExtractResponse) -> Self {
        let signals = response
            .signals
            .into_iter()
            .filter(|raw| !raw.key.trim().is_empty())
            .map(|raw| {
                let signal = Signal::new(raw.key, raw.value, raw.confidence, SignalSource::Vision);
                match raw.evidence {
                    Some(evidence) => signal.with_evidence(evidence),
                    None => signal,
                }
            })
            .collect();
        ExtractionOutput {
            signals,
            overall_confidence: response.overall_confidence.clamp(0.0, 1.0),
            low_confidence_keys: response.low_confidence_keys,
            warnings: response.warnings,
        }
    }
}

/// Extraction service client with timeouts and a per-minute quota
pub struct HttpInferenceClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    rate_limiter: RateLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl HttpInferenceClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
        requests_per_minute: u32,
    ) -> Result<Self, ExtractionError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS).min(timeout))
            .build()
            .map_err(|e| ExtractionError::Unavailable(format!("HTTP client: {}", e)))?;

        let per_minute = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_minute(per_minute));

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key,
            rate_limiter,
        })
    }

    fn extract_url(&self) -> String {
        format!("{}/extract", self.endpoint)
    }
}

#[async_trait]
impl InferenceClient for HttpInferenceClient {
    async fn extract(
        &self,
        images: &[String],
        context: &ExtractionContext,
    ) -> Result<ExtractionOutput, ExtractionError> {
        self.rate_limiter.until_ready().await;

        debug!(images = images.len(), service = %context.service_name, "Requesting extraction");

        let mut request = self
            .client
            .post(self.extract_url())
            .json(&ExtractRequest { images, context });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ExtractionError::Unavailable(format!("request timed out: {}", e))
            } else {
                ExtractionError::Unavailable(format!("request failed: {}", e))
            }
        })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            warn!(retry_after_secs, "Extraction service rate limited the request");
            return Err(ExtractionError::RateLimited { retry_after_secs });
        }
        if !status.is_success() {
            return Err(ExtractionError::Unavailable(format!(
                "extraction service returned {}",
                status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ExtractionError::Unavailable(format!("reading body: {}", e)))?;
        let parsed: ExtractResponse =
            serde_json::from_str(&body).map_err(|e| ExtractionError::ParseFailed(e.to_string()))?;

        let output = ExtractionOutput::from(parsed);
        debug!(
            signals = output.signals.len(),
            confidence = output.overall_confidence,
            "Extraction complete"
        );
        Ok(output)
    }
}
