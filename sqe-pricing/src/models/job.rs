//! Job input/output contracts and the persisted quote record

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::models::pricing_config::{PricingConfiguration, TaxConfig};
use crate::models::service::Service;
use crate::models::trace::{PricingResult, PricingTrace};
use crate::policy::FallbackDecision;
use crate::types::{FormAnswers, FusedSignals, WidgetFieldDef};

/// Decoded queue job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingJob {
    pub quote_id: Uuid,
    pub quote_request_id: Uuid,
    pub tenant_id: Uuid,
    #[serde(default)]
    pub retry_count: u32,
}

/// Final status written back with the price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    PendingReview,
    Sent,
}

impl QuoteStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PendingReview => "pending_review",
            Self::Sent => "sent",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending_review" => Some(Self::PendingReview),
            "sent" => Some(Self::Sent),
            _ => None,
        }
    }
}

impl fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result handed back to the queue consumer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOutput {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<PricingResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<PricingTrace>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<QuoteStatus>,
    /// Whether the upstream queue should retry this job
    #[serde(default)]
    pub retryable: bool,
    /// Suggested backoff before retrying (rate limits ask for longer waits)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

impl JobOutput {
    pub fn failed(error: impl Into<String>, retryable: bool, retry_after_secs: Option<u64>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            price: None,
            trace: None,
            status: None,
            retryable,
            retry_after_secs,
        }
    }
}

/// Everything the pipeline reads for one quote
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuoteContext {
    pub quote_id: Uuid,
    pub tenant_id: Uuid,
    pub service: Service,
    /// None when the tenant never configured pricing for this service
    pub pricing: Option<PricingConfiguration>,
    pub widget_fields: Vec<WidgetFieldDef>,
    pub tax: TaxConfig,
    pub currency: String,
    pub form_answers: FormAnswers,
    pub customer_notes: String,
    pub image_urls: Vec<String>,
    pub other_services: Vec<Service>,
}

/// One complete result written per run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRecord {
    pub quote_id: Uuid,
    pub price: PricingResult,
    pub trace: PricingTrace,
    pub fused_signals: FusedSignals,
    pub decision: FallbackDecision,
    pub final_status: QuoteStatus,
}
