//! Service definition and per-service review policy settings

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::types::ExpectedSignalDef;

/// Business-selected policy for low-confidence or high-value estimates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackMode {
    /// Hold for manual approval before any outbound notification
    RequireReview,
    /// Send, recommending a site visit
    RecommendSiteVisit,
    /// Send, asking the customer for more information
    RequestMoreInfo,
    /// Send with a price range subject to confirmation
    #[default]
    ShowRange,
}

impl FallbackMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RequireReview => "require_review",
            Self::RecommendSiteVisit => "recommend_site_visit",
            Self::RequestMoreInfo => "request_more_info",
            Self::ShowRange => "show_range",
        }
    }
}

impl fmt::Display for FallbackMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Review policy settings stored on the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceConfig {
    /// Overall confidence below this triggers the fallback
    pub confidence_threshold: f64,
    /// A referenced signal below this counts as low confidence
    pub low_signal_threshold: f64,
    /// Totals above this trigger the fallback
    pub high_value_threshold: Option<f64>,
    pub fallback_mode: FallbackMode,
    /// Half-width of the displayed range, in percent of the total
    pub range_spread_percent: f64,
    /// Whether the customer had to provide photos
    pub photos_required: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.7,
            low_signal_threshold: 0.6,
            high_value_threshold: None,
            fallback_mode: FallbackMode::ShowRange,
            range_spread_percent: 15.0,
            photos_required: false,
        }
    }
}

/// Service offered by a tenant
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Service {
    pub id: Uuid,
    pub name: String,
    /// Work bundled into the base service
    pub scope_includes: Vec<String>,
    /// Work the business explicitly does not offer
    pub scope_excludes: Vec<String>,
    /// Keywords used to suggest this service from another quote's text
    pub keywords: Vec<String>,
    pub expected_signals: Vec<ExpectedSignalDef>,
    pub config: ServiceConfig,
}

/// Per-run context the evaluator needs beyond configuration and signals
#[derive(Debug, Clone, Default)]
pub struct JobData {
    pub service: Service,
    pub customer_notes: String,
    pub other_services: Vec<Service>,
    /// Legacy single-scalar confidence from the inference collaborator
    pub legacy_confidence: Option<f64>,
}
