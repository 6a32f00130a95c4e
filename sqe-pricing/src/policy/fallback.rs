//! Fallback strategies
//!
//! One strategy per tenant-selected mode. Each maps the trigger state to a
//! final status and notes; none performs I/O.

use crate::models::{FallbackMode, QuoteStatus};

/// Why the fallback fired
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackTrigger {
    pub overall_confidence: f64,
    pub low_confidence_keys: Vec<String>,
    /// Human-readable trigger reasons, in detection order
    pub reasons: Vec<String>,
}

impl FallbackTrigger {
    pub fn reason(&self) -> String {
        self.reasons.join("; ")
    }
}

/// What a strategy decided
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyOutcome {
    pub status: QuoteStatus,
    pub notes: Vec<String>,
    pub show_range: bool,
    pub site_visit_recommended: bool,
}

impl StrategyOutcome {
    fn send(note: String) -> Self {
        Self {
            status: QuoteStatus::Sent,
            notes: vec![note],
            show_range: false,
            site_visit_recommended: false,
        }
    }
}

/// Policy applied when the fallback fires
pub trait FallbackStrategy: Send + Sync {
    fn mode(&self) -> FallbackMode;

    fn decide(&self, trigger: &FallbackTrigger) -> StrategyOutcome;
}

/// Hold for manual approval
pub struct RequireReview;

impl FallbackStrategy for RequireReview {
    fn mode(&self) -> FallbackMode {
        FallbackMode::RequireReview
    }

    fn decide(&self, trigger: &FallbackTrigger) -> StrategyOutcome {
        StrategyOutcome {
            status: QuoteStatus::PendingReview,
            notes: vec![format!("Held for review before sending: {}", trigger.reason())],
            show_range: false,
            site_visit_recommended: false,
        }
    }
}

/// Send, recommending a site visit
pub struct RecommendSiteVisit;

impl FallbackStrategy for RecommendSiteVisit {
    fn mode(&self) -> FallbackMode {
        FallbackMode::RecommendSiteVisit
    }

    fn decide(&self, _trigger: &FallbackTrigger) -> StrategyOutcome {
        StrategyOutcome {
            site_visit_recommended: true,
            ..StrategyOutcome::send(
                "We recommend a site visit to confirm this estimate before work begins".to_string(),
            )
        }
    }
}

/// Send, asking the customer for more information
pub struct RequestMoreInfo;

impl FallbackStrategy for RequestMoreInfo {
    fn mode(&self) -> FallbackMode {
        FallbackMode::RequestMoreInfo
    }

    fn decide(&self, trigger: &FallbackTrigger) -> StrategyOutcome {
        let note = if trigger.low_confidence_keys.is_empty() {
            "A few more details or photos would help us confirm this price".to_string()
        } else {
            let fields = trigger
                .low_confidence_keys
                .iter()
                .map(|k| k.replace('_', " "))
                .collect::<Vec<_>>()
                .join(", ");
            format!("More information would help us confirm this price: {}", fields)
        };
        StrategyOutcome::send(note)
    }
}

/// Send with a range, subject to confirmation
pub struct ShowRange;

impl FallbackStrategy for ShowRange {
    fn mode(&self) -> FallbackMode {
        FallbackMode::ShowRange
    }

    fn decide(&self, _trigger: &FallbackTrigger) -> StrategyOutcome {
        StrategyOutcome {
            show_range: true,
            ..StrategyOutcome::send("This price is an estimate and subject to confirmation".to_string())
        }
    }
}

/// Strategy for a configured mode
pub fn strategy_for(mode: FallbackMode) -> &'static dyn FallbackStrategy {
    match mode {
        FallbackMode::RequireReview => &RequireReview,
        FallbackMode::RecommendSiteVisit => &RecommendSiteVisit,
        FallbackMode::RequestMoreInfo => &RequestMoreInfo,
        FallbackMode::ShowRange => &ShowRange,
    }
}
