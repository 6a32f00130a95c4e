//! Confidence and fallback policy
//!
//! Decides whether an automated price can go out as-is, and if not, what
//! the tenant's chosen fallback mode does with it.

pub mod confidence;
pub mod fallback;
pub mod site_visit;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::info;

pub use confidence::{ConfidenceAssessment, ConfidenceAssessor, ConfidenceBasis, GLOBAL_KEYS};
pub use fallback::{strategy_for, FallbackStrategy, FallbackTrigger, StrategyOutcome};
pub use site_visit::{price_range, site_visit_reason};

use crate::models::{FallbackMode, PriceRange, QuoteStatus, ServiceConfig, SiteVisitRules};
use crate::pricing::money::fmt_money;
use crate::types::{Confidence, FusedSignals};

/// Final policy decision for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackDecision {
    pub triggered: bool,
    pub mode: FallbackMode,
    pub reason: String,
    pub low_confidence_signal_keys: Vec<String>,
    pub status_override: QuoteStatus,
    pub notes: Vec<String>,
    pub overall_confidence: Confidence,
    pub show_range: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<PriceRange>,
    pub site_visit_recommended: bool,
}

/// Everything the policy reads beyond the service config
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyInputs<'a> {
    /// Keys referenced by triggered work steps
    pub referenced_keys: Option<&'a BTreeSet<String>>,
    /// Scalar from the inference service, used when no signals were fused
    pub legacy_confidence: Option<Confidence>,
    /// Keys the inference service reported as uncertain
    pub reported_low_keys: &'a [String],
    pub site_visit_rules: Option<&'a SiteVisitRules>,
}

/// Decide the final status for a priced quote
pub fn decide(
    service_config: &ServiceConfig,
    fused: &FusedSignals,
    price_total: f64,
    inputs: PolicyInputs<'_>,
) -> FallbackDecision {
    let empty = BTreeSet::new();
    let referenced = inputs.referenced_keys.unwrap_or(&empty);
    let assessment = ConfidenceAssessor::new(service_config.low_signal_threshold).assess(
        fused,
        referenced,
        inputs.legacy_confidence,
        inputs.reported_low_keys,
    );

    let mut reasons = Vec::new();
    if assessment.overall < service_config.confidence_threshold {
        reasons.push(format!(
            "overall confidence {:.0}% below {:.0}%",
            assessment.overall * 100.0,
            service_config.confidence_threshold * 100.0
        ));
    }
    if !assessment.low_confidence_keys.is_empty() {
        reasons.push(format!(
            "low confidence in {}",
            assessment.low_confidence_keys.join(", ")
        ));
    }
    if let Some(limit) = service_config.high_value_threshold {
        if price_total > limit {
            reasons.push(format!(
                "total {} above review threshold {}",
                fmt_money(price_total),
                fmt_money(limit)
            ));
        }
    }

    let mode = service_config.fallback_mode;
    let mut decision = FallbackDecision {
        triggered: !reasons.is_empty(),
        mode,
        reason: String::new(),
        low_confidence_signal_keys: assessment.low_confidence_keys.clone(),
        status_override: QuoteStatus::Sent,
        notes: Vec::new(),
        overall_confidence: assessment.overall,
        show_range: false,
        range: None,
        site_visit_recommended: false,
    };

    if decision.triggered {
        let trigger = FallbackTrigger {
            overall_confidence: assessment.overall,
            low_confidence_keys: assessment.low_confidence_keys,
            reasons,
        };
        let outcome = strategy_for(mode).decide(&trigger);
        decision.reason = trigger.reason();
        decision.status_override = outcome.status;
        decision.notes = outcome.notes;
        decision.show_range = outcome.show_range;
        decision.site_visit_recommended = outcome.site_visit_recommended;
        if outcome.show_range {
            decision.range = Some(price_range(price_total, service_config.range_spread_percent));
        }
    }

    if let Some(rules) = inputs.site_visit_rules {
        if let Some(why) = site_visit_reason(rules, assessment.overall, price_total, fused) {
            if !decision.site_visit_recommended {
                decision
                    .notes
                    .push(format!("A site visit is recommended ({})", why));
            }
            decision.site_visit_recommended = true;
        }
    }

    info!(
        triggered = decision.triggered,
        mode = %mode,
        status = %decision.status_override,
        confidence = decision.overall_confidence,
        "Fallback decision"
    );
    decision
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Signal, SignalSource, SignalValue};

    fn fused_with(confidence: f64) -> FusedSignals {
        FusedSignals {
            signals: vec![Signal::new("window_count", SignalValue::Number(4.0), confidence, SignalSource::Vision)],
            ..Default::default()
        }
    }

    #[test]
    fn test_confident_quote_is_sent_untouched() {
        let d = decide(&ServiceConfig::default(), &fused_with(0.9), 500.0, PolicyInputs::default());
        assert!(!d.triggered);
        assert_eq!(d.status_override, QuoteStatus::Sent);
        assert!(d.notes.is_empty());
        assert!(d.range.is_none());
    }

    #[test]
    fn test_low_overall_confidence_shows_range_by_default() {
        let d = decide(&ServiceConfig::default(), &fused_with(0.65), 1000.0, PolicyInputs::default());
        assert!(d.triggered);
        assert_eq!(d.mode, FallbackMode::ShowRange);
        assert_eq!(d.status_override, QuoteStatus::Sent);
        assert_eq!(d.range, Some(PriceRange { low: 850.0, high: 1150.0 }));
        // unreferenced key does not count as low confidence
        assert!(d.low_confidence_signal_keys.is_empty());
    }

    #[test]
    fn test_referenced_low_signal_triggers_review() {
        let config = ServiceConfig {
            fallback_mode: FallbackMode::RequireReview,
            confidence_threshold: 0.3,
            ..Default::default()
        };
        let referenced: BTreeSet<String> = ["window_count".to_string()].into_iter().collect();
        let d = decide(
            &config,
            &fused_with(0.5),
            100.0,
            PolicyInputs {
                referenced_keys: Some(&referenced),
                ..Default::default()
            },
        );
        assert!(d.triggered);
        assert_eq!(d.status_override, QuoteStatus::PendingReview);
        assert_eq!(d.low_confidence_signal_keys, vec!["window_count".to_string()]);
    }

    #[test]
    fn test_high_value_threshold() {
        let config = ServiceConfig {
            high_value_threshold: Some(5000.0),
            fallback_mode: FallbackMode::RecommendSiteVisit,
            ..Default::default()
        };
        let d = decide(&config, &fused_with(0.95), 7500.0, PolicyInputs::default());
        assert!(d.triggered);
        assert!(d.site_visit_recommended);
        assert!(d.reason.contains("7500.00"));
    }

    #[test]
    fn test_site_visit_rules_add_note_without_trigger() {
        let rules = SiteVisitRules {
            always_recommend: true,
            ..Default::default()
        };
        let d = decide(
            &ServiceConfig::default(),
            &fused_with(0.9),
            100.0,
            PolicyInputs {
                site_visit_rules: Some(&rules),
                ..Default::default()
            },
        );
        assert!(!d.triggered);
        assert!(d.site_visit_recommended);
        assert_eq!(d.notes.len(), 1);
    }
}
