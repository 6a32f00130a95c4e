//! Confidence assessment
//!
//! Overall confidence is the fused set's mean confidence whenever the set
//! holds any signal (form answers count at 1.0), else the legacy scalar
//! reported by the inference service.
//! A signal only counts as low confidence when something that priced the
//! job actually used it. Keys the inference service itself reported as
//! uncertain are held to the same rule.

use std::collections::BTreeSet;

use tracing::debug;

use crate::types::{Confidence, FusedSignals};

/// Keys that always matter, whether or not a work step references them
pub const GLOBAL_KEYS: &[&str] = &[
    "condition",
    "condition_rating",
    "complexity",
    "complexity_level",
    "access",
    "access_difficulty",
];

/// Where the overall confidence came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceBasis {
    FusedSignals,
    LegacyScalar,
    /// Nothing observed; the price rests on configuration alone
    ConfigurationOnly,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfidenceAssessment {
    pub overall: Confidence,
    pub basis: ConfidenceBasis,
    /// Referenced signals below the per-signal threshold, sorted
    pub low_confidence_keys: Vec<String>,
}

/// Confidence assessor
pub struct ConfidenceAssessor {
    /// A referenced signal below this counts as low confidence
    low_signal_threshold: f64,
}

impl ConfidenceAssessor {
    pub fn new(low_signal_threshold: f64) -> Self {
        Self {
            low_signal_threshold,
        }
    }

    /// `reported_low_keys` are the keys the inference service flagged as
    /// uncertain. They count only while the fused value still comes from
    /// inference; a form answer for the key replaces the doubt.
    pub fn assess(
        &self,
        fused: &FusedSignals,
        referenced_keys: &BTreeSet<String>,
        legacy_confidence: Option<Confidence>,
        reported_low_keys: &[String],
    ) -> ConfidenceAssessment {
        let (overall, basis) = match (fused.aggregate_confidence(), legacy_confidence) {
            (Some(mean), _) => (mean, ConfidenceBasis::FusedSignals),
            (None, Some(legacy)) => (legacy.clamp(0.0, 1.0), ConfidenceBasis::LegacyScalar),
            (None, None) => (1.0, ConfidenceBasis::ConfigurationOnly),
        };

        let relevant = |key: &str| referenced_keys.contains(key) || GLOBAL_KEYS.contains(&key);

        let mut low: BTreeSet<String> = BTreeSet::new();
        let mut ignored = 0usize;
        for signal in &fused.signals {
            let reported = !signal.source.is_form() && reported_low_keys.contains(&signal.key);
            if signal.confidence >= self.low_signal_threshold && !reported {
                continue;
            }
            if relevant(&signal.key) {
                low.insert(signal.key.clone());
            } else {
                ignored += 1;
            }
        }
        if ignored > 0 {
            debug!(ignored, "Low-confidence signals not used by any triggered step");
        }
        let low_confidence_keys: Vec<String> = low.into_iter().collect();

        ConfidenceAssessment {
            overall,
            basis,
            low_confidence_keys,
        }
    }
}
