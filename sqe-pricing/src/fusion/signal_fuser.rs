// Signal Fuser - Trust-Ordered Merge
//
// Merges vision, text-inferred and form signals into one set keyed by
// signal key.
//
// Trust order:
// 1. Form answers (confidence 1.0) always win, and also replace vision
//    values stored under alias keys (condition ↔ condition_rating)
// 2. Among non-form sources, higher confidence wins
//
// Every material customer-vs-vision disagreement is recorded as a
// SignalConflict, whichever side wins.

use std::collections::BTreeMap;

use tracing::{debug, info};

use super::conflict_detector::{keys_related, ConflictDetector};
use super::form_mapper::is_ambiguous;
use crate::types::{FusedSignals, Signal, SignalConflict, SignalValue};

/// Builds one fused set per pricing run
pub struct SignalFuser {
    detector: ConflictDetector,
    signals: BTreeMap<String, Signal>,
    /// Vision signals as received, for conflict checks after overrides
    vision: Vec<Signal>,
    conflicts: Vec<SignalConflict>,
    excluded: Vec<String>,
}

impl Default for SignalFuser {
    fn default() -> Self {
        Self::new(ConflictDetector::default())
    }
}

impl SignalFuser {
    pub fn new(detector: ConflictDetector) -> Self {
        Self {
            detector,
            signals: BTreeMap::new(),
            vision: Vec::new(),
            conflicts: Vec::new(),
            excluded: Vec::new(),
        }
    }

    /// Add vision signals; duplicates keep the more confident value
    pub fn add_vision(&mut self, signals: impl IntoIterator<Item = Signal>) {
        for signal in signals {
            if let SignalValue::Text(t) = &signal.value {
                if is_ambiguous(t) {
                    debug!(key = %signal.key, "Ambiguous vision value excluded");
                    self.excluded.push(signal.key);
                    continue;
                }
            }
            self.vision.push(signal.clone());
            self.insert_non_form(signal);
        }
    }

    /// Add signals inferred from customer notes
    pub fn add_inferred(&mut self, signals: impl IntoIterator<Item = Signal>) {
        for signal in signals {
            self.record_conflicts(&signal);
            self.insert_non_form(signal);
        }
    }

    /// Add form signals; these override everything under related keys
    pub fn add_form(&mut self, signals: impl IntoIterator<Item = Signal>) {
        for signal in signals {
            self.record_conflicts(&signal);

            let alias_keys: Vec<String> = self
                .signals
                .iter()
                .filter(|(key, existing)| {
                    key.as_str() != signal.key
                        && !existing.source.is_form()
                        && keys_related(key, &signal.key)
                })
                .map(|(key, _)| key.clone())
                .collect();
            for key in alias_keys {
                debug!(alias = %key, form_key = %signal.key, "Form answer overrides alias key");
                let mut aliased = signal.clone();
                aliased.key = key.clone();
                aliased.evidence = Some(format!("form answer for '{}'", signal.key));
                self.signals.insert(key, aliased);
            }

            if let Some(previous) = self.signals.get(&signal.key) {
                if !previous.source.is_form() {
                    debug!(
                        key = %signal.key,
                        replaced_source = %previous.source,
                        replaced_confidence = previous.confidence,
                        "Form answer overrides signal"
                    );
                }
            }
            self.signals.insert(signal.key.clone(), signal);
        }
    }

    /// Keys excluded because their values were ambiguous
    pub fn exclude(&mut self, keys: impl IntoIterator<Item = String>) {
        self.excluded.extend(keys);
    }

    pub fn finish(mut self) -> FusedSignals {
        self.excluded.sort();
        self.excluded.dedup();
        let fused = FusedSignals {
            signals: self.signals.into_values().collect(),
            conflicts: self.conflicts,
            excluded: self.excluded,
        };
        info!(
            signals = fused.len(),
            conflicts = fused.conflicts.len(),
            excluded = fused.excluded.len(),
            "Signal fusion complete"
        );
        fused
    }

    fn insert_non_form(&mut self, signal: Signal) {
        match self.signals.get(&signal.key) {
            Some(existing) if existing.source.is_form() => {
                debug!(key = %signal.key, "Form answer already present, keeping it");
            }
            Some(existing) if existing.confidence >= signal.confidence => {
                debug!(
                    key = %signal.key,
                    kept = existing.confidence,
                    dropped = signal.confidence,
                    "Keeping more confident signal"
                );
            }
            _ => {
                self.signals.insert(signal.key.clone(), signal);
            }
        }
    }

    /// Compare a customer-side signal with every related vision signal
    fn record_conflicts(&mut self, customer: &Signal) {
        for vision in self.vision.iter().filter(|v| keys_related(&v.key, &customer.key)) {
            let Some(disagreement) = self.detector.compare(&customer.key, &customer.value, &vision.value)
            else {
                continue;
            };

            // Non-form signals under different keys both survive; the record names the stronger
            let winner = if customer.source.is_form() || customer.confidence > vision.confidence {
                customer
            } else {
                vision
            };
            let (resolved_source, resolved_value) = (winner.source, winner.value.clone());

            debug!(
                key = %customer.key,
                vision_key = %vision.key,
                resolved = %resolved_source,
                "Signal conflict recorded"
            );
            self.conflicts.push(SignalConflict {
                key: customer.key.clone(),
                vision_key: vision.key.clone(),
                customer_value: customer.value.clone(),
                customer_source: customer.source,
                vision_value: vision.value.clone(),
                vision_confidence: vision.confidence,
                resolved_source,
                resolved_value,
                similarity: disagreement.similarity,
                explanation: disagreement.explanation,
            });
        }
    }
}
