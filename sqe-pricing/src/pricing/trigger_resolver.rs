//! Work step activation and quantity resolution
//!
//! Quantity trust order: form field (trusted) → constant (trusted) →
//! AI signal (untrusted). Steps with no quantity source at all fall back
//! to the legacy estimate, which is always flagged.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::fusion::{firm_answer, OrdinalScale};
use crate::models::{CostType, QuantitySource, WorkStep};
use crate::types::{FormAnswers, FusedSignals, SignalValue};

/// Keys the legacy per-unit estimate treats as quantities
const QUANTITY_KEY_HINTS: &[&str] = &["count", "qty", "quantity", "number", "sqft", "area", "units"];

/// Complexity keys, in lookup order
pub const COMPLEXITY_KEYS: &[&str] = &["complexity", "complexity_level"];

/// Hours assumed when no complexity signal exists
const DEFAULT_LEGACY_HOURS: f64 = 4.0;

/// Where a resolved quantity came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantityOrigin {
    FormField,
    Constant,
    AiSignal,
    LegacyFallback,
}

impl QuantityOrigin {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FormField => "form_field",
            Self::Constant => "constant",
            Self::AiSignal => "ai_signal",
            Self::LegacyFallback => "legacy_fallback",
        }
    }
}

/// Resolution result for one work step
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStep {
    pub triggered: bool,
    pub quantity: f64,
    pub source: QuantityOrigin,
    pub trusted: bool,
    pub reason: String,
    /// Signal keys this step depends on (trigger and quantity)
    pub signals_used: Vec<String>,
}

impl ResolvedStep {
    pub fn is_legacy(&self) -> bool {
        self.source == QuantityOrigin::LegacyFallback
    }
}

struct Quantity {
    value: f64,
    origin: QuantityOrigin,
    trusted: bool,
    key: Option<String>,
}

/// Decide whether a step activates and how much of it to bill
pub fn resolve_step(step: &WorkStep, fused: &FusedSignals, answers: &FormAnswers) -> ResolvedStep {
    let quantity = resolve_quantity(step, fused, answers);
    let mut signals_used = Vec::new();
    if let Some(key) = &step.trigger_signal {
        signals_used.push(key.clone());
    }
    if let Some(key) = &quantity.key {
        if !signals_used.contains(key) {
            signals_used.push(key.clone());
        }
    }

    let (triggered, reason) = if !step.optional {
        (true, "required step".to_string())
    } else if let Some(key) = &step.trigger_signal {
        let value = lookup_value(key, fused, answers);
        match &step.trigger_condition {
            Some(condition) => {
                let hit = condition.evaluate(value.as_ref());
                (hit, format!("{} {} → {}", key, condition.describe(), hit))
            }
            None => {
                let hit = value.as_ref().is_some_and(SignalValue::is_truthy);
                (hit, format!("{} is {}", key, if hit { "set" } else { "not set" }))
            }
        }
    } else if step.quantity_source.is_some() {
        let hit = quantity.value > 0.0;
        (hit, format!("implicit trigger: quantity {}", quantity.value))
    } else {
        (false, "optional step without trigger".to_string())
    };

    // Fixed steps bill once, whatever the source resolved to
    let billed = match step.cost_type {
        CostType::Fixed => 1.0,
        CostType::PerUnit | CostType::PerHour => quantity.value.max(0.0),
    };

    debug!(
        step = %step.id,
        triggered,
        quantity = billed,
        source = quantity.origin.as_str(),
        "Resolved work step"
    );

    ResolvedStep {
        triggered,
        quantity: billed,
        source: quantity.origin,
        trusted: quantity.trusted,
        reason,
        signals_used,
    }
}

fn resolve_quantity(step: &WorkStep, fused: &FusedSignals, answers: &FormAnswers) -> Quantity {
    match &step.quantity_source {
        Some(QuantitySource::FormField { field_id }) => {
            let from_answer = answers
                .get(field_id)
                .and_then(firm_answer)
                .and_then(|v| v.as_number());
            Quantity {
                value: from_answer.or_else(|| fused.number(field_id)).unwrap_or(0.0),
                origin: QuantityOrigin::FormField,
                trusted: true,
                key: Some(field_id.clone()),
            }
        }
        Some(QuantitySource::Constant { value }) => Quantity {
            value: *value,
            origin: QuantityOrigin::Constant,
            trusted: true,
            key: None,
        },
        Some(QuantitySource::AiSignal { signal_key }) => Quantity {
            value: fused.number(signal_key).unwrap_or(0.0),
            origin: QuantityOrigin::AiSignal,
            trusted: false,
            key: Some(signal_key.clone()),
        },
        None => legacy_quantity(step, fused),
    }
}

/// Deprecated estimate for steps configured without a quantity source
fn legacy_quantity(step: &WorkStep, fused: &FusedSignals) -> Quantity {
    match step.cost_type {
        CostType::Fixed => Quantity {
            value: 1.0,
            origin: QuantityOrigin::Constant,
            trusted: true,
            key: None,
        },
        CostType::PerHour => {
            let (hours, key) = complexity_hours(fused);
            Quantity {
                value: hours,
                origin: QuantityOrigin::LegacyFallback,
                trusted: false,
                key,
            }
        }
        CostType::PerUnit => {
            let found = fused.signals.iter().find_map(|s| {
                let key = s.key.to_lowercase();
                if !QUANTITY_KEY_HINTS.iter().any(|hint| key.contains(hint)) {
                    return None;
                }
                s.value.as_number().map(|n| (n, s.key.clone()))
            });
            Quantity {
                value: found.as_ref().map(|(n, _)| *n).unwrap_or(0.0),
                origin: QuantityOrigin::LegacyFallback,
                trusted: false,
                key: found.map(|(_, k)| k),
            }
        }
    }
}

/// Hours implied by the fused complexity level (low 2, medium 4, high 8)
pub fn complexity_hours(fused: &FusedSignals) -> (f64, Option<String>) {
    for key in COMPLEXITY_KEYS {
        if let Some(signal) = fused.get(key) {
            let hours = match OrdinalScale::Complexity.rank(&signal.value) {
                Some(1) => 2.0,
                Some(2) => 4.0,
                Some(3) => 8.0,
                _ => continue,
            };
            return (hours, Some(signal.key.clone()));
        }
    }
    (DEFAULT_LEGACY_HOURS, None)
}

/// Trigger value from the fused set, else the raw form answer
///
/// Keys fusion set aside as ambiguous stay unset here too.
fn lookup_value(key: &str, fused: &FusedSignals, answers: &FormAnswers) -> Option<SignalValue> {
    if let Some(signal) = fused.get(key) {
        return Some(signal.value.clone());
    }
    if fused.excluded.iter().any(|k| k == key) {
        return None;
    }
    answers.get(key).and_then(firm_answer)
}
