//! Multiplier triggers and the implicit complexity factor

use crate::fusion::{firm_answer, OrdinalScale};
use crate::matching::keyword_present;
use crate::models::{Multiplier, MultiplierTrigger};
use crate::pricing::trigger_resolver::COMPLEXITY_KEYS;
use crate::types::{FormAnswers, FusedSignals, SignalValue};

/// Whether a multiplier fires, with the signal keys it looked at
pub fn multiplier_applies(
    multiplier: &Multiplier,
    fused: &FusedSignals,
    answers: &FormAnswers,
    notes: &str,
) -> (bool, Vec<String>) {
    match &multiplier.trigger {
        MultiplierTrigger::Always => (true, Vec::new()),
        MultiplierTrigger::Signal {
            signal_key,
            condition,
        } => {
            let value = fused.get(signal_key).map(|s| &s.value);
            let hit = match condition {
                Some(c) => c.evaluate(value),
                None => value.is_some_and(SignalValue::is_truthy),
            };
            (hit, vec![signal_key.clone()])
        }
        MultiplierTrigger::FormField {
            field_id,
            condition,
        } => {
            let value = answers.get(field_id).and_then(firm_answer);
            let hit = match condition {
                Some(c) => c.evaluate(value.as_ref()),
                None => value.as_ref().is_some_and(SignalValue::is_truthy),
            };
            (hit, Vec::new())
        }
        MultiplierTrigger::Keywords { keywords } => {
            (keywords.iter().any(|kw| keyword_present(notes, kw)), Vec::new())
        }
    }
}

/// Factor implied by the fused complexity level, with the key it came from
///
/// low 0.9, medium 1.0, high 1.25; None when no complexity signal is usable.
pub fn complexity_factor(fused: &FusedSignals) -> Option<(f64, String)> {
    COMPLEXITY_KEYS.iter().find_map(|key| {
        let signal = fused.get(key)?;
        let factor = match OrdinalScale::Complexity.rank(&signal.value)? {
            1 => 0.9,
            2 => 1.0,
            _ => 1.25,
        };
        Some((factor, signal.key.clone()))
    })
}
