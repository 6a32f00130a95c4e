//! Signal fusion
//!
//! Turns the inference service's raw signals, the customer's form answers
//! and their free-text notes into one canonical, conflict-annotated signal
//! set. Pure: no I/O, no state kept between runs.

pub mod conflict_detector;
pub mod form_mapper;
pub mod signal_fuser;
pub mod text_inference;

pub use conflict_detector::{keys_related, ConflictDetector, OrdinalScale};
pub use form_mapper::{firm_answer, is_ambiguous, map_form_answers, KeyResolver};
pub use signal_fuser::SignalFuser;
pub use text_inference::{canonical_unit, infer_from_notes, stated_key};

use crate::types::{ExpectedSignalDef, FormAnswers, FusedSignals, Signal, WidgetFieldDef};

/// Fuse every source into one signal set
///
/// Order of application: vision, then notes, then form answers, so form
/// answers overwrite and conflicts are checked against the raw vision
/// values.
pub fn fuse(
    vision_signals: &[Signal],
    form_answers: &FormAnswers,
    widget_field_defs: &[WidgetFieldDef],
    expected_signal_defs: &[ExpectedSignalDef],
    customer_notes: &str,
) -> FusedSignals {
    let known_keys = expected_signal_defs
        .iter()
        .map(|d| d.key.as_str())
        .chain(vision_signals.iter().map(|s| s.key.as_str()));
    let resolver = KeyResolver::new(known_keys);
    let mapping = map_form_answers(form_answers, widget_field_defs, &resolver);

    let mut fuser = SignalFuser::default();
    fuser.add_vision(vision_signals.iter().cloned());
    fuser.add_inferred(infer_from_notes(customer_notes));
    fuser.add_form(mapping.signals);
    fuser.exclude(mapping.excluded);
    fuser.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SignalSource, SignalValue};
    use serde_json::json;

    #[test]
    fn test_fuse_all_sources() {
        let vision = vec![
            Signal::new("window", SignalValue::Number(8.0), 0.7, SignalSource::Vision),
            Signal::new("condition_rating", SignalValue::Text("poor".into()), 0.9, SignalSource::Vision),
        ];
        let mut answers = FormAnswers::new();
        answers.insert("Windows".into(), json!("10"));
        answers.insert("condition".into(), json!("good"));
        answers.insert("gutters".into(), json!("not sure"));

        let fused = fuse(&vision, &answers, &[], &[], "About 900 sq ft of siding");

        assert_eq!(fused.number("window"), Some(10.0));
        assert_eq!(fused.text("condition").as_deref(), Some("good"));
        assert_eq!(fused.number("customer_stated_sqft"), Some(900.0));
        assert_eq!(fused.excluded, vec!["gutters".to_string()]);
        assert!(fused.signals.windows(2).all(|w| w[0].key < w[1].key));
        assert!(fused
            .conflicts
            .iter()
            .any(|c| c.vision_key == "condition_rating" && c.resolved_source == SignalSource::Form));
    }
}
