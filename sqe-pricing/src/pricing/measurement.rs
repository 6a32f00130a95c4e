//! Measured-quantity selection
//!
//! Priority: quantity the customer typed in their notes, then the form
//! answer, then the photo estimate. A stated quantity that disagrees with
//! the photo estimate by more than the tolerance still wins but leaves a
//! note for the business.

use crate::fusion::{canonical_unit, firm_answer, stated_key};
use crate::models::MeasurementModel;
use crate::pricing::money::fmt_quantity;
use crate::types::{FormAnswers, FusedSignals, SignalSource};

/// Relative difference above which stated and estimated quantities are noted
pub const DISCREPANCY_TOLERANCE: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasurementSource {
    CustomerStated,
    Form,
    Vision,
}

impl MeasurementSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CustomerStated => "customer stated",
            Self::Form => "form",
            Self::Vision => "photo estimate",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeasuredQuantity {
    pub quantity: f64,
    pub source: MeasurementSource,
    pub signal_key: String,
    /// Set when stated and estimated quantities disagree
    pub discrepancy_note: Option<String>,
}

/// Choose the quantity to price for a measurement model
pub fn select_quantity(
    model: &MeasurementModel,
    fused: &FusedSignals,
    answers: &FormAnswers,
) -> Option<MeasuredQuantity> {
    let stated_signal = canonical_unit(&model.unit_label).map(stated_key);
    let stated = stated_signal.as_ref().and_then(|key| {
        fused
            .get(key)
            .filter(|s| s.source == SignalSource::Text)
            .and_then(|s| s.value.as_number())
            .map(|n| (n, key.clone()))
    });

    let form = model
        .form_field_id
        .as_ref()
        .and_then(|field| {
            answers
                .get(field)
                .and_then(firm_answer)
                .and_then(|v| v.as_number())
                .map(|n| (n, field.clone()))
        })
        .or_else(|| {
            fused
                .get(&model.signal_key)
                .filter(|s| s.source.is_form())
                .and_then(|s| s.value.as_number())
                .map(|n| (n, model.signal_key.clone()))
        });

    let vision = vision_estimate(model, fused);

    let (quantity, source, signal_key) = match (&stated, &form, vision) {
        (Some((n, key)), _, _) => (*n, MeasurementSource::CustomerStated, key.clone()),
        (None, Some((n, key)), _) => (*n, MeasurementSource::Form, key.clone()),
        (None, None, Some(n)) => (n, MeasurementSource::Vision, model.signal_key.clone()),
        (None, None, None) => return None,
    };

    let discrepancy_note = match (stated.as_ref(), vision) {
        (Some((said, _)), Some(seen)) if relative_difference(*said, seen) > DISCREPANCY_TOLERANCE => {
            Some(format!(
                "Customer stated {} {} but photos suggest about {} {}; using the customer's figure",
                fmt_quantity(*said),
                model.unit_label,
                fmt_quantity(seen),
                model.unit_label
            ))
        }
        _ => None,
    };

    Some(MeasuredQuantity {
        quantity,
        source,
        signal_key,
        discrepancy_note,
    })
}

/// Photo estimate, including one a form answer overrode during fusion
fn vision_estimate(model: &MeasurementModel, fused: &FusedSignals) -> Option<f64> {
    match fused.get(&model.signal_key) {
        Some(s) if !s.source.is_form() && s.source != SignalSource::Text => s.value.as_number(),
        _ => fused
            .conflicts
            .iter()
            .find(|c| c.vision_key == model.signal_key)
            .and_then(|c| c.vision_value.as_number()),
    }
}

fn relative_difference(a: f64, b: f64) -> f64 {
    let scale = a.abs().max(b.abs());
    if scale == 0.0 {
        0.0
    } else {
        (a - b).abs() / scale
    }
}
