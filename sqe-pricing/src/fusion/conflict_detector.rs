// Conflict Detector - Customer vs Vision Disagreement
//
// Decides whether a customer-provided value (form answer or notes) and a
// vision-derived value for related keys disagree materially.
//
// Category thresholds:
// - Ordinal scales (condition, complexity, access): any difference in rank
// - Numbers: relative difference above 25%
// - Booleans: unequal
// - Free text: normalized Levenshtein similarity below 0.8

use strsim::normalized_levenshtein;

use super::form_mapper::{normalize_key, singularize};
use crate::types::SignalValue;

/// Key aliases that describe the same fact
pub const KEY_ALIASES: &[(&str, &str)] = &[
    ("condition", "condition_rating"),
    ("complexity", "complexity_level"),
    ("access", "access_difficulty"),
];

/// Ordinal scale a key belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrdinalScale {
    Condition,
    Complexity,
    Access,
}

impl OrdinalScale {
    pub fn for_key(key: &str) -> Option<Self> {
        let key = key.to_lowercase();
        if key.contains("condition") {
            Some(Self::Condition)
        } else if key.contains("complexity") {
            Some(Self::Complexity)
        } else if key.contains("access") {
            Some(Self::Access)
        } else {
            None
        }
    }

    /// Rank of a textual level on this scale
    pub fn rank(self, value: &SignalValue) -> Option<u8> {
        let text = value.as_text();
        let first_word = text.split_whitespace().next().unwrap_or_default();
        let rank = match (self, first_word) {
            (Self::Condition, "excellent") => 4,
            (Self::Condition, "good") => 3,
            (Self::Condition, "fair" | "average") => 2,
            (Self::Condition, "poor" | "bad" | "damaged") => 1,
            (Self::Complexity, "low" | "simple") => 1,
            (Self::Complexity, "medium" | "moderate") => 2,
            (Self::Complexity, "high" | "complex") => 3,
            (Self::Access, "easy") => 1,
            (Self::Access, "moderate") => 2,
            (Self::Access, "difficult" | "hard") => 3,
            _ => return None,
        };
        Some(rank)
    }
}

/// Whether two keys name the same fact
pub fn keys_related(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    if KEY_ALIASES
        .iter()
        .any(|(x, y)| (a == *x && b == *y) || (a == *y && b == *x))
    {
        return true;
    }
    let (na, nb) = (normalize_key(a), normalize_key(b));
    na == nb || singularize(&na) == singularize(&nb)
}

/// Outcome of comparing two values
#[derive(Debug, Clone, PartialEq)]
pub struct Disagreement {
    pub similarity: Option<f64>,
    pub explanation: String,
}

/// Conflict detector with category thresholds
pub struct ConflictDetector {
    /// Relative difference above which numbers disagree
    numeric_tolerance: f64,
    /// Similarity below which free text disagrees
    min_text_similarity: f64,
}

impl Default for ConflictDetector {
    fn default() -> Self {
        Self {
            numeric_tolerance: 0.25,
            min_text_similarity: 0.8,
        }
    }
}

impl ConflictDetector {
    pub fn new(numeric_tolerance: f64, min_text_similarity: f64) -> Self {
        Self {
            numeric_tolerance,
            min_text_similarity,
        }
    }

    /// Compare a customer value with a vision value for `key`
    ///
    /// Returns None when the values agree within the category threshold.
    pub fn compare(
        &self,
        key: &str,
        customer: &SignalValue,
        vision: &SignalValue,
    ) -> Option<Disagreement> {
        if let Some(scale) = OrdinalScale::for_key(key) {
            if let (Some(c), Some(v)) = (scale.rank(customer), scale.rank(vision)) {
                return (c != v).then(|| Disagreement {
                    similarity: None,
                    explanation: format!(
                        "customer says '{}' but photos suggest '{}' ({} level{} apart)",
                        customer,
                        vision,
                        c.abs_diff(v),
                        if c.abs_diff(v) == 1 { "" } else { "s" }
                    ),
                });
            }
        }

        match (customer, vision) {
            (SignalValue::Bool(c), SignalValue::Bool(v)) => (c != v).then(|| Disagreement {
                similarity: None,
                explanation: format!("customer says {} but photos suggest {}", c, v),
            }),
            _ => match (customer.as_number(), vision.as_number()) {
                (Some(c), Some(v)) => self.compare_numbers(c, v),
                _ => self.compare_text(customer, vision),
            },
        }
    }

    fn compare_numbers(&self, customer: f64, vision: f64) -> Option<Disagreement> {
        let scale = customer.abs().max(vision.abs());
        if scale == 0.0 {
            return None;
        }
        let relative = (customer - vision).abs() / scale;
        (relative > self.numeric_tolerance).then(|| Disagreement {
            similarity: None,
            explanation: format!(
                "customer says {} but photos suggest {} ({:.0}% apart)",
                SignalValue::Number(customer),
                SignalValue::Number(vision),
                relative * 100.0
            ),
        })
    }

    fn compare_text(&self, customer: &SignalValue, vision: &SignalValue) -> Option<Disagreement> {
        let similarity = normalized_levenshtein(&customer.as_text(), &vision.as_text());
        (similarity < self.min_text_similarity).then(|| Disagreement {
            similarity: Some(similarity),
            explanation: format!(
                "customer says '{}' but photos suggest '{}' (similarity {:.2})",
                customer, vision, similarity
            ),
        })
    }
}
