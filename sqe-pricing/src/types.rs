//! Signal model
//!
//! A signal is one fact used as pricing input: a key, a value, a confidence
//! and the source it came from. Signals are created once per pricing run
//! and discarded with it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Confidence score (0.0-1.0)
pub type Confidence = f64;

/// Customer form answers keyed by widget field id
pub type FormAnswers = BTreeMap<String, serde_json::Value>;

// ============================================================================
// Signal values and sources
// ============================================================================

/// Signal value: text, number or boolean
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignalValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl SignalValue {
    /// Numeric view of the value
    ///
    /// Text is parsed with comma grouping removed ("2,400" → 2400).
    pub fn as_number(&self) -> Option<f64> {
        match self {
            SignalValue::Number(n) => Some(*n),
            SignalValue::Text(s) => parse_grouped_number(s),
            SignalValue::Bool(_) => None,
        }
    }

    /// Lower-cased textual view used for comparisons
    pub fn as_text(&self) -> String {
        match self {
            SignalValue::Text(s) => s.trim().to_lowercase(),
            other => other.to_string(),
        }
    }

    /// Truthiness used when a trigger has no explicit condition
    pub fn is_truthy(&self) -> bool {
        match self {
            SignalValue::Bool(b) => *b,
            SignalValue::Number(n) => *n != 0.0,
            SignalValue::Text(s) => {
                let s = s.trim().to_lowercase();
                !(s.is_empty() || matches!(s.as_str(), "no" | "false" | "none" | "0" | "n/a"))
            }
        }
    }
}

impl fmt::Display for SignalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalValue::Bool(b) => write!(f, "{}", b),
            SignalValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            SignalValue::Number(n) => write!(f, "{}", n),
            SignalValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Parse a number that may carry comma grouping or surrounding whitespace
pub fn parse_grouped_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Where a signal came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    /// Customer form answer (confidence 1.0, always authoritative)
    Form,
    /// Vision model inference from photos
    Vision,
    /// Stated by the customer in free text
    Text,
    /// Derived by rules from other signals
    Inferred,
}

impl SignalSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Form => "form",
            Self::Vision => "vision",
            Self::Text => "text",
            Self::Inferred => "inferred",
        }
    }

    pub fn is_form(self) -> bool {
        matches!(self, Self::Form)
    }
}

impl fmt::Display for SignalSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Signal
// ============================================================================

/// Single extracted or provided fact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub key: String,
    pub value: SignalValue,
    pub confidence: Confidence,
    pub source: SignalSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
}

impl Signal {
    /// Create a signal with confidence clamped into 0.0-1.0
    pub fn new(
        key: impl Into<String>,
        value: SignalValue,
        confidence: Confidence,
        source: SignalSource,
    ) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            key: key.into(),
            value,
            confidence,
            source,
            evidence: None,
        }
    }

    /// Form answers always carry full confidence
    pub fn from_form(key: impl Into<String>, value: SignalValue) -> Self {
        Self::new(key, value, 1.0, SignalSource::Form)
    }

    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence = Some(evidence.into());
        self
    }
}

/// Disagreement between a customer-provided and a vision-derived value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalConflict {
    /// Canonical key the conflict was resolved under
    pub key: String,
    /// Key of the vision signal (may differ for related keys)
    pub vision_key: String,
    pub customer_value: SignalValue,
    pub customer_source: SignalSource,
    pub vision_value: SignalValue,
    pub vision_confidence: Confidence,
    pub resolved_source: SignalSource,
    pub resolved_value: SignalValue,
    /// Normalized Levenshtein similarity for textual values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
    pub explanation: String,
}

/// Canonical, conflict-annotated signal set produced by fusion
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FusedSignals {
    /// At most one signal per key, sorted by key
    pub signals: Vec<Signal>,
    pub conflicts: Vec<SignalConflict>,
    /// Keys whose answers were too ambiguous to price from
    #[serde(default)]
    pub excluded: Vec<String>,
}

impl FusedSignals {
    /// Signal for `key`; `signals` need not be sorted
    pub fn get(&self, key: &str) -> Option<&Signal> {
        self.signals.iter().find(|s| s.key == key)
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|s| s.value.as_number())
    }

    pub fn text(&self, key: &str) -> Option<String> {
        self.get(key).map(|s| s.value.as_text())
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    /// Mean confidence across the fused set (None when empty)
    pub fn aggregate_confidence(&self) -> Option<Confidence> {
        if self.signals.is_empty() {
            return None;
        }
        let sum: f64 = self.signals.iter().map(|s| s.confidence).sum();
        Some(sum / self.signals.len() as f64)
    }
}

// ============================================================================
// Field and signal definitions
// ============================================================================

/// Widget form field definition authored by the business
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetFieldDef {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub field_type: Option<String>,
    /// Explicit field → signal key mapping
    #[serde(default)]
    pub maps_to_signal: Option<String>,
}

/// Signal the service expects the inference collaborator to extract
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedSignalDef {
    pub key: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub value_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_grouped_number() {
        assert_eq!(parse_grouped_number("2,400"), Some(2400.0));
        assert_eq!(parse_grouped_number(" 12.5 "), Some(12.5));
        assert_eq!(parse_grouped_number("maybe"), None);
        assert_eq!(parse_grouped_number(""), None);
    }

    #[test]
    fn test_signal_confidence_clamped() {
        let s = Signal::new("x", SignalValue::Number(1.0), 1.7, SignalSource::Vision);
        assert_eq!(s.confidence, 1.0);
        let s = Signal::new("x", SignalValue::Number(1.0), f64::NAN, SignalSource::Vision);
        assert_eq!(s.confidence, 0.0);
    }

    #[test]
    fn test_truthiness() {
        assert!(SignalValue::Text("yes".into()).is_truthy());
        assert!(!SignalValue::Text("No".into()).is_truthy());
        assert!(!SignalValue::Number(0.0).is_truthy());
        assert!(SignalValue::Bool(true).is_truthy());
    }

    #[test]
    fn test_untagged_value_deserialization() {
        let v: SignalValue = serde_json::from_str("3").unwrap();
        assert_eq!(v, SignalValue::Number(3.0));
        let v: SignalValue = serde_json::from_str("true").unwrap();
        assert_eq!(v, SignalValue::Bool(true));
        let v: SignalValue = serde_json::from_str("\"poor\"").unwrap();
        assert_eq!(v.as_text(), "poor");
    }

    #[test]
    fn test_fused_lookup_and_aggregate() {
        let fused = FusedSignals {
            signals: vec![
                Signal::new("a", SignalValue::Number(1.0), 0.5, SignalSource::Vision),
                Signal::from_form("b", SignalValue::Number(2.0)),
            ],
            ..Default::default()
        };
        assert_eq!(fused.number("b"), Some(2.0));
        assert!(fused.get("c").is_none());
        assert_eq!(fused.aggregate_confidence(), Some(0.75));
    }

    #[test]
    fn test_lookup_in_unsorted_set() {
        let fused = FusedSignals {
            signals: vec![
                Signal::from_form("window_count", SignalValue::Number(12.0)),
                Signal::from_form("area", SignalValue::Number(80.0)),
                Signal::new("stories", SignalValue::Number(2.0), 0.9, SignalSource::Vision),
            ],
            ..Default::default()
        };
        assert_eq!(fused.number("area"), Some(80.0));
        assert_eq!(fused.number("window_count"), Some(12.0));
        assert_eq!(fused.get("stories").map(|s| s.source), Some(SignalSource::Vision));
        assert!(fused.get("condition_rating").is_none());
    }
}
