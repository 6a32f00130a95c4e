// Form Mapper - Customer Answers → Form Signals
//
// Maps each widget answer to a canonical signal key and coerces its value.
// Key resolution order:
// 1. Explicit field → signal mapping configured by the business
// 2. Exact match against a known signal key
// 3. Normalized match (case/separator-insensitive)
// 4. Singular/plural match
// 5. Field id used as a new key

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;
use tracing::debug;

use crate::types::{parse_grouped_number, FormAnswers, Signal, SignalValue, WidgetFieldDef};

/// Answers too vague to price from
const AMBIGUOUS_VALUES: &[&str] = &[
    "maybe",
    "possibly",
    "perhaps",
    "tbd",
    "not sure",
    "unsure",
    "unknown",
    "idk",
    "don't know",
];

/// Mapped form answers
#[derive(Debug, Clone, Default)]
pub struct FormMapping {
    pub signals: Vec<Signal>,
    /// Signal keys whose answers were ambiguous
    pub excluded: Vec<String>,
}

/// Case/separator-insensitive key form ("Item-Count" → "itemcount")
pub fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Crude English singular of a normalized key
pub fn singularize(key: &str) -> String {
    if let Some(stem) = key.strip_suffix("ies") {
        if !stem.is_empty() {
            return format!("{stem}y");
        }
    }
    for suffix in ["ses", "xes", "zes", "ches", "shes"] {
        if key.ends_with(suffix) {
            return key[..key.len() - 2].to_string();
        }
    }
    if key.len() > 1 && key.ends_with('s') && !key.ends_with("ss") {
        return key[..key.len() - 1].to_string();
    }
    key.to_string()
}

/// Whether a textual answer is too vague to use
pub fn is_ambiguous(raw: &str) -> bool {
    let cleaned = raw
        .trim()
        .trim_end_matches(['?', '.', '!'])
        .to_lowercase()
        .replace('\u{2019}', "'");
    AMBIGUOUS_VALUES.contains(&cleaned.as_str())
}

/// Resolves form field ids to canonical signal keys
pub struct KeyResolver {
    exact: HashMap<String, String>,
    normalized: HashMap<String, String>,
    singular: HashMap<String, String>,
}

impl KeyResolver {
    /// Build from the signal keys already known for this run
    pub fn new<'a>(known_keys: impl IntoIterator<Item = &'a str>) -> Self {
        let mut exact = HashMap::new();
        let mut normalized = HashMap::new();
        let mut singular = HashMap::new();
        for key in known_keys {
            let norm = normalize_key(key);
            exact.entry(key.to_string()).or_insert_with(|| key.to_string());
            normalized.entry(norm.clone()).or_insert_with(|| key.to_string());
            singular.entry(singularize(&norm)).or_insert_with(|| key.to_string());
        }
        Self {
            exact,
            normalized,
            singular,
        }
    }

    pub fn resolve(&self, field_id: &str, explicit: Option<&str>) -> String {
        if let Some(mapped) = explicit.map(str::trim).filter(|m| !m.is_empty()) {
            return mapped.to_string();
        }
        if let Some(key) = self.exact.get(field_id) {
            return key.clone();
        }
        let norm = normalize_key(field_id);
        if let Some(key) = self.normalized.get(&norm) {
            return key.clone();
        }
        if let Some(key) = self.singular.get(&singularize(&norm)) {
            return key.clone();
        }
        field_id.to_string()
    }
}

/// Coerced form value
#[derive(Debug, Clone, PartialEq)]
pub enum Coerced {
    Value(SignalValue),
    Ambiguous,
    Empty,
}

/// Coerce a raw JSON answer into a signal value
///
/// Comma-grouped numbers become numbers; arrays and objects whose members
/// are all numeric are summed; other multi-valued answers are joined.
pub fn coerce_answer(raw: &Value) -> Coerced {
    match raw {
        Value::Null => Coerced::Empty,
        Value::Bool(b) => Coerced::Value(SignalValue::Bool(*b)),
        Value::Number(n) => n
            .as_f64()
            .map(|f| Coerced::Value(SignalValue::Number(f)))
            .unwrap_or(Coerced::Empty),
        Value::String(s) => coerce_text(s),
        Value::Array(items) => coerce_many(items.iter()),
        Value::Object(map) => coerce_many(map.values()),
    }
}

/// Raw answer as a firm value; None when empty or too vague to price from
///
/// Anything reading `FormAnswers` directly goes through this so a "maybe"
/// never acts as a yes.
pub fn firm_answer(raw: &Value) -> Option<SignalValue> {
    match coerce_answer(raw) {
        Coerced::Value(value) => Some(value),
        Coerced::Ambiguous | Coerced::Empty => None,
    }
}

fn coerce_text(s: &str) -> Coerced {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Coerced::Empty;
    }
    if is_ambiguous(trimmed) {
        return Coerced::Ambiguous;
    }
    match parse_grouped_number(trimmed) {
        Some(n) => Coerced::Value(SignalValue::Number(n)),
        None => Coerced::Value(SignalValue::Text(trimmed.to_string())),
    }
}

fn coerce_many<'a>(items: impl Iterator<Item = &'a Value>) -> Coerced {
    let mut numbers = Vec::new();
    let mut texts = Vec::new();
    let mut ambiguous = false;

    for item in items {
        match coerce_answer(item) {
            Coerced::Value(SignalValue::Number(n)) => numbers.push(n),
            Coerced::Value(SignalValue::Bool(b)) => texts.push(b.to_string()),
            Coerced::Value(SignalValue::Text(t)) => texts.push(t),
            Coerced::Ambiguous => ambiguous = true,
            Coerced::Empty => {}
        }
    }

    if texts.is_empty() && !numbers.is_empty() {
        return Coerced::Value(SignalValue::Number(numbers.iter().sum()));
    }
    if !texts.is_empty() {
        texts.extend(numbers.iter().map(|n| SignalValue::Number(*n).to_string()));
        return Coerced::Value(SignalValue::Text(texts.join(", ")));
    }
    if ambiguous {
        Coerced::Ambiguous
    } else {
        Coerced::Empty
    }
}

/// Map every form answer to a form signal
pub fn map_form_answers(
    answers: &FormAnswers,
    field_defs: &[WidgetFieldDef],
    resolver: &KeyResolver,
) -> FormMapping {
    let defs: BTreeMap<&str, &WidgetFieldDef> =
        field_defs.iter().map(|d| (d.id.as_str(), d)).collect();
    let mut mapping = FormMapping::default();

    for (field_id, raw) in answers {
        let explicit = defs
            .get(field_id.as_str())
            .and_then(|d| d.maps_to_signal.as_deref());
        let key = resolver.resolve(field_id, explicit);

        match coerce_answer(raw) {
            Coerced::Value(value) => {
                debug!(field = %field_id, key = %key, value = %value, "Mapped form answer");
                mapping.signals.push(
                    Signal::from_form(key, value).with_evidence(format!("form field '{}'", field_id)),
                );
            }
            Coerced::Ambiguous => {
                debug!(field = %field_id, "Ambiguous answer excluded from pricing");
                mapping.excluded.push(key);
            }
            Coerced::Empty => {}
        }
    }

    mapping
}
