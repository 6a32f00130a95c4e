// Text Inference - Customer Notes → Text Signals
//
// Scans free text for quantities the customer stated outright ("about 1,200
// sq ft", "3 rooms") and for complexity/condition wording. Stated quantities
// are keyed `customer_stated_<unit>` so the measurement stage can prefer
// them over photo estimates.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::matching::rules::{find_keyword, KeywordHit};
use crate::types::{parse_grouped_number, Confidence, Signal, SignalSource, SignalValue};

/// Confidence for a quantity the customer typed in their notes
pub const STATED_QUANTITY_CONFIDENCE: Confidence = 0.85;

/// Confidence for complexity/condition read from wording
pub const WORDING_CONFIDENCE: Confidence = 0.6;

/// Key prefix for customer-stated quantities
pub const STATED_PREFIX: &str = "customer_stated_";

static QUANTITY_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r"(?i)(\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?)\s*(square\s+f(?:ee|oo)t|sq\.?\s*ft|sqft|ft2|sf|square\s+met(?:er|re)s?|sq\.?\s*m|sqm|m2|linear\s+f(?:ee|oo)t|linear\s+ft|lin\.?\s*ft|lf|rooms?|windows?|doors?|hours?|hrs?)\b",
    )
    .map_err(|e| tracing::error!("Invalid quantity pattern: {}", e))
    .ok()
});

/// Map a free-form unit label to its canonical name
///
/// Shared with the measurement stage so "sq ft", "square feet" and "sqft"
/// all resolve to the same `customer_stated_sqft` key.
pub fn canonical_unit(label: &str) -> Option<&'static str> {
    let compact: String = label
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect();
    let unit = match compact.as_str() {
        "squarefeet" | "squarefoot" | "sqft" | "ft2" | "sf" => "sqft",
        "squaremeters" | "squaremeter" | "squaremetres" | "squaremetre" | "sqm" | "m2" => "sqm",
        "linearfeet" | "linearfoot" | "linearft" | "linft" | "lf" => "linear_ft",
        "room" | "rooms" => "room",
        "window" | "windows" => "window",
        "door" | "doors" => "door",
        "hour" | "hours" | "hr" | "hrs" => "hour",
        _ => return None,
    };
    Some(unit)
}

/// Signal key for a quantity stated in the given unit
pub fn stated_key(unit: &str) -> String {
    format!("{}{}", STATED_PREFIX, unit)
}

/// Quantities stated in the notes, first mention per unit
pub fn stated_quantities(notes: &str) -> Vec<Signal> {
    let Some(pattern) = QUANTITY_PATTERN.as_ref() else {
        return Vec::new();
    };
    let mut seen: Vec<&'static str> = Vec::new();
    let mut signals = Vec::new();

    for caps in pattern.captures_iter(notes) {
        let (Some(number), Some(unit_label)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let Some(unit) = canonical_unit(unit_label.as_str()) else {
            continue;
        };
        let Some(quantity) = parse_grouped_number(number.as_str()) else {
            continue;
        };
        if seen.contains(&unit) {
            debug!(unit, quantity, "Ignoring repeated stated quantity");
            continue;
        }
        seen.push(unit);

        let snippet = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
        signals.push(
            Signal::new(
                stated_key(unit),
                SignalValue::Number(quantity),
                STATED_QUANTITY_CONFIDENCE,
                SignalSource::Text,
            )
            .with_evidence(format!("customer notes: \"{}\"", snippet.trim())),
        );
    }

    signals
}

/// Wording → ordinal level, checked in order
const COMPLEXITY_WORDS: &[(&str, &[&str])] = &[
    ("high", &["complex", "complicated", "intricate", "extensive", "difficult"]),
    ("low", &["simple", "straightforward", "basic", "minor", "quick job"]),
];

const CONDITION_WORDS: &[(&str, &[&str])] = &[
    ("poor", &["damaged", "rotten", "rotted", "broken", "worn out", "poor condition"]),
    ("excellent", &["like new", "brand new", "excellent condition"]),
    ("good", &["good condition", "well maintained"]),
];

fn wording_level(notes: &str, table: &[(&'static str, &[&str])]) -> Option<(&'static str, String)> {
    let mut found: Option<(&'static str, String)> = None;
    for &(level, words) in table {
        let hit = words
            .iter()
            .find(|word| find_keyword(notes, word) == KeywordHit::Present);
        if let Some(word) = hit {
            match &found {
                Some((prev, _)) if *prev != level => {
                    debug!(first = *prev, second = level, "Contradictory wording, no signal");
                    return None;
                }
                Some(_) => {}
                None => found = Some((level, (*word).to_string())),
            }
        }
    }
    found
}

/// Complexity and condition read from the customer's wording
pub fn wording_signals(notes: &str) -> Vec<Signal> {
    let mut signals = Vec::new();
    for (key, table) in [("complexity", COMPLEXITY_WORDS), ("condition", CONDITION_WORDS)] {
        if let Some((level, word)) = wording_level(notes, table) {
            signals.push(
                Signal::new(
                    key,
                    SignalValue::Text(level.to_string()),
                    WORDING_CONFIDENCE,
                    SignalSource::Inferred,
                )
                .with_evidence(format!("customer notes mention '{}'", word)),
            );
        }
    }
    signals
}

/// All signals inferred from customer notes
pub fn infer_from_notes(notes: &str) -> Vec<Signal> {
    if notes.trim().is_empty() {
        return Vec::new();
    }
    let mut signals = stated_quantities(notes);
    signals.extend(wording_signals(notes));
    signals
}
