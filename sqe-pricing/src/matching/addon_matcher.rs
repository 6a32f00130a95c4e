//! Addon matching
//!
//! Decides whether an addon applies, and why. Triggers are checked in a
//! fixed priority order and the first one that fires wins:
//!
//! 1. Customer selection (form answer for the addon, or its field predicate)
//! 2. Keyword in the customer's free text (negation-aware, suppressible)
//! 3. Image-derived signal conditions
//! 4. Legacy signal field named after the addon

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

use super::rules::{find_keyword, global_suppressor, KeywordHit};
use crate::fusion::{firm_answer, is_ambiguous};
use crate::models::{Addon, Service};
use crate::types::{FormAnswers, FusedSignals, SignalSource, SignalValue};

/// Which trigger matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddonMatchSource {
    CustomerSelected,
    Keyword,
    ImageCondition,
    SignalField,
}

/// Outcome of matching one addon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddonMatch {
    pub applies: bool,
    /// Applied without the customer asking for it
    pub auto_recommended: bool,
    pub reason: String,
    pub source: Option<AddonMatchSource>,
    pub signals_used: Vec<String>,
}

impl AddonMatch {
    fn applied(source: AddonMatchSource, reason: String, signals_used: Vec<String>) -> Self {
        Self {
            applies: true,
            auto_recommended: source != AddonMatchSource::CustomerSelected,
            reason,
            source: Some(source),
            signals_used,
        }
    }

    fn skipped(reason: impl Into<String>) -> Self {
        Self {
            applies: false,
            auto_recommended: false,
            reason: reason.into(),
            source: None,
            signals_used: Vec::new(),
        }
    }
}

/// Matches addons against one quote's answers, text and signals
pub struct AddonMatcher {
    /// Lower-cased service name, scope includes and scope excludes
    scope_terms: Vec<String>,
    suppressor: Option<&'static str>,
}

impl AddonMatcher {
    /// Build for one run; the suppressor check covers the whole free text
    pub fn new(service: &Service, free_text: &str) -> Self {
        let scope_terms = std::iter::once(&service.name)
            .chain(service.scope_includes.iter())
            .chain(service.scope_excludes.iter())
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        let suppressor = global_suppressor(free_text);
        if let Some(phrase) = suppressor {
            debug!(phrase, "Keyword-triggered addons suppressed for this run");
        }
        Self {
            scope_terms,
            suppressor,
        }
    }

    pub fn suppressor(&self) -> Option<&'static str> {
        self.suppressor
    }

    /// Whether a keyword is already covered by, or excluded from, the service
    pub fn overlaps_scope(&self, keyword: &str) -> bool {
        let keyword = keyword.trim().to_lowercase();
        !keyword.is_empty()
            && self
                .scope_terms
                .iter()
                .any(|term| term.contains(&keyword) || keyword.contains(term.as_str()))
    }

    pub fn match_addon(
        &self,
        addon: &Addon,
        signals: &FusedSignals,
        answers: &FormAnswers,
        free_text: &str,
        already_detected: &HashSet<String>,
    ) -> AddonMatch {
        if already_detected.contains(&addon.id) {
            return AddonMatch::skipped("already applied");
        }

        match customer_selection(addon, answers) {
            Some(true) => {
                return AddonMatch::applied(
                    AddonMatchSource::CustomerSelected,
                    "selected by customer".to_string(),
                    Vec::new(),
                );
            }
            Some(false) => return AddonMatch::skipped("declined by customer"),
            None => {}
        }

        let suppressed = match self.keyword_match(addon, free_text) {
            Some(m) if m.applies => return m,
            other => other,
        };

        if !addon.trigger_conditions.is_empty()
            && addon
                .trigger_conditions
                .iter()
                .all(|rule| rule.condition.evaluate(signals.get(&rule.signal_key).map(|s| &s.value)))
        {
            let keys: Vec<String> = addon
                .trigger_conditions
                .iter()
                .map(|r| r.signal_key.clone())
                .collect();
            let described = addon
                .trigger_conditions
                .iter()
                .map(|r| format!("{} {}", r.signal_key, r.condition.describe()))
                .collect::<Vec<_>>()
                .join(" and ");
            return AddonMatch::applied(
                AddonMatchSource::ImageCondition,
                format!("condition met: {}", described),
                keys,
            );
        }

        if let Some(signal) = signals.get(&addon.id).or_else(|| signals.get(&format!("addon_{}", addon.id))) {
            if signal.source != SignalSource::Form && signal.value.is_truthy() {
                return AddonMatch::applied(
                    AddonMatchSource::SignalField,
                    format!("signal '{}' is set", signal.key),
                    vec![signal.key.clone()],
                );
            }
        }

        suppressed.unwrap_or_else(|| AddonMatch::skipped("no trigger matched"))
    }

    fn keyword_match(&self, addon: &Addon, free_text: &str) -> Option<AddonMatch> {
        if addon.trigger_keywords.is_empty() || free_text.trim().is_empty() {
            return None;
        }
        let mut negated = None;
        let mut overlapping = None;

        for keyword in &addon.trigger_keywords {
            match find_keyword(free_text, keyword) {
                KeywordHit::Present if self.overlaps_scope(keyword) => {
                    debug!(addon = %addon.id, keyword = %keyword, "Keyword overlaps service scope");
                    overlapping = Some(keyword.clone());
                }
                KeywordHit::Present => {
                    if let Some(phrase) = self.suppressor {
                        return Some(AddonMatch::skipped(format!(
                            "keyword '{}' suppressed by '{}'",
                            keyword, phrase
                        )));
                    }
                    return Some(AddonMatch::applied(
                        AddonMatchSource::Keyword,
                        format!("customer mentioned '{}'", keyword),
                        Vec::new(),
                    ));
                }
                KeywordHit::Negated(rule) => negated = Some((keyword.clone(), rule)),
                KeywordHit::Absent => {}
            }
        }

        if let Some((keyword, rule)) = negated {
            debug!(addon = %addon.id, keyword = %keyword, rule, "Keyword negated");
        }
        if let Some(keyword) = overlapping {
            debug!(addon = %addon.id, keyword = %keyword, "Keyword match discarded");
        }
        None
    }
}

/// Explicit customer choice for this addon, if any
///
/// A boolean-ish answer keyed by the addon id is a direct yes/no; a
/// selection list containing the addon id counts as yes. The addon's field
/// predicate, when configured, is a yes when it holds. Vague answers
/// ("maybe", "tbd") are no choice at all.
fn customer_selection(addon: &Addon, answers: &FormAnswers) -> Option<bool> {
    if let Some(answer) = answers.get(&addon.id) {
        match answer {
            serde_json::Value::Bool(b) => return Some(*b),
            serde_json::Value::String(s) if !is_ambiguous(s) && !s.trim().is_empty() => {
                return Some(SignalValue::Text(s.clone()).is_truthy());
            }
            _ => {}
        }
    }

    let listed = answers.values().any(|v| match v {
        serde_json::Value::Array(items) => items.iter().any(|i| i.as_str() == Some(addon.id.as_str())),
        serde_json::Value::String(s) => s == &addon.id,
        _ => false,
    });
    if listed {
        return Some(true);
    }

    let predicate = addon.trigger_field.as_ref()?;
    let value = answers.get(&predicate.field_id).and_then(firm_answer);
    predicate.condition.evaluate(value.as_ref()).then_some(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConditionRule, FieldPredicate, TriggerCondition};
    use crate::types::Signal;
    use serde_json::json;

    fn polish_addon() -> Addon {
        Addon {
            id: "polish".into(),
            name: "Floor polish".into(),
            price: 75.0,
            trigger_keywords: vec!["polish".into()],
            trigger_conditions: vec![],
            trigger_field: None,
            description: None,
        }
    }

    fn cleaning_service() -> Service {
        Service {
            name: "Floor cleaning".into(),
            ..Default::default()
        }
    }

    fn run(addon: &Addon, text: &str, answers: &FormAnswers, signals: &FusedSignals) -> AddonMatch {
        let matcher = AddonMatcher::new(&cleaning_service(), text);
        matcher.match_addon(addon, signals, answers, text, &HashSet::new())
    }

    #[test]
    fn test_negation_correctness() {
        let addon = polish_addon();
        let none = FusedSignals::default();
        let answers = FormAnswers::new();

        assert!(!run(&addon, "no polish needed", &answers, &none).applies);

        let m = run(&addon, "needs polish", &answers, &none);
        assert!(m.applies);
        assert!(m.auto_recommended);
        assert_eq!(m.source, Some(AddonMatchSource::Keyword));
    }

    #[test]
    fn test_global_suppressor_voids_keywords() {
        let m = run(
            &polish_addon(),
            "needs polish but budget only",
            &FormAnswers::new(),
            &FusedSignals::default(),
        );
        assert!(!m.applies);
        assert!(m.reason.contains("budget only"));
    }

    #[test]
    fn test_customer_selection_wins_over_suppressor() {
        let mut answers = FormAnswers::new();
        answers.insert("extras".into(), json!(["polish", "wax"]));
        let m = run(&polish_addon(), "keep it simple", &answers, &FusedSignals::default());
        assert!(m.applies);
        assert!(!m.auto_recommended);
        assert_eq!(m.source, Some(AddonMatchSource::CustomerSelected));
    }

    #[test]
    fn test_customer_decline_blocks_keyword() {
        let mut answers = FormAnswers::new();
        answers.insert("polish".into(), json!(false));
        let m = run(&polish_addon(), "needs polish", &answers, &FusedSignals::default());
        assert!(!m.applies);
    }

    #[test]
    fn test_vague_answer_is_not_a_selection() {
        let mut answers = FormAnswers::new();
        answers.insert("polish".into(), json!("maybe"));
        let m = run(&polish_addon(), "", &answers, &FusedSignals::default());
        assert!(!m.applies);
        assert_eq!(m.source, None);

        // the keyword path still decides on its own
        let m = run(&polish_addon(), "needs polish", &answers, &FusedSignals::default());
        assert_eq!(m.source, Some(AddonMatchSource::Keyword));
    }

    #[test]
    fn test_scope_overlap_discards_keyword() {
        let addon = Addon {
            trigger_keywords: vec!["cleaning".into()],
            ..polish_addon()
        };
        let m = run(&addon, "deep cleaning please", &FormAnswers::new(), &FusedSignals::default());
        assert!(!m.applies);
    }

    #[test]
    fn test_image_condition_and_field_predicate() {
        let addon = Addon {
            trigger_keywords: vec![],
            trigger_conditions: vec![ConditionRule {
                signal_key: "scratches".into(),
                condition: TriggerCondition::Gte { value: 3.0 },
            }],
            ..polish_addon()
        };
        let signals = FusedSignals {
            signals: vec![Signal::new("scratches", SignalValue::Number(5.0), 0.8, SignalSource::Vision)],
            ..Default::default()
        };
        let m = run(&addon, "", &FormAnswers::new(), &signals);
        assert_eq!(m.source, Some(AddonMatchSource::ImageCondition));
        assert_eq!(m.signals_used, vec!["scratches".to_string()]);

        let addon = Addon {
            trigger_conditions: vec![],
            trigger_field: Some(FieldPredicate {
                field_id: "finish".into(),
                condition: TriggerCondition::Equals {
                    value: SignalValue::Text("glossy".into()),
                },
            }),
            ..addon
        };
        let mut answers = FormAnswers::new();
        answers.insert("finish".into(), json!("Glossy"));
        let m = run(&addon, "", &answers, &FusedSignals::default());
        assert_eq!(m.source, Some(AddonMatchSource::CustomerSelected));
    }

    #[test]
    fn test_already_detected_skipped() {
        let matcher = AddonMatcher::new(&cleaning_service(), "needs polish");
        let detected: HashSet<String> = ["polish".to_string()].into_iter().collect();
        let m = matcher.match_addon(
            &polish_addon(),
            &FusedSignals::default(),
            &FormAnswers::new(),
            "needs polish",
            &detected,
        );
        assert!(!m.applies);
    }
}
