//! Keyword rule table
//!
//! Negation and suppression phrases live in one table of pattern → effect.
//! Adding a phrase is a new row, not a change to matching code.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// What a matched rule does to keyword detection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleEffect {
    /// Voids a keyword that follows within `window` intervening words
    Negate { window: usize },
    /// Voids every keyword-triggered match for the whole run
    SuppressAll,
}

/// Rule table row
#[derive(Debug, Clone, Copy)]
pub struct KeywordRule {
    pub name: &'static str,
    pub pattern: &'static str,
    pub effect: RuleEffect,
}

pub const KEYWORD_RULES: &[KeywordRule] = &[
    KeywordRule { name: "no", pattern: r"^no$", effect: RuleEffect::Negate { window: 2 } },
    KeywordRule { name: "not", pattern: r"^not$", effect: RuleEffect::Negate { window: 2 } },
    KeywordRule { name: "don't", pattern: r"^don'?t$", effect: RuleEffect::Negate { window: 2 } },
    KeywordRule { name: "without", pattern: r"^without$", effect: RuleEffect::Negate { window: 2 } },
    KeywordRule { name: "skip", pattern: r"^skip(?:ping)?$", effect: RuleEffect::Negate { window: 2 } },
    KeywordRule { name: "avoid", pattern: r"^avoid$", effect: RuleEffect::Negate { window: 2 } },
    KeywordRule { name: "never", pattern: r"^never$", effect: RuleEffect::Negate { window: 2 } },
    KeywordRule { name: "no extras", pattern: r"\bno extras?\b", effect: RuleEffect::SuppressAll },
    KeywordRule { name: "budget only", pattern: r"\bbudget only\b", effect: RuleEffect::SuppressAll },
    KeywordRule { name: "keep it simple", pattern: r"\bkeep it simple\b", effect: RuleEffect::SuppressAll },
];

struct CompiledRule {
    name: &'static str,
    regex: Regex,
    effect: RuleEffect,
}

static COMPILED_RULES: Lazy<Vec<CompiledRule>> = Lazy::new(|| {
    KEYWORD_RULES
        .iter()
        .filter_map(|rule| match Regex::new(&format!("(?i){}", rule.pattern)) {
            Ok(regex) => Some(CompiledRule {
                name: rule.name,
                regex,
                effect: rule.effect,
            }),
            Err(e) => {
                tracing::error!("Invalid keyword rule '{}': {}", rule.name, e);
                None
            }
        })
        .collect()
});

/// Keyword detection outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeywordHit {
    Absent,
    /// Every occurrence was negated; carries the negating rule name
    Negated(&'static str),
    Present,
}

/// Lower-case and normalise typographic apostrophes
pub fn normalize_text(text: &str) -> String {
    text.to_lowercase().replace(['\u{2019}', '\u{2018}'], "'")
}

/// First global suppressor phrase found in the text
pub fn global_suppressor(text: &str) -> Option<&'static str> {
    let text = normalize_text(text);
    COMPILED_RULES
        .iter()
        .filter(|r| r.effect == RuleEffect::SuppressAll)
        .find(|r| r.regex.is_match(&text))
        .map(|r| r.name)
}

/// Find a keyword (plural-tolerant, word-bounded) and check negation
pub fn find_keyword(text: &str, keyword: &str) -> KeywordHit {
    let keyword = keyword.trim().to_lowercase();
    if keyword.is_empty() {
        return KeywordHit::Absent;
    }
    let text = normalize_text(text);
    let pattern = format!(r"\b{}(?:s|es)?\b", regex::escape(&keyword));
    let Ok(re) = Regex::new(&pattern) else {
        return KeywordHit::Absent;
    };

    let mut negated_by = None;
    for m in re.find_iter(&text) {
        match negation_before(&text[..m.start()]) {
            Some(rule) => {
                debug!(keyword = %keyword, rule, "Keyword occurrence negated");
                negated_by = Some(rule);
            }
            None => return KeywordHit::Present,
        }
    }

    match negated_by {
        Some(rule) => KeywordHit::Negated(rule),
        None => KeywordHit::Absent,
    }
}

/// True when the keyword occurs at least once without negation
pub fn keyword_present(text: &str, keyword: &str) -> bool {
    find_keyword(text, keyword) == KeywordHit::Present
}

/// Check the words immediately before a keyword occurrence for a negator
///
/// The window never crosses a sentence or clause boundary.
fn negation_before(prefix: &str) -> Option<&'static str> {
    let clause_start = prefix
        .rfind(['.', '!', '?', ';', ',', '\n'])
        .map(|idx| idx + 1)
        .unwrap_or(0);
    let tokens: Vec<&str> = prefix[clause_start..]
        .split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric() && c != '\''))
        .filter(|t| !t.is_empty())
        .collect();

    for rule in COMPILED_RULES.iter() {
        let RuleEffect::Negate { window } = rule.effect else {
            continue;
        };
        let lookback = (window + 1).min(tokens.len());
        if tokens[tokens.len() - lookback..]
            .iter()
            .any(|t| rule.regex.is_match(t))
        {
            return Some(rule.name);
        }
    }
    None
}
