//! Price range and site-visit rules

use crate::models::{PriceRange, SiteVisitRules};
use crate::pricing::money::{fmt_money, round_money};
use crate::types::FusedSignals;

/// Range of ± `spread_percent` around the total
pub fn price_range(total: f64, spread_percent: f64) -> PriceRange {
    let spread = spread_percent.clamp(0.0, 100.0) / 100.0;
    PriceRange {
        low: round_money(total * (1.0 - spread)),
        high: round_money(total * (1.0 + spread)),
    }
}

/// Reason to recommend a site visit, if any rule fires
pub fn site_visit_reason(
    rules: &SiteVisitRules,
    overall_confidence: f64,
    total: f64,
    fused: &FusedSignals,
) -> Option<String> {
    if rules.always_recommend {
        return Some("this service always includes a site visit".to_string());
    }
    if let Some(threshold) = rules.confidence_below {
        if overall_confidence < threshold {
            return Some(format!(
                "estimate confidence {:.0}% is below {:.0}%",
                overall_confidence * 100.0,
                threshold * 100.0
            ));
        }
    }
    if let Some(limit) = rules.total_above {
        if total > limit {
            return Some(format!("total {} exceeds {}", fmt_money(total), fmt_money(limit)));
        }
    }
    rules
        .trigger_signals
        .iter()
        .find(|rule| rule.condition.evaluate(fused.get(&rule.signal_key).map(|s| &s.value)))
        .map(|rule| format!("{} {}", rule.signal_key, rule.condition.describe()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConditionRule, TriggerCondition};
    use crate::types::{Signal, SignalSource, SignalValue};

    #[test]
    fn test_price_range() {
        let r = price_range(1000.0, 15.0);
        assert_eq!(r.low, 850.0);
        assert_eq!(r.high, 1150.0);
        let r = price_range(99.99, 10.0);
        assert_eq!(r.low, 89.99);
        assert_eq!(r.high, 109.99);
    }

    #[test]
    fn test_site_visit_rules() {
        let rules = SiteVisitRules {
            total_above: Some(5000.0),
            trigger_signals: vec![ConditionRule {
                signal_key: "structural_damage".into(),
                condition: TriggerCondition::Exists,
            }],
            ..Default::default()
        };
        let none = FusedSignals::default();
        assert!(site_visit_reason(&rules, 0.9, 1000.0, &none).is_none());
        assert!(site_visit_reason(&rules, 0.9, 6000.0, &none).is_some());

        let damaged = FusedSignals {
            signals: vec![Signal::new("structural_damage", SignalValue::Bool(true), 0.7, SignalSource::Vision)],
            ..Default::default()
        };
        let reason = site_visit_reason(&rules, 0.9, 1000.0, &damaged).expect("signal rule");
        assert!(reason.contains("structural_damage"));
    }
}
