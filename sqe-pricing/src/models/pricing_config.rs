//! Declarative pricing configuration authored by the tenant
//!
//! Loaded once per run and never mutated by the pipeline. Union-like shapes
//! (quantity sources, trigger conditions, multiplier triggers) are tagged
//! enums so every variant is handled explicitly.

use serde::{Deserialize, Serialize};

use crate::types::SignalValue;

/// How a work step's cost scales
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostType {
    Fixed,
    PerUnit,
    PerHour,
}

/// Where a work step's quantity comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuantitySource {
    /// Customer answer (trusted)
    FormField {
        #[serde(rename = "fieldId")]
        field_id: String,
    },
    /// Literal configuration value (trusted)
    Constant { value: f64 },
    /// Fused signal value (not trusted)
    AiSignal {
        #[serde(rename = "signalKey")]
        signal_key: String,
    },
}

/// Condition evaluated against a signal or answer value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operator", rename_all = "snake_case")]
pub enum TriggerCondition {
    Exists,
    NotExists,
    Equals { value: SignalValue },
    Gt { value: f64 },
    Gte { value: f64 },
    Lt { value: f64 },
    Lte { value: f64 },
    Contains { value: String },
}

impl TriggerCondition {
    /// Evaluate against an optional value (None = signal absent)
    pub fn evaluate(&self, value: Option<&SignalValue>) -> bool {
        match self {
            TriggerCondition::Exists => value.is_some(),
            TriggerCondition::NotExists => value.is_none(),
            TriggerCondition::Equals { value: expected } => value
                .map(|actual| values_equal(actual, expected))
                .unwrap_or(false),
            TriggerCondition::Gt { value: bound } => compare(value, |n| n > *bound),
            TriggerCondition::Gte { value: bound } => compare(value, |n| n >= *bound),
            TriggerCondition::Lt { value: bound } => compare(value, |n| n < *bound),
            TriggerCondition::Lte { value: bound } => compare(value, |n| n <= *bound),
            TriggerCondition::Contains { value: needle } => value
                .map(|actual| actual.as_text().contains(&needle.trim().to_lowercase()))
                .unwrap_or(false),
        }
    }

    /// Human-readable form for trace entries
    pub fn describe(&self) -> String {
        match self {
            TriggerCondition::Exists => "exists".to_string(),
            TriggerCondition::NotExists => "not exists".to_string(),
            TriggerCondition::Equals { value } => format!("= {}", value),
            TriggerCondition::Gt { value } => format!("> {}", value),
            TriggerCondition::Gte { value } => format!(">= {}", value),
            TriggerCondition::Lt { value } => format!("< {}", value),
            TriggerCondition::Lte { value } => format!("<= {}", value),
            TriggerCondition::Contains { value } => format!("contains '{}'", value),
        }
    }
}

fn compare(value: Option<&SignalValue>, op: impl Fn(f64) -> bool) -> bool {
    value.and_then(SignalValue::as_number).map(op).unwrap_or(false)
}

fn values_equal(actual: &SignalValue, expected: &SignalValue) -> bool {
    match (actual.as_number(), expected.as_number()) {
        (Some(a), Some(b)) => (a - b).abs() < 1e-9,
        _ => actual.as_text() == expected.as_text(),
    }
}

/// Billable unit of work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkStep {
    pub id: String,
    pub name: String,
    pub cost_type: CostType,
    pub default_cost: f64,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub trigger_signal: Option<String>,
    #[serde(default)]
    pub trigger_condition: Option<TriggerCondition>,
    #[serde(default)]
    pub quantity_source: Option<QuantitySource>,
    #[serde(default)]
    pub unit_label: Option<String>,
}

/// Signal key paired with a condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionRule {
    pub signal_key: String,
    pub condition: TriggerCondition,
}

/// Predicate on a customer form answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldPredicate {
    pub field_id: String,
    pub condition: TriggerCondition,
}

/// Conditional price delta
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Addon {
    pub id: String,
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub trigger_keywords: Vec<String>,
    #[serde(default)]
    pub trigger_conditions: Vec<ConditionRule>,
    #[serde(default)]
    pub trigger_field: Option<FieldPredicate>,
    #[serde(default)]
    pub description: Option<String>,
}

/// When a multiplier applies
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MultiplierTrigger {
    #[default]
    Always,
    Signal {
        #[serde(rename = "signalKey")]
        signal_key: String,
        #[serde(default)]
        condition: Option<TriggerCondition>,
    },
    FormField {
        #[serde(rename = "fieldId")]
        field_id: String,
        #[serde(default)]
        condition: Option<TriggerCondition>,
    },
    Keywords { keywords: Vec<String> },
}

/// Scalar applied to the running total
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Multiplier {
    pub id: String,
    pub name: String,
    pub factor: f64,
    #[serde(default)]
    pub trigger: MultiplierTrigger,
}

/// Per-unit pricing of a measured quantity (area, length, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementModel {
    /// Vision/form signal carrying the quantity
    pub signal_key: String,
    pub unit_label: String,
    pub price_per_unit: f64,
    #[serde(default)]
    pub form_field_id: Option<String>,
}

/// Inventory entry the inference service may match in photos
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    pub id: String,
    pub name: String,
    pub unit_price: f64,
    /// Extra signal keys that carry this item's count
    #[serde(default)]
    pub match_keys: Vec<String>,
}

/// When to recommend visiting the site before committing to a price
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SiteVisitRules {
    pub always_recommend: bool,
    pub confidence_below: Option<f64>,
    pub total_above: Option<f64>,
    pub trigger_signals: Vec<ConditionRule>,
}

/// Complete tenant pricing configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PricingConfiguration {
    pub base_fee: f64,
    pub minimum_charge: f64,
    pub work_steps: Vec<WorkStep>,
    pub addons: Vec<Addon>,
    pub multipliers: Vec<Multiplier>,
    pub measurement_model: Option<MeasurementModel>,
    pub site_visit_rules: Option<SiteVisitRules>,
    pub item_catalog: Vec<CatalogItem>,
}

/// Tax settings for the tenant
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaxConfig {
    pub enabled: bool,
    /// Percentage (20.0 = 20%)
    pub rate: f64,
    pub label: Option<String>,
}

impl TaxConfig {
    /// Effective rate in percent (0 when disabled)
    pub fn effective_rate(&self) -> f64 {
        if self.enabled && self.rate > 0.0 {
            self.rate
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_source_tagged_json() {
        let src: QuantitySource =
            serde_json::from_str(r#"{"type":"form_field","fieldId":"area"}"#).unwrap();
        assert_eq!(
            src,
            QuantitySource::FormField {
                field_id: "area".to_string()
            }
        );

        let src: QuantitySource =
            serde_json::from_str(r#"{"type":"constant","value":3}"#).unwrap();
        assert_eq!(src, QuantitySource::Constant { value: 3.0 });
    }

    #[test]
    fn test_unknown_quantity_source_rejected() {
        let res: Result<QuantitySource, _> =
            serde_json::from_str(r#"{"type":"guess","value":3}"#);
        assert!(res.is_err());
    }

    #[test]
    fn test_trigger_conditions() {
        let poor = SignalValue::Text("Poor".to_string());
        let four = SignalValue::Number(4.0);

        assert!(TriggerCondition::Exists.evaluate(Some(&poor)));
        assert!(TriggerCondition::NotExists.evaluate(None));
        assert!(TriggerCondition::Equals {
            value: SignalValue::Text("poor".into())
        }
        .evaluate(Some(&poor)));
        assert!(TriggerCondition::Gt { value: 3.0 }.evaluate(Some(&four)));
        assert!(!TriggerCondition::Lt { value: 3.0 }.evaluate(Some(&four)));
        assert!(TriggerCondition::Lte { value: 4.0 }.evaluate(Some(&four)));
        assert!(TriggerCondition::Contains {
            value: "oo".into()
        }
        .evaluate(Some(&poor)));
        assert!(!TriggerCondition::Gte { value: 1.0 }.evaluate(None));
    }

    #[test]
    fn test_configuration_defaults_from_empty_json() {
        let config: PricingConfiguration = serde_json::from_str("{}").unwrap();
        assert_eq!(config, PricingConfiguration::default());
        assert_eq!(config.base_fee, 0.0);
    }

    #[test]
    fn test_work_step_json() {
        let step: WorkStep = serde_json::from_str(
            r#"{
                "id": "sand",
                "name": "Sanding",
                "costType": "per_unit",
                "defaultCost": 10,
                "optional": true,
                "triggerSignal": "needs_sanding",
                "triggerCondition": {"operator": "equals", "value": true},
                "quantitySource": {"type": "ai_signal", "signalKey": "floor_area"},
                "unitLabel": "sqft"
            }"#,
        )
        .unwrap();
        assert_eq!(step.cost_type, CostType::PerUnit);
        assert!(matches!(
            step.trigger_condition,
            Some(TriggerCondition::Equals {
                value: SignalValue::Bool(true)
            })
        ));
    }

    #[test]
    fn test_tax_effective_rate() {
        let tax = TaxConfig {
            enabled: false,
            rate: 20.0,
            label: None,
        };
        assert_eq!(tax.effective_rate(), 0.0);
        let tax = TaxConfig {
            enabled: true,
            ..tax
        };
        assert_eq!(tax.effective_rate(), 20.0);
    }
}
