//! Pricing trace and price breakdown
//!
//! The trace is the audit artifact: every stage that changed the running
//! total appends exactly one entry, and the amounts (rounded to cents) sum
//! to the reported total.

use serde::{Deserialize, Serialize};

use crate::pricing::money::round_money;

/// Pricing stage that produced a trace entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStepType {
    BaseFee,
    WorkStep,
    Inventory,
    Measurement,
    Addon,
    Multiplier,
    Complexity,
    Minimum,
    Tax,
}

/// One line of the calculation trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceStep {
    #[serde(rename = "type")]
    pub step_type: TraceStepType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub description: String,
    pub signals_used: Vec<String>,
    pub calculation: String,
    pub amount: f64,
    pub running_total: f64,
}

/// Per-stage subtotals
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceSummary {
    pub base_fee: f64,
    pub work_steps: f64,
    pub inventory: f64,
    pub measurement: f64,
    pub addons: f64,
    pub multiplier_adjustment: f64,
    pub minimum_applied: bool,
    pub pre_minimum_subtotal: f64,
    pub subtotal: f64,
    pub tax_amount: f64,
    pub total: f64,
}

/// Completed, immutable trace
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PricingTrace {
    pub steps: Vec<TraceStep>,
    pub summary: TraceSummary,
}

impl PricingTrace {
    /// Re-derive the total from the entries alone
    pub fn reconstructed_total(&self) -> f64 {
        let cents: i64 = self
            .steps
            .iter()
            .map(|s| (round_money(s.amount) * 100.0).round() as i64)
            .sum();
        cents as f64 / 100.0
    }

    pub fn steps_of(&self, step_type: TraceStepType) -> impl Iterator<Item = &TraceStep> {
        self.steps.iter().filter(move |s| s.step_type == step_type)
    }
}

/// Append-only trace under construction
#[derive(Debug, Default)]
pub struct TraceBuilder {
    steps: Vec<TraceStep>,
    running_total: f64,
}

impl TraceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry; the amount is rounded to cents first
    ///
    /// Returns the new running total.
    pub fn push(
        &mut self,
        step_type: TraceStepType,
        id: Option<String>,
        description: impl Into<String>,
        signals_used: Vec<String>,
        calculation: impl Into<String>,
        amount: f64,
    ) -> f64 {
        let amount = round_money(amount);
        self.running_total = round_money(self.running_total + amount);
        self.steps.push(TraceStep {
            step_type,
            id,
            description: description.into(),
            signals_used,
            calculation: calculation.into(),
            amount,
            running_total: self.running_total,
        });
        self.running_total
    }

    pub fn running_total(&self) -> f64 {
        self.running_total
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn finish(self, summary: TraceSummary) -> PricingTrace {
        PricingTrace {
            steps: self.steps,
            summary,
        }
    }
}

/// Customer-facing breakdown line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub label: String,
    pub amount: f64,
    pub kind: TraceStepType,
}

/// Displayed price range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub low: f64,
    pub high: f64,
}

/// Final priced result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingResult {
    pub currency: String,
    pub line_items: Vec<LineItem>,
    pub subtotal: f64,
    pub tax_rate: f64,
    pub tax_amount: f64,
    pub total: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<PriceRange>,
    pub notes: Vec<String>,
    pub legacy_estimation_used: bool,
}
