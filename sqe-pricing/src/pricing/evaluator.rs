// Pricing Evaluator - Configuration × Signals → Price + Trace
//
// Stage order (fixed):
// 1. Base fee
// 2. Work steps, in configuration order
// 3. Inventory (catalog unit price × matched count)
// 4. Measurement model (per-unit pricing of a measured quantity)
// 5. Addons
// 6. Multipliers, compounding on the running total, then complexity
// 7. Minimum charge (collapses the breakdown)
// 8. Tax
//
// Every stage rounds to cents before the running total moves on, so the
// trace amounts always sum to the reported total.

use std::collections::{BTreeSet, HashSet};

use tracing::{debug, info};

use super::measurement::select_quantity;
use super::money::{fmt_money, fmt_quantity, round_money};
use super::multipliers::{complexity_factor, multiplier_applies};
use super::trigger_resolver::{resolve_step, ResolvedStep};
use crate::matching::{detect_cross_services, AddonMatch, AddonMatcher, CrossServiceSuggestion};
use crate::models::{
    CostType, JobData, LineItem, PricingConfiguration, PricingResult, PricingTrace, TaxConfig,
    TraceBuilder, TraceStepType, TraceSummary, WorkStep,
};
use crate::types::{FormAnswers, FusedSignals};

/// Marker appended to trace calculations of legacy estimates
pub const LEGACY_MARKER: &str = "[legacy estimate]";

/// Label of the collapsed minimum-charge line
pub const MINIMUM_CHARGE_LABEL: &str = "Minimum charge";

/// Evaluator output
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub price: PricingResult,
    pub trace: PricingTrace,
    /// Resolution for every configured work step, in order
    pub steps: Vec<(String, ResolvedStep)>,
    pub addon_matches: Vec<(String, AddonMatch)>,
    pub suggestions: Vec<CrossServiceSuggestion>,
}

impl Evaluation {
    /// Signal keys referenced by work steps that actually triggered
    pub fn referenced_signal_keys(&self) -> BTreeSet<String> {
        self.steps
            .iter()
            .filter(|(_, r)| r.triggered)
            .flat_map(|(_, r)| r.signals_used.iter().cloned())
            .collect()
    }
}

/// Evaluate a pricing configuration against a fused signal set
pub fn evaluate(
    config: &PricingConfiguration,
    fused: &FusedSignals,
    answers: &FormAnswers,
    job_data: &JobData,
    tax: &TaxConfig,
    currency: &str,
) -> Evaluation {
    let mut run = Run::default();
    let notes = job_data.customer_notes.as_str();

    // 1. Base fee
    if config.base_fee != 0.0 {
        run.summary.base_fee = run.add(
            TraceStepType::BaseFee,
            None,
            "Base fee",
            Vec::new(),
            fmt_money(config.base_fee),
            config.base_fee,
        );
    }

    // 2. Work steps
    let mut steps = Vec::with_capacity(config.work_steps.len());
    for step in &config.work_steps {
        let resolved = resolve_step(step, fused, answers);
        if resolved.triggered {
            run.summary.work_steps += price_step(&mut run, step, &resolved);
        } else {
            debug!(step = %step.id, reason = %resolved.reason, "Work step not triggered");
        }
        steps.push((step.id.clone(), resolved));
    }
    run.summary.work_steps = round_money(run.summary.work_steps);

    // 3. Inventory
    for item in &config.item_catalog {
        let primary = format!("item:{}", item.id);
        let found = std::iter::once(primary.as_str())
            .chain(item.match_keys.iter().map(String::as_str))
            .find_map(|key| fused.number(key).filter(|n| *n > 0.0).map(|n| (key.to_string(), n)));
        let Some((key, count)) = found else {
            continue;
        };
        run.summary.inventory += run.add(
            TraceStepType::Inventory,
            Some(item.id.clone()),
            item.name.clone(),
            vec![key],
            format!("{} × {}", fmt_quantity(count), fmt_money(item.unit_price)),
            count * item.unit_price,
        );
    }
    run.summary.inventory = round_money(run.summary.inventory);

    // 4. Measurement
    if let Some(model) = &config.measurement_model {
        match select_quantity(model, fused, answers) {
            Some(measured) => {
                if let Some(note) = measured.discrepancy_note {
                    run.notes.push(note);
                }
                run.summary.measurement = run.add(
                    TraceStepType::Measurement,
                    Some(model.signal_key.clone()),
                    format!("Measured {}", model.unit_label),
                    vec![measured.signal_key],
                    format!(
                        "{} {} × {} ({})",
                        fmt_quantity(measured.quantity),
                        model.unit_label,
                        fmt_money(model.price_per_unit),
                        measured.source.as_str()
                    ),
                    measured.quantity * model.price_per_unit,
                );
            }
            None => run
                .notes
                .push(format!("No {} measurement available; measured pricing skipped", model.unit_label)),
        }
    }

    // 5. Addons
    let matcher = AddonMatcher::new(&job_data.service, notes);
    let mut detected: HashSet<String> = HashSet::new();
    let mut addon_matches = Vec::with_capacity(config.addons.len());
    let mut suppressed_any = false;
    for addon in &config.addons {
        let m = matcher.match_addon(addon, fused, answers, notes, &detected);
        if m.applies {
            detected.insert(addon.id.clone());
            run.summary.addons += run.add(
                TraceStepType::Addon,
                Some(addon.id.clone()),
                addon.name.clone(),
                m.signals_used.clone(),
                format!("{} ({})", fmt_money(addon.price), m.reason),
                addon.price,
            );
            if m.auto_recommended {
                run.notes.push(format!("Added {}: {}", addon.name, m.reason));
            }
        } else if m.reason.contains("suppressed by") {
            suppressed_any = true;
        }
        addon_matches.push((addon.id.clone(), m));
    }
    run.summary.addons = round_money(run.summary.addons);
    if let (true, Some(phrase)) = (suppressed_any, matcher.suppressor()) {
        run.notes.push(format!("Customer asked for '{}'; suggested extras were left out", phrase));
    }

    let suggestions = detect_cross_services(notes, &job_data.service, &job_data.other_services);
    run.notes.extend(suggestions.iter().map(CrossServiceSuggestion::note));

    // 6. Multipliers, then complexity
    for multiplier in &config.multipliers {
        let (hit, keys) = multiplier_applies(multiplier, fused, answers, notes);
        if !hit || multiplier.factor == 1.0 {
            continue;
        }
        run.summary.multiplier_adjustment += run.scale(
            TraceStepType::Multiplier,
            Some(multiplier.id.clone()),
            format!("{} (×{})", multiplier.name, multiplier.factor),
            keys,
            multiplier.factor,
        );
    }
    if let Some((factor, key)) = complexity_factor(fused) {
        if factor != 1.0 {
            run.summary.multiplier_adjustment += run.scale(
                TraceStepType::Complexity,
                None,
                format!("Complexity adjustment (×{})", factor),
                vec![key],
                factor,
            );
        }
    }
    run.summary.multiplier_adjustment = round_money(run.summary.multiplier_adjustment);

    // 7. Minimum charge
    let pre_minimum = run.trace.running_total();
    run.summary.pre_minimum_subtotal = pre_minimum;
    if config.minimum_charge > 0.0 && pre_minimum < config.minimum_charge {
        let minimum = round_money(config.minimum_charge);
        run.trace.push(
            TraceStepType::Minimum,
            None,
            MINIMUM_CHARGE_LABEL,
            Vec::new(),
            format!("{} − {}", fmt_money(minimum), fmt_money(pre_minimum)),
            minimum - pre_minimum,
        );
        run.line_items = vec![LineItem {
            label: MINIMUM_CHARGE_LABEL.to_string(),
            amount: minimum,
            kind: TraceStepType::Minimum,
        }];
        run.summary.minimum_applied = true;
        run.notes.push(format!(
            "Minimum charge of {} applied (calculated {})",
            fmt_money(minimum),
            fmt_money(pre_minimum)
        ));
    }
    let subtotal = run.trace.running_total();
    run.summary.subtotal = subtotal;

    // 8. Tax
    let rate = tax.effective_rate();
    let tax_amount = round_money(subtotal * rate / 100.0);
    if tax_amount != 0.0 {
        let label = tax.label.clone().unwrap_or_else(|| "Tax".to_string());
        run.trace.push(
            TraceStepType::Tax,
            None,
            label,
            Vec::new(),
            format!("{} × {}%", fmt_money(subtotal), rate),
            tax_amount,
        );
    }
    let total = round_money(subtotal + tax_amount);
    run.summary.tax_amount = tax_amount;
    run.summary.total = total;

    info!(
        subtotal,
        tax = tax_amount,
        total,
        entries = run.trace.len(),
        minimum_applied = run.summary.minimum_applied,
        "Pricing evaluated"
    );

    let price = PricingResult {
        currency: currency.to_string(),
        line_items: run.line_items,
        subtotal,
        tax_rate: rate,
        tax_amount,
        total,
        range: None,
        notes: run.notes,
        legacy_estimation_used: run.legacy_used,
    };

    Evaluation {
        price,
        trace: run.trace.finish(run.summary),
        steps,
        addon_matches,
        suggestions,
    }
}

/// Mutable state for one evaluation
#[derive(Default)]
struct Run {
    trace: TraceBuilder,
    summary: TraceSummary,
    line_items: Vec<LineItem>,
    notes: Vec<String>,
    legacy_used: bool,
}

impl Run {
    /// Append an additive entry and its line item; returns the rounded amount
    fn add(
        &mut self,
        step_type: TraceStepType,
        id: Option<String>,
        label: impl Into<String>,
        signals_used: Vec<String>,
        calculation: impl Into<String>,
        amount: f64,
    ) -> f64 {
        let label = label.into();
        let amount = round_money(amount);
        self.trace
            .push(step_type, id, label.clone(), signals_used, calculation, amount);
        self.line_items.push(LineItem {
            label,
            amount,
            kind: step_type,
        });
        amount
    }

    /// Scale the running total; the entry carries the difference
    fn scale(
        &mut self,
        step_type: TraceStepType,
        id: Option<String>,
        label: String,
        signals_used: Vec<String>,
        factor: f64,
    ) -> f64 {
        let before = self.trace.running_total();
        let after = round_money(before * factor);
        let delta = round_money(after - before);
        let calculation = format!("{} × {} = {}", fmt_money(before), factor, fmt_money(after));
        self.add(step_type, id, label, signals_used, calculation, delta)
    }
}

/// Price one triggered work step; zero amounts leave no trace
fn price_step(run: &mut Run, step: &WorkStep, resolved: &ResolvedStep) -> f64 {
    let (amount, mut calculation) = match step.cost_type {
        CostType::Fixed => (step.default_cost, format!("fixed {}", fmt_money(step.default_cost))),
        CostType::PerUnit | CostType::PerHour => {
            let unit = step.unit_label.clone().unwrap_or_else(|| match step.cost_type {
                CostType::PerHour => "hours".to_string(),
                _ => "units".to_string(),
            });
            (
                resolved.quantity * step.default_cost,
                format!(
                    "{} {} × {} ({})",
                    fmt_quantity(resolved.quantity),
                    unit,
                    fmt_money(step.default_cost),
                    resolved.source.as_str()
                ),
            )
        }
    };

    if round_money(amount) == 0.0 {
        debug!(step = %step.id, "Work step resolved to zero, dropped");
        return 0.0;
    }

    if resolved.is_legacy() {
        calculation.push(' ');
        calculation.push_str(LEGACY_MARKER);
        run.legacy_used = true;
        run.notes.push(format!(
            "'{}' was estimated without a configured quantity source {}",
            step.name, LEGACY_MARKER
        ));
    }

    run.add(
        TraceStepType::WorkStep,
        Some(step.id.clone()),
        step.name.clone(),
        resolved.signals_used.clone(),
        calculation,
        amount,
    )
}
