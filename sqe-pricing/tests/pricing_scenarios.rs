//! End-to-end pricing properties: fusion → evaluation → policy, no I/O

use serde_json::json;
use sqe_pricing::fusion::fuse;
use sqe_pricing::models::{
    Addon, CostType, FallbackMode, JobData, Multiplier, MultiplierTrigger, PricingConfiguration,
    QuantitySource, QuoteStatus, Service, ServiceConfig, TaxConfig, TraceStepType, WorkStep,
};
use sqe_pricing::policy::{decide, PolicyInputs};
use sqe_pricing::pricing::{evaluate, MINIMUM_CHARGE_LABEL};
use sqe_pricing::types::{FormAnswers, FusedSignals, Signal, SignalSource, SignalValue};

fn per_unit_step(id: &str, price: f64, field: &str) -> WorkStep {
    WorkStep {
        id: id.into(),
        name: id.replace('_', " "),
        cost_type: CostType::PerUnit,
        default_cost: price,
        optional: false,
        trigger_signal: None,
        trigger_condition: None,
        quantity_source: Some(QuantitySource::FormField {
            field_id: field.into(),
        }),
        unit_label: Some("sqft".into()),
    }
}

fn job_with_notes(notes: &str) -> JobData {
    JobData {
        service: Service {
            name: "Floor refinishing".into(),
            ..Default::default()
        },
        customer_notes: notes.into(),
        ..Default::default()
    }
}

fn answers(pairs: &[(&str, serde_json::Value)]) -> FormAnswers {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn no_tax() -> TaxConfig {
    TaxConfig::default()
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn scenario_1_base_fee_plus_per_unit_form_quantity() {
    let config = PricingConfiguration {
        base_fee: 50.0,
        work_steps: vec![per_unit_step("sanding", 10.0, "area")],
        ..Default::default()
    };
    let answers = answers(&[("area", json!(120))]);
    let fused = fuse(&[], &answers, &[], &[], "");

    let eval = evaluate(&config, &fused, &answers, &job_with_notes(""), &no_tax(), "USD");

    let step = eval
        .trace
        .steps_of(TraceStepType::WorkStep)
        .next()
        .expect("work step entry");
    assert_eq!(step.amount, 1200.0);
    assert_eq!(eval.price.subtotal, 1250.0);
    assert_eq!(eval.price.tax_amount, 0.0);
    assert_eq!(eval.price.total, 1250.0);
}

#[test]
fn scenario_2_minimum_charge_collapses_breakdown() {
    let config = PricingConfiguration {
        base_fee: 50.0,
        minimum_charge: 200.0,
        work_steps: vec![per_unit_step("sanding", 10.0, "area")],
        ..Default::default()
    };
    let answers = answers(&[("area", json!(10))]);
    let fused = fuse(&[], &answers, &[], &[], "");

    let eval = evaluate(&config, &fused, &answers, &job_with_notes(""), &no_tax(), "USD");

    assert_eq!(eval.trace.summary.pre_minimum_subtotal, 150.0);
    assert_eq!(eval.price.line_items.len(), 1);
    assert_eq!(eval.price.line_items[0].label, MINIMUM_CHARGE_LABEL);
    assert_eq!(eval.price.line_items[0].amount, 200.0);
    assert_eq!(eval.price.total, 200.0);

    let minimum: Vec<_> = eval.trace.steps_of(TraceStepType::Minimum).collect();
    assert_eq!(minimum.len(), 1);
    assert_eq!(minimum[0].amount, 50.0);
}

#[test]
fn scenario_3_tax_on_rounded_subtotal() {
    let config = PricingConfiguration {
        base_fee: 50.0,
        work_steps: vec![per_unit_step("sanding", 10.0, "area")],
        ..Default::default()
    };
    let tax = TaxConfig {
        enabled: true,
        rate: 20.0,
        label: Some("VAT".into()),
    };
    let answers = answers(&[("area", json!(120))]);
    let fused = fuse(&[], &answers, &[], &[], "");

    let eval = evaluate(&config, &fused, &answers, &job_with_notes(""), &tax, "GBP");

    assert_eq!(eval.price.subtotal, 1250.0);
    assert_eq!(eval.price.tax_amount, 250.0);
    assert_eq!(eval.price.total, 1500.0);
    assert_eq!(eval.price.currency, "GBP");
    let tax_entry = eval.trace.steps_of(TraceStepType::Tax).next().expect("tax entry");
    assert_eq!(tax_entry.description, "VAT");
}

#[test]
fn scenario_4_form_condition_beats_vision_condition_rating() {
    let vision = vec![Signal::new(
        "condition_rating",
        SignalValue::Text("poor".into()),
        0.9,
        SignalSource::Vision,
    )];
    let answers = answers(&[("condition", json!("good"))]);

    let fused = fuse(&vision, &answers, &[], &[], "");

    assert_eq!(fused.text("condition").as_deref(), Some("good"));
    assert_eq!(fused.text("condition_rating").as_deref(), Some("good"));
    assert_eq!(fused.conflicts.len(), 1);
    let conflict = &fused.conflicts[0];
    assert_eq!(conflict.customer_value, SignalValue::Text("good".into()));
    assert_eq!(conflict.vision_value, SignalValue::Text("poor".into()));
    assert_eq!(conflict.resolved_source, SignalSource::Form);
}

// ============================================================================
// Properties
// ============================================================================

#[test]
fn form_precedence_holds_for_every_shared_key() {
    let vision = vec![
        Signal::new("window_count", SignalValue::Number(14.0), 0.95, SignalSource::Vision),
        Signal::new("has_screens", SignalValue::Bool(false), 0.99, SignalSource::Vision),
        Signal::new("roof_type", SignalValue::Text("slate".into()), 0.97, SignalSource::Vision),
    ];
    let answers = answers(&[
        ("window_count", json!("8")),
        ("has_screens", json!(true)),
        ("roof_type", json!("asphalt shingle")),
    ]);

    let fused = fuse(&vision, &answers, &[], &[], "");

    assert_eq!(fused.number("window_count"), Some(8.0));
    assert_eq!(fused.get("has_screens").map(|s| &s.value), Some(&SignalValue::Bool(true)));
    assert_eq!(fused.text("roof_type").as_deref(), Some("asphalt shingle"));
    for key in ["window_count", "has_screens", "roof_type"] {
        let signal = fused.get(key).unwrap();
        assert_eq!(signal.source, SignalSource::Form);
        assert_eq!(signal.confidence, 1.0);
        assert!(
            fused
                .conflicts
                .iter()
                .any(|c| c.key == key && c.resolved_source == SignalSource::Form),
            "conflict for {}",
            key
        );
    }
}

#[test]
fn trace_amounts_sum_to_total_across_configurations() {
    let base = PricingConfiguration {
        base_fee: 33.33,
        work_steps: vec![per_unit_step("coat", 1.115, "area")],
        addons: vec![Addon {
            id: "polish".into(),
            name: "Polish".into(),
            price: 19.99,
            trigger_keywords: vec!["polish".into()],
            trigger_conditions: vec![],
            trigger_field: None,
            description: None,
        }],
        multipliers: vec![
            Multiplier {
                id: "rush".into(),
                name: "Rush".into(),
                factor: 1.175,
                trigger: MultiplierTrigger::Always,
            },
            Multiplier {
                id: "stairs".into(),
                name: "Stairs".into(),
                factor: 1.07,
                trigger: MultiplierTrigger::Keywords {
                    keywords: vec!["stairs".into()],
                },
            },
        ],
        ..Default::default()
    };
    let configs = vec![
        base.clone(),
        PricingConfiguration {
            minimum_charge: 10_000.0,
            ..base.clone()
        },
        PricingConfiguration {
            multipliers: vec![],
            ..base
        },
    ];
    let taxes = [
        no_tax(),
        TaxConfig {
            enabled: true,
            rate: 8.875,
            label: None,
        },
    ];
    let vision = vec![Signal::new(
        "complexity",
        SignalValue::Text("high".into()),
        0.8,
        SignalSource::Vision,
    )];
    let notes = "please polish the stairs too";

    for config in &configs {
        for tax in &taxes {
            for area in [0, 1, 333, 1217] {
                let answers = answers(&[("area", json!(area))]);
                let fused = fuse(&vision, &answers, &[], &[], notes);
                let eval = evaluate(config, &fused, &answers, &job_with_notes(notes), tax, "USD");
                assert_eq!(
                    eval.trace.reconstructed_total(),
                    eval.price.total,
                    "area {} rate {}",
                    area,
                    tax.rate
                );
                assert_eq!(
                    eval.trace.steps.last().map(|s| s.running_total),
                    Some(eval.price.total)
                );
            }
        }
    }
}

#[test]
fn zero_quantity_steps_never_appear_in_trace() {
    let config = PricingConfiguration {
        base_fee: 25.0,
        work_steps: vec![
            per_unit_step("sanding", 10.0, "area"),
            WorkStep {
                id: "labor".into(),
                name: "Labor".into(),
                cost_type: CostType::PerHour,
                default_cost: 60.0,
                optional: true,
                trigger_signal: None,
                trigger_condition: None,
                quantity_source: Some(QuantitySource::AiSignal {
                    signal_key: "estimated_hours".into(),
                }),
                unit_label: Some("hour".into()),
            },
        ],
        ..Default::default()
    };
    let vision = vec![Signal::new(
        "estimated_hours",
        SignalValue::Number(0.0),
        0.9,
        SignalSource::Vision,
    )];
    let answers = answers(&[("area", json!(0))]);
    let fused = fuse(&vision, &answers, &[], &[], "");

    let eval = evaluate(&config, &fused, &answers, &job_with_notes(""), &no_tax(), "USD");

    assert_eq!(eval.trace.steps_of(TraceStepType::WorkStep).count(), 0);
    assert_eq!(eval.price.total, 25.0);
}

#[test]
fn negated_keyword_never_triggers_addon() {
    let config = PricingConfiguration {
        base_fee: 100.0,
        addons: vec![Addon {
            id: "polish".into(),
            name: "Polish".into(),
            price: 40.0,
            trigger_keywords: vec!["polish".into()],
            trigger_conditions: vec![],
            trigger_field: None,
            description: None,
        }],
        ..Default::default()
    };
    let empty = FormAnswers::new();
    let fused = FusedSignals::default();

    let declined = evaluate(&config, &fused, &empty, &job_with_notes("no polish needed"), &no_tax(), "USD");
    assert_eq!(declined.price.total, 100.0);
    assert_eq!(declined.trace.steps_of(TraceStepType::Addon).count(), 0);

    let wanted = evaluate(&config, &fused, &empty, &job_with_notes("needs polish"), &no_tax(), "USD");
    assert_eq!(wanted.price.total, 140.0);
    assert_eq!(wanted.trace.steps_of(TraceStepType::Addon).count(), 1);
}

#[test]
fn global_suppressor_voids_keyword_addons() {
    let config = PricingConfiguration {
        addons: vec![Addon {
            id: "polish".into(),
            name: "Polish".into(),
            price: 40.0,
            trigger_keywords: vec!["polish".into()],
            trigger_conditions: vec![],
            trigger_field: None,
            description: None,
        }],
        ..Default::default()
    };
    let notes = "would like polish but budget only please";
    let eval = evaluate(
        &config,
        &FusedSignals::default(),
        &FormAnswers::new(),
        &job_with_notes(notes),
        &no_tax(),
        "USD",
    );
    assert_eq!(eval.price.total, 0.0);
    assert!(eval.price.notes.iter().any(|n| n.contains("budget only")));
}

#[test]
fn low_confidence_vision_quantity_is_shown_as_range() {
    let config = PricingConfiguration {
        work_steps: vec![WorkStep {
            id: "panes".into(),
            name: "Window panes".into(),
            cost_type: CostType::PerUnit,
            default_cost: 12.5,
            optional: false,
            trigger_signal: None,
            trigger_condition: None,
            quantity_source: Some(QuantitySource::AiSignal {
                signal_key: "window_count".into(),
            }),
            unit_label: Some("window".into()),
        }],
        ..Default::default()
    };
    let vision = vec![Signal::new(
        "window_count",
        SignalValue::Number(16.0),
        0.45,
        SignalSource::Vision,
    )];
    let fused = fuse(&vision, &FormAnswers::new(), &[], &[], "");
    let job = job_with_notes("");
    let eval = evaluate(&config, &fused, &FormAnswers::new(), &job, &no_tax(), "USD");
    assert_eq!(eval.price.total, 200.0);

    let referenced = eval.referenced_signal_keys();
    let decision = decide(
        &job.service.config,
        &fused,
        eval.price.total,
        PolicyInputs {
            referenced_keys: Some(&referenced),
            ..Default::default()
        },
    );

    assert!(decision.triggered);
    assert_eq!(decision.low_confidence_signal_keys, vec!["window_count".to_string()]);
    let range = decision.range.expect("range shown");
    assert_eq!(range.low, 170.0);
    assert_eq!(range.high, 230.0);
}

fn pets_polish_rush_config() -> PricingConfiguration {
    PricingConfiguration {
        base_fee: 100.0,
        work_steps: vec![WorkStep {
            id: "pet_treatment".into(),
            name: "Pet odor treatment".into(),
            cost_type: CostType::Fixed,
            default_cost: 30.0,
            optional: true,
            trigger_signal: Some("has_pets".into()),
            trigger_condition: None,
            quantity_source: None,
            unit_label: None,
        }],
        addons: vec![Addon {
            id: "polish".into(),
            name: "Polish".into(),
            price: 40.0,
            trigger_keywords: vec![],
            trigger_conditions: vec![],
            trigger_field: None,
            description: None,
        }],
        multipliers: vec![Multiplier {
            id: "rush".into(),
            name: "Rush".into(),
            factor: 1.5,
            trigger: MultiplierTrigger::FormField {
                field_id: "rush".into(),
                condition: None,
            },
        }],
        ..Default::default()
    }
}

#[test]
fn vague_answers_never_enter_firm_pricing() {
    let config = pets_polish_rush_config();
    let vague = answers(&[
        ("polish", json!("maybe")),
        ("has_pets", json!("tbd")),
        ("rush", json!("not sure")),
    ]);
    let fused = fuse(&[], &vague, &[], &[], "");
    assert_eq!(
        fused.excluded,
        vec!["has_pets".to_string(), "polish".to_string(), "rush".to_string()]
    );

    let eval = evaluate(&config, &fused, &vague, &job_with_notes(""), &no_tax(), "USD");
    assert_eq!(eval.price.total, 100.0);
    assert_eq!(eval.trace.steps_of(TraceStepType::WorkStep).count(), 0);
    assert_eq!(eval.trace.steps_of(TraceStepType::Addon).count(), 0);
    assert_eq!(eval.trace.steps_of(TraceStepType::Multiplier).count(), 0);

    let firm = answers(&[
        ("polish", json!(true)),
        ("has_pets", json!("yes")),
        ("rush", json!(true)),
    ]);
    let fused = fuse(&[], &firm, &[], &[], "");
    let eval = evaluate(&config, &fused, &firm, &job_with_notes(""), &no_tax(), "USD");
    // (100 + 30 + 40) × 1.5
    assert_eq!(eval.price.total, 255.0);
}

#[test]
fn form_only_quote_is_confident_without_photos() {
    let config = PricingConfiguration {
        work_steps: vec![per_unit_step("sanding", 2.0, "area")],
        ..Default::default()
    };
    let form = answers(&[("area", json!(120))]);
    let fused = fuse(&[], &form, &[], &[], "");
    let eval = evaluate(&config, &fused, &form, &job_with_notes(""), &no_tax(), "USD");
    assert_eq!(eval.price.total, 240.0);

    let referenced = eval.referenced_signal_keys();
    let service_config = ServiceConfig {
        fallback_mode: FallbackMode::RequireReview,
        ..Default::default()
    };
    let decision = decide(
        &service_config,
        &fused,
        eval.price.total,
        PolicyInputs {
            referenced_keys: Some(&referenced),
            // the no-photo default from the inference side
            legacy_confidence: Some(0.3),
            ..Default::default()
        },
    );

    assert_eq!(decision.overall_confidence, 1.0);
    assert!(!decision.triggered);
    assert_eq!(decision.status_override, QuoteStatus::Sent);
    assert!(decision.range.is_none());
}
