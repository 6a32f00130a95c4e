//! Shared fixtures for sqe-pricing integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use sqe_common::events::EventBus;
use sqe_pricing::db::{init_tables, SqliteQuoteRepository};
use sqe_pricing::inference::{ExtractionContext, ExtractionOutput, InferenceClient};
use sqe_pricing::models::{
    CostType, PricingConfiguration, QuantitySource, QuoteContext, Service, ServiceConfig,
    TaxConfig, WorkStep,
};
use sqe_pricing::types::{Signal, SignalSource, SignalValue};
use sqe_pricing::{ExtractionError, PipelineConfig, PricingPipeline};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Inference client returning a canned response
pub struct MockInference {
    response: Result<ExtractionOutput, ExtractionError>,
    calls: AtomicUsize,
}

impl MockInference {
    pub fn returning(output: ExtractionOutput) -> Arc<Self> {
        Arc::new(Self {
            response: Ok(output),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(error: ExtractionError) -> Arc<Self> {
        Arc::new(Self {
            response: Err(error),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InferenceClient for MockInference {
    async fn extract(
        &self,
        _images: &[String],
        _context: &ExtractionContext,
    ) -> Result<ExtractionOutput, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.response.clone()
    }
}

/// Confident vision output for a window cleaning job
pub fn confident_vision() -> ExtractionOutput {
    ExtractionOutput {
        signals: vec![
            Signal::new("window_count", SignalValue::Number(12.0), 0.9, SignalSource::Vision),
            Signal::new("condition_rating", SignalValue::Text("good".into()), 0.85, SignalSource::Vision),
        ],
        overall_confidence: 0.88,
        low_confidence_keys: vec![],
        warnings: vec![],
    }
}

pub async fn test_repository() -> SqliteQuoteRepository {
    let pool = SqlitePool::connect(":memory:").await.unwrap();
    init_tables(&pool).await.unwrap();
    SqliteQuoteRepository::new(pool)
}

pub fn window_cleaning_pricing() -> PricingConfiguration {
    PricingConfiguration {
        base_fee: 40.0,
        work_steps: vec![WorkStep {
            id: "panes".into(),
            name: "Window panes".into(),
            cost_type: CostType::PerUnit,
            default_cost: 8.0,
            optional: false,
            trigger_signal: None,
            trigger_condition: None,
            quantity_source: Some(QuantitySource::AiSignal {
                signal_key: "window_count".into(),
            }),
            unit_label: Some("window".into()),
        }],
        ..Default::default()
    }
}

/// Quote context for a window cleaning request with one photo
pub fn window_cleaning_context(config: ServiceConfig) -> QuoteContext {
    let mut form_answers = sqe_pricing::types::FormAnswers::new();
    form_answers.insert("stories".into(), json!(2));
    QuoteContext {
        quote_id: Uuid::new_v4(),
        tenant_id: Uuid::new_v4(),
        service: Service {
            id: Uuid::new_v4(),
            name: "Window cleaning".into(),
            config,
            ..Default::default()
        },
        pricing: Some(window_cleaning_pricing()),
        widget_fields: vec![],
        tax: TaxConfig {
            enabled: true,
            rate: 10.0,
            label: None,
        },
        currency: "USD".into(),
        form_answers,
        customer_notes: "Front and back windows".into(),
        image_urls: vec!["https://img.example/front.jpg".into()],
        other_services: vec![],
    }
}

pub fn pipeline(
    repo: SqliteQuoteRepository,
    inference: Arc<dyn InferenceClient>,
    bus: EventBus,
) -> PricingPipeline {
    PricingPipeline::new(PipelineConfig::default(), Arc::new(repo), inference, bus)
}
