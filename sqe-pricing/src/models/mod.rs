//! Data models for the pricing pipeline

pub mod job;
pub mod pricing_config;
pub mod service;
pub mod trace;

pub use job::{JobOutput, PricingJob, QuoteContext, QuoteRecord, QuoteStatus};
pub use pricing_config::{
    Addon, CatalogItem, ConditionRule, CostType, FieldPredicate, MeasurementModel, Multiplier,
    MultiplierTrigger, PricingConfiguration, QuantitySource, SiteVisitRules, TaxConfig,
    TriggerCondition, WorkStep,
};
pub use service::{FallbackMode, JobData, Service, ServiceConfig};
pub use trace::{
    LineItem, PriceRange, PricingResult, PricingTrace, TraceBuilder, TraceStep, TraceStepType,
    TraceSummary,
};
