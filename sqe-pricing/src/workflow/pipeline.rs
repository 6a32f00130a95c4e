//! Pipeline Orchestrator
//!
//! # Error Handling
//! - Signal quality problems never fail a job: extraction failures, missing
//!   pricing rules and ambiguous answers degrade the result and add a note
//! - Rate limiting fails the job as retryable with a backoff hint
//! - Persistence failures fail the job as retryable; nothing is notified

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sqe_common::events::{EventBus, QuoteEvent};
use tracing::{debug, error, info, warn};

use crate::db::QuoteRepository;
use crate::error::{ExtractionError, PipelineError};
use crate::fusion::fuse;
use crate::inference::{extract_with_timeout, ExtractionContext, ExtractionOutput, InferenceClient};
use crate::models::{
    JobData, JobOutput, PricingConfiguration, PricingJob, QuoteContext, QuoteRecord, QuoteStatus,
};
use crate::policy::{decide, PolicyInputs};
use crate::pricing::evaluate;
use crate::pricing::money::fmt_money;
use crate::types::FusedSignals;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Budget for one extraction call
    pub extraction_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            extraction_timeout: Duration::from_secs(30),
        }
    }
}

/// Pricing pipeline for one worker
///
/// Holds no per-job state; any number of jobs may run concurrently.
pub struct PricingPipeline {
    config: PipelineConfig,
    repository: Arc<dyn QuoteRepository>,
    inference: Arc<dyn InferenceClient>,
    event_bus: EventBus,
}

impl PricingPipeline {
    pub fn new(
        config: PipelineConfig,
        repository: Arc<dyn QuoteRepository>,
        inference: Arc<dyn InferenceClient>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            config,
            repository,
            inference,
            event_bus,
        }
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn repository(&self) -> &Arc<dyn QuoteRepository> {
        &self.repository
    }

    /// Run one job to completion
    pub async fn run(&self, job: &PricingJob) -> JobOutput {
        info!(
            quote_id = %job.quote_id,
            tenant_id = %job.tenant_id,
            retry = job.retry_count,
            "Pricing job started"
        );

        match self.price(job).await {
            Ok(output) => output,
            Err(e) => {
                let retryable = e.is_retryable();
                error!(quote_id = %job.quote_id, retryable, "Pricing job failed: {}", e);
                self.event_bus.emit_lossy(QuoteEvent::PricingFailed {
                    quote_id: job.quote_id,
                    error: e.to_string(),
                    retryable,
                    timestamp: Utc::now(),
                });
                JobOutput::failed(e.to_string(), retryable, e.retry_after_secs())
            }
        }
    }

    async fn price(&self, job: &PricingJob) -> Result<JobOutput, PipelineError> {
        let context = self
            .repository
            .load_context(job.quote_id)
            .await?
            .ok_or(PipelineError::QuoteNotFound(job.quote_id))?;

        let mut degradation_notes = Vec::new();

        // Phase 1: extraction
        let extraction = self.extract(&context, &mut degradation_notes).await?;

        // Phase 2: fusion
        let fused = fuse(
            &extraction.signals,
            &context.form_answers,
            &context.widget_fields,
            &context.service.expected_signals,
            &context.customer_notes,
        );
        degradation_notes.extend(fusion_notes(&fused));

        // Phase 3: evaluation
        let pricing = match &context.pricing {
            Some(pricing) => pricing.clone(),
            None => {
                let missing = PipelineError::ConfigurationMissing(context.service.id);
                warn!("{}; using zero-valued defaults", missing);
                degradation_notes.push(
                    "No pricing rules are configured for this service; zero-valued defaults were used"
                        .to_string(),
                );
                PricingConfiguration::default()
            }
        };
        let job_data = JobData {
            service: context.service.clone(),
            customer_notes: context.customer_notes.clone(),
            other_services: context.other_services.clone(),
            legacy_confidence: Some(extraction.overall_confidence),
        };
        let evaluation = evaluate(
            &pricing,
            &fused,
            &context.form_answers,
            &job_data,
            &context.tax,
            &context.currency,
        );

        // Phase 4: policy
        let referenced = evaluation.referenced_signal_keys();
        let decision = decide(
            &context.service.config,
            &fused,
            evaluation.price.total,
            PolicyInputs {
                referenced_keys: Some(&referenced),
                legacy_confidence: job_data.legacy_confidence,
                reported_low_keys: &extraction.low_confidence_keys,
                site_visit_rules: pricing.site_visit_rules.as_ref(),
            },
        );

        let mut price = evaluation.price;
        price.notes.extend(degradation_notes);
        price.notes.extend(decision.notes.iter().cloned());
        if decision.show_range {
            price.range = decision.range;
        }
        let final_status = decision.status_override;

        let record = QuoteRecord {
            quote_id: context.quote_id,
            price: price.clone(),
            trace: evaluation.trace.clone(),
            fused_signals: fused,
            decision,
            final_status,
        };

        // Phase 5: one complete write, then notify
        self.repository.save_result(&record).await?;
        self.notify(&context, &record);

        info!(
            quote_id = %context.quote_id,
            total = %fmt_money(price.total),
            status = %final_status,
            "Pricing job complete"
        );

        Ok(JobOutput {
            success: true,
            error: None,
            price: Some(price),
            trace: Some(evaluation.trace),
            status: Some(final_status),
            retryable: false,
            retry_after_secs: None,
        })
    }

    /// Extract signals, degrading to the no-signal default on failure
    async fn extract(
        &self,
        context: &QuoteContext,
        notes: &mut Vec<String>,
    ) -> Result<ExtractionOutput, PipelineError> {
        let photos_required = context.service.config.photos_required;

        if context.image_urls.is_empty() {
            if photos_required {
                notes.push("Photos were requested but none were uploaded".to_string());
            }
            debug!("No photos supplied, skipping extraction");
            return Ok(ExtractionOutput::no_signals(photos_required, false));
        }

        let request = ExtractionContext {
            service_name: context.service.name.clone(),
            expected_signals: context.service.expected_signals.clone(),
            customer_notes: context.customer_notes.clone(),
            photos_required,
        };

        match extract_with_timeout(
            self.inference.as_ref(),
            &context.image_urls,
            &request,
            self.config.extraction_timeout,
        )
        .await
        {
            Ok(mut output) => {
                debug!(signals = output.signals.len(), "Extraction succeeded");
                if output.signals.is_empty() {
                    let fallback = ExtractionOutput::no_signals(photos_required, true);
                    output.overall_confidence = output.overall_confidence.min(fallback.overall_confidence);
                    output.warnings.extend(fallback.warnings);
                }
                notes.extend(output.warnings.iter().cloned());
                Ok(output)
            }
            Err(e @ ExtractionError::RateLimited { .. }) => Err(e.into()),
            Err(e) => {
                warn!("Extraction degraded: {}", e);
                notes.push(e.degradation_note());
                let fallback = ExtractionOutput::no_signals(photos_required, true);
                notes.extend(fallback.warnings.iter().cloned());
                Ok(fallback)
            }
        }
    }

    /// Notification goes out only for quotes cleared to send
    fn notify(&self, context: &QuoteContext, record: &QuoteRecord) {
        let event = match record.final_status {
            QuoteStatus::Sent => QuoteEvent::QuoteSent {
                quote_id: record.quote_id,
                tenant_id: context.tenant_id,
                total: record.price.total,
                currency: record.price.currency.clone(),
                summary: summarize(record),
                timestamp: Utc::now(),
            },
            QuoteStatus::PendingReview => QuoteEvent::QuoteHeldForReview {
                quote_id: record.quote_id,
                tenant_id: context.tenant_id,
                reason: record.decision.reason.clone(),
                timestamp: Utc::now(),
            },
        };
        self.event_bus.emit_lossy(event);
    }
}

/// Notes explaining what fusion set aside or overrode
fn fusion_notes(fused: &FusedSignals) -> Vec<String> {
    let mut notes = Vec::new();
    if !fused.excluded.is_empty() {
        notes.push(format!(
            "Unclear answers were not used for pricing: {}",
            fused.excluded.join(", ")
        ));
    }
    for conflict in &fused.conflicts {
        notes.push(format!(
            "Customer answer for {} ({}) differs from the photos ({}); using the {} value",
            conflict.key,
            conflict.customer_value,
            conflict.vision_value,
            conflict.resolved_source
        ));
    }
    notes
}

fn summarize(record: &QuoteRecord) -> String {
    let mut parts: Vec<String> = record
        .price
        .line_items
        .iter()
        .map(|item| format!("{} {}", item.label, fmt_money(item.amount)))
        .collect();
    if let Some(range) = &record.price.range {
        parts.push(format!(
            "range {} to {}",
            fmt_money(range.low),
            fmt_money(range.high)
        ));
    }
    parts.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Signal, SignalConflict, SignalSource, SignalValue};

    #[test]
    fn test_fusion_notes() {
        let fused = FusedSignals {
            signals: vec![Signal::from_form("condition", SignalValue::Text("good".into()))],
            conflicts: vec![SignalConflict {
                key: "condition".into(),
                vision_key: "condition_rating".into(),
                customer_value: SignalValue::Text("good".into()),
                customer_source: SignalSource::Form,
                vision_value: SignalValue::Text("poor".into()),
                vision_confidence: 0.9,
                resolved_source: SignalSource::Form,
                resolved_value: SignalValue::Text("good".into()),
                similarity: None,
                explanation: "rank differs".into(),
            }],
            excluded: vec!["stories".into()],
        };
        let notes = fusion_notes(&fused);
        assert_eq!(notes.len(), 2);
        assert!(notes[0].contains("stories"));
        assert!(notes[1].contains("using the form value"));
    }
}
