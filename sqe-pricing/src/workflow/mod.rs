//! Per-quote pricing workflow
//!
//! One job runs start to finish inside [`PricingPipeline::run`]:
//! 1. Load the quote context
//! 2. Extract signals from photos (timeout-bounded)
//! 3. Fuse vision, notes and form answers
//! 4. Evaluate the pricing configuration
//! 5. Apply the confidence and fallback policy
//! 6. Persist one complete result, then notify

pub mod pipeline;

pub use pipeline::{PipelineConfig, PricingPipeline};
