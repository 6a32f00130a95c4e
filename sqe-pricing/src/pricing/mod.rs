//! Pricing evaluation
//!
//! Work step resolution, measured quantities, multipliers and the staged
//! evaluator that turns a pricing configuration plus fused signals into a
//! price and its trace.

pub mod evaluator;
pub mod measurement;
pub mod money;
pub mod multipliers;
pub mod trigger_resolver;

pub use evaluator::{evaluate, Evaluation, LEGACY_MARKER, MINIMUM_CHARGE_LABEL};
pub use money::round_money;
pub use trigger_resolver::{resolve_step, QuantityOrigin, ResolvedStep};
