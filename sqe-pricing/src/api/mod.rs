//! HTTP surface for sqe-pricing
//!
//! A queue consumer (or a test harness) posts decoded jobs here; the
//! business dashboard reads stored results back.

pub mod health;
pub mod jobs;

pub use health::health_routes;
pub use jobs::job_routes;
