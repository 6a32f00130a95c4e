//! # SQE Common Library
//!
//! Shared code for the service quote estimator crates:
//! - Error type and result alias
//! - Configuration loading (TOML file, environment, root folder resolution)
//! - Quote lifecycle events and the EventBus used for notifications

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
