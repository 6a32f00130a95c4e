//! Configuration resolution for sqe-pricing
//!
//! Inference settings come from three tiers with priority
//! Database → ENV → TOML. A missing API key is not an error: the worker
//! still prices quotes from form answers, with a degradation note.

use sqlx::{Pool, Sqlite};
use sqe_common::config::TomlConfig;
use sqe_common::Result;
use std::time::Duration;
use tracing::{info, warn};

use crate::db::settings;

/// Environment variable carrying the inference API key
pub const INFERENCE_API_KEY_ENV: &str = "SQE_INFERENCE_API_KEY";

/// Resolved inference collaborator settings
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceSettings {
    /// None disables extraction
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub requests_per_minute: u32,
}

/// Resolve inference API key from 3-tier configuration
///
/// **Priority:** Database → ENV → TOML
pub async fn resolve_inference_api_key(
    db: &Pool<Sqlite>,
    toml_config: &TomlConfig,
) -> Result<Option<String>> {
    let db_key = settings::get_inference_api_key(db)
        .await?
        .filter(|k| is_valid_key(k));
    let env_key = std::env::var(INFERENCE_API_KEY_ENV)
        .ok()
        .filter(|k| is_valid_key(k));
    let toml_key = toml_config
        .inference
        .api_key
        .clone()
        .filter(|k| is_valid_key(k));

    let sources: Vec<&str> = [
        ("database", db_key.is_some()),
        ("environment", env_key.is_some()),
        ("TOML", toml_key.is_some()),
    ]
    .iter()
    .filter(|(_, present)| *present)
    .map(|(name, _)| *name)
    .collect();

    if sources.len() > 1 {
        warn!(
            "Inference API key found in multiple sources: {}. Using {} (highest priority).",
            sources.join(", "),
            sources[0]
        );
    }

    if let Some(key) = db_key {
        info!("Inference API key loaded from database");
        return Ok(Some(key));
    }
    if let Some(key) = env_key {
        info!("Inference API key loaded from environment variable");
        return Ok(Some(key));
    }
    if let Some(key) = toml_key {
        info!("Inference API key loaded from TOML config");
        return Ok(Some(key));
    }

    warn!(
        "Inference API key not configured (set {} or [inference] api_key)",
        INFERENCE_API_KEY_ENV
    );
    Ok(None)
}

/// Resolve all inference settings
///
/// `timeout_override` and `rate_override` come from the command line and
/// win over database and TOML values.
pub async fn resolve_inference_settings(
    db: &Pool<Sqlite>,
    toml_config: &TomlConfig,
    timeout_override: Option<u64>,
    rate_override: Option<u32>,
) -> Result<InferenceSettings> {
    let endpoint = match settings::get_inference_endpoint(db).await? {
        Some(url) if !url.trim().is_empty() => Some(url),
        _ => toml_config
            .inference
            .endpoint
            .clone()
            .filter(|url| !url.trim().is_empty()),
    };

    let timeout_secs = match timeout_override {
        Some(secs) => secs,
        None => settings::get_inference_timeout_secs(db, toml_config.inference.timeout_secs).await?,
    };

    Ok(InferenceSettings {
        endpoint,
        api_key: resolve_inference_api_key(db, toml_config).await?,
        timeout: Duration::from_secs(timeout_secs.max(1)),
        requests_per_minute: rate_override.unwrap_or(toml_config.inference.requests_per_minute),
    })
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
