//! Settings database operations
//!
//! Key-value accessors for the settings table. Values are stored as text
//! and parsed on read.

use sqlx::{Pool, Sqlite};
use sqe_common::{Error, Result};

#[cfg(test)]
use sqlx::SqlitePool;

pub const INFERENCE_API_KEY: &str = "inference_api_key";
pub const INFERENCE_ENDPOINT: &str = "inference_endpoint";
pub const INFERENCE_TIMEOUT_SECS: &str = "inference_timeout_secs";

/// Get inference service API key from database
///
/// **Returns:** Some(key) if exists, None if not set
pub async fn get_inference_api_key(db: &Pool<Sqlite>) -> Result<Option<String>> {
    get_setting::<String>(db, INFERENCE_API_KEY).await
}

/// Set inference service API key in database
pub async fn set_inference_api_key(db: &Pool<Sqlite>, key: String) -> Result<()> {
    set_setting(db, INFERENCE_API_KEY, key).await
}

pub async fn get_inference_endpoint(db: &Pool<Sqlite>) -> Result<Option<String>> {
    get_setting::<String>(db, INFERENCE_ENDPOINT).await
}

/// Get extraction timeout override
///
/// **Default:** `fallback` (the TOML value)
pub async fn get_inference_timeout_secs(db: &Pool<Sqlite>, fallback: u64) -> Result<u64> {
    get_setting(db, INFERENCE_TIMEOUT_SECS)
        .await
        .map(|opt| opt.unwrap_or(fallback))
}

/// Generic setting getter (internal)
async fn get_setting<T>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await
        .map_err(Error::Database)?;

    match row {
        Some((value,)) => {
            let parsed = value
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Parse setting '{}' failed: {}", key, e)))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

/// Generic setting setter (internal)
async fn set_setting<T>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()>
where
    T: std::fmt::Display,
{
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await
    .map_err(Error::Database)?;

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
