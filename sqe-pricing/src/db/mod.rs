//! Database access for sqe-pricing
//!
//! One SQLite file in the root folder holds worker settings, the quote
//! context written by the intake side, and one result row per priced quote.

pub mod quotes;
pub mod settings;

pub use quotes::{QuoteRepository, SqliteQuoteRepository};

use sqe_common::{Error, Result};
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
///
/// Creates the database file and the pricing tables when missing.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // mode=rwc: read, write, create
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await.map_err(Error::Database)?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// Create settings, quotes and quote_results tables if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(Error::Database)?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS quotes (
            quote_id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            service TEXT NOT NULL,
            pricing TEXT,
            widget_fields TEXT NOT NULL DEFAULT '[]',
            tax TEXT NOT NULL DEFAULT '{}',
            currency TEXT NOT NULL DEFAULT 'USD',
            form_answers TEXT NOT NULL DEFAULT '{}',
            customer_notes TEXT NOT NULL DEFAULT '',
            image_urls TEXT NOT NULL DEFAULT '[]',
            other_services TEXT NOT NULL DEFAULT '[]',
            status TEXT NOT NULL DEFAULT 'pending',
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(Error::Database)?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS quote_results (
            quote_id TEXT PRIMARY KEY,
            price TEXT NOT NULL,
            trace TEXT NOT NULL,
            fused_signals TEXT NOT NULL,
            decision TEXT NOT NULL,
            final_status TEXT NOT NULL,
            total REAL NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(Error::Database)?;

    tracing::info!("Database tables initialized (settings, quotes, quote_results)");

    Ok(())
}
