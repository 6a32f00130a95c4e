//! Quote context and result persistence
//!
//! The intake side writes a `quotes` row with the job context as JSON
//! columns. A pricing run reads that row and writes exactly one
//! `quote_results` row, updating the quote status in the same transaction,
//! so no partial result is ever visible.

use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use sqlx::{Row, SqlitePool};
use sqe_common::{Error, Result};
use tracing::debug;
use uuid::Uuid;

use crate::models::{QuoteContext, QuoteRecord, QuoteStatus};

/// Configuration and persistence collaborator
#[async_trait]
pub trait QuoteRepository: Send + Sync {
    /// Everything the pipeline reads for one quote (None when unknown)
    async fn load_context(&self, quote_id: Uuid) -> Result<Option<QuoteContext>>;

    /// Persist one complete pricing result
    async fn save_result(&self, record: &QuoteRecord) -> Result<()>;

    async fn load_result(&self, quote_id: Uuid) -> Result<Option<QuoteRecord>>;
}

/// SQLite-backed repository
#[derive(Clone)]
pub struct SqliteQuoteRepository {
    pool: SqlitePool,
}

impl SqliteQuoteRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Store (or replace) the context for a quote awaiting pricing
    pub async fn insert_context(&self, context: &QuoteContext) -> Result<()> {
        let pricing = context
            .pricing
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO quotes (
                quote_id, tenant_id, service, pricing, widget_fields, tax, currency,
                form_answers, customer_notes, image_urls, other_services, status, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'pending', ?)
            ON CONFLICT(quote_id) DO UPDATE SET
                tenant_id = excluded.tenant_id,
                service = excluded.service,
                pricing = excluded.pricing,
                widget_fields = excluded.widget_fields,
                tax = excluded.tax,
                currency = excluded.currency,
                form_answers = excluded.form_answers,
                customer_notes = excluded.customer_notes,
                image_urls = excluded.image_urls,
                other_services = excluded.other_services
            "#,
        )
        .bind(context.quote_id.to_string())
        .bind(context.tenant_id.to_string())
        .bind(serde_json::to_string(&context.service)?)
        .bind(pricing)
        .bind(serde_json::to_string(&context.widget_fields)?)
        .bind(serde_json::to_string(&context.tax)?)
        .bind(&context.currency)
        .bind(serde_json::to_string(&context.form_answers)?)
        .bind(&context.customer_notes)
        .bind(serde_json::to_string(&context.image_urls)?)
        .bind(serde_json::to_string(&context.other_services)?)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(())
    }

    /// Current status column of a quote
    pub async fn quote_status(&self, quote_id: Uuid) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT status FROM quotes WHERE quote_id = ?")
            .bind(quote_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(row.map(|(status,)| status))
    }
}

fn parse_json<T: DeserializeOwned>(column: &str, raw: &str) -> Result<T> {
    serde_json::from_str(raw)
        .map_err(|e| Error::Internal(format!("Stored {} is not valid JSON: {}", column, e)))
}

fn parse_uuid(column: &str, raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| Error::Internal(format!("Stored {} is not a UUID: {}", column, e)))
}

#[async_trait]
impl QuoteRepository for SqliteQuoteRepository {
    async fn load_context(&self, quote_id: Uuid) -> Result<Option<QuoteContext>> {
        let row = sqlx::query(
            r#"
            SELECT quote_id, tenant_id, service, pricing, widget_fields, tax, currency,
                   form_answers, customer_notes, image_urls, other_services
            FROM quotes WHERE quote_id = ?
            "#,
        )
        .bind(quote_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let pricing: Option<String> = row.get("pricing");
        let context = QuoteContext {
            quote_id: parse_uuid("quote_id", row.get("quote_id"))?,
            tenant_id: parse_uuid("tenant_id", row.get("tenant_id"))?,
            service: parse_json("service", row.get("service"))?,
            pricing: pricing
                .as_deref()
                .map(|raw| parse_json("pricing", raw))
                .transpose()?,
            widget_fields: parse_json("widget_fields", row.get("widget_fields"))?,
            tax: parse_json("tax", row.get("tax"))?,
            currency: row.get("currency"),
            form_answers: parse_json("form_answers", row.get("form_answers"))?,
            customer_notes: row.get("customer_notes"),
            image_urls: parse_json("image_urls", row.get("image_urls"))?,
            other_services: parse_json("other_services", row.get("other_services"))?,
        };
        debug!(quote_id = %quote_id, "Loaded quote context");
        Ok(Some(context))
    }

    async fn save_result(&self, record: &QuoteRecord) -> Result<()> {
        let quote_id = record.quote_id.to_string();
        let now = Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        sqlx::query(
            r#"
            INSERT INTO quote_results (
                quote_id, price, trace, fused_signals, decision, final_status, total, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(quote_id) DO UPDATE SET
                price = excluded.price,
                trace = excluded.trace,
                fused_signals = excluded.fused_signals,
                decision = excluded.decision,
                final_status = excluded.final_status,
                total = excluded.total,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&quote_id)
        .bind(serde_json::to_string(&record.price)?)
        .bind(serde_json::to_string(&record.trace)?)
        .bind(serde_json::to_string(&record.fused_signals)?)
        .bind(serde_json::to_string(&record.decision)?)
        .bind(record.final_status.as_str())
        .bind(record.price.total)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        sqlx::query("UPDATE quotes SET status = ? WHERE quote_id = ?")
            .bind(record.final_status.as_str())
            .bind(&quote_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;

        debug!(quote_id = %record.quote_id, status = %record.final_status, "Saved pricing result");
        Ok(())
    }

    async fn load_result(&self, quote_id: Uuid) -> Result<Option<QuoteRecord>> {
        let row = sqlx::query(
            r#"
            SELECT price, trace, fused_signals, decision, final_status
            FROM quote_results WHERE quote_id = ?
            "#,
        )
        .bind(quote_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let status: String = row.get("final_status");
        let final_status = QuoteStatus::parse(&status)
            .ok_or_else(|| Error::Internal(format!("Unknown stored quote status '{}'", status)))?;
        Ok(Some(QuoteRecord {
            quote_id,
            price: parse_json("price", row.get("price"))?,
            trace: parse_json("trace", row.get("trace"))?,
            fused_signals: parse_json("fused_signals", row.get("fused_signals"))?,
            decision: parse_json("decision", row.get("decision"))?,
            final_status,
        }))
    }
}
