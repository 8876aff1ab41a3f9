//! Historical quote persistence.
//!
//! Append-only SQLite store of collected quotes, queried by model and
//! time window. The pipeline treats this purely as a sink/source of
//! quote batches.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tracing::{debug, info};

use crate::types::Quote;

const CREATE_TABLE: &str = "
CREATE TABLE IF NOT EXISTS gpu_prices (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    provider TEXT NOT NULL,
    region TEXT NOT NULL,
    gpu_model TEXT NOT NULL,
    price_per_hour REAL NOT NULL,
    availability REAL NOT NULL,
    instance_type TEXT,
    gpu_count INTEGER,
    memory_gb INTEGER,
    timestamp TEXT NOT NULL,
    created_at TEXT NOT NULL
)";

const CREATE_MODEL_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_gpu_prices_model_ts ON gpu_prices (gpu_model, timestamp)";

const CREATE_PROVIDER_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_gpu_prices_provider ON gpu_prices (provider)";

/// Aggregate statistics over the whole store.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub total_quotes: i64,
    pub distinct_models: i64,
    pub distinct_providers: i64,
    pub avg_price: Option<f64>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

/// SQLite-backed quote store.
pub struct PriceStore {
    pool: SqlitePool,
}

impl PriceStore {
    /// Connect and ensure the schema exists.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await
            .with_context(|| format!("Failed to open price store at {url}"))?;

        sqlx::query(CREATE_TABLE).execute(&pool).await?;
        sqlx::query(CREATE_MODEL_INDEX).execute(&pool).await?;
        sqlx::query(CREATE_PROVIDER_INDEX).execute(&pool).await?;

        info!(url, "Price store ready");
        Ok(Self { pool })
    }

    /// Append a batch of quotes. Returns the number of rows inserted.
    pub async fn insert_batch(&self, quotes: &[Quote]) -> Result<u64> {
        let created_at = Utc::now().to_rfc3339();
        let mut inserted = 0u64;

        let mut tx = self.pool.begin().await.context("Failed to begin insert transaction")?;
        for q in quotes {
            sqlx::query(
                "INSERT INTO gpu_prices \
                 (provider, region, gpu_model, price_per_hour, availability, \
                  instance_type, gpu_count, memory_gb, timestamp, created_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&q.provider)
            .bind(&q.region)
            .bind(&q.gpu_model)
            .bind(q.price_per_hour.to_f64().unwrap_or(0.0))
            .bind(q.availability)
            .bind(&q.instance_type)
            .bind(q.gpu_count.map(|c| c as i64))
            .bind(q.memory_gb.map(|m| m as i64))
            .bind(q.timestamp.to_rfc3339())
            .bind(&created_at)
            .execute(&mut *tx)
            .await
            .context("Failed to insert quote")?;
            inserted += 1;
        }
        tx.commit().await.context("Failed to commit insert transaction")?;

        debug!(inserted, "Quotes persisted");
        Ok(inserted)
    }

    /// Quotes for one GPU model observed within the last `hours`,
    /// newest first.
    pub async fn quotes_for_gpu(&self, gpu_model: &str, hours: i64) -> Result<Vec<Quote>> {
        let cutoff = (Utc::now() - chrono::Duration::hours(hours)).to_rfc3339();

        let rows = sqlx::query(
            "SELECT provider, region, gpu_model, price_per_hour, availability, \
                    instance_type, gpu_count, memory_gb, timestamp \
             FROM gpu_prices \
             WHERE gpu_model = ? AND timestamp >= ? \
             ORDER BY timestamp DESC",
        )
        .bind(gpu_model)
        .bind(&cutoff)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Failed to query history for {gpu_model}"))?;

        rows.iter().map(row_to_quote).collect()
    }

    /// Aggregate statistics over everything persisted so far.
    pub async fn aggregate_stats(&self) -> Result<StoreStats> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS total, \
                    COUNT(DISTINCT gpu_model) AS models, \
                    COUNT(DISTINCT provider) AS providers, \
                    AVG(price_per_hour) AS avg_price, \
                    MIN(price_per_hour) AS min_price, \
                    MAX(price_per_hour) AS max_price \
             FROM gpu_prices",
        )
        .fetch_one(&self.pool)
        .await
        .context("Failed to compute store statistics")?;

        Ok(StoreStats {
            total_quotes: row.get("total"),
            distinct_models: row.get("models"),
            distinct_providers: row.get("providers"),
            avg_price: row.get("avg_price"),
            min_price: row.get("min_price"),
            max_price: row.get("max_price"),
        })
    }
}

fn row_to_quote(row: &sqlx::sqlite::SqliteRow) -> Result<Quote> {
    let ts: String = row.get("timestamp");
    let timestamp = DateTime::parse_from_rfc3339(&ts)
        .context("Malformed timestamp in store")?
        .with_timezone(&Utc);

    let price: f64 = row.get("price_per_hour");

    Ok(Quote {
        provider: row.get("provider"),
        region: row.get("region"),
        gpu_model: row.get("gpu_model"),
        price_per_hour: Decimal::from_f64(price).unwrap_or_default(),
        availability: row.get("availability"),
        instance_type: row.get("instance_type"),
        gpu_count: row.get::<Option<i64>, _>("gpu_count").map(|c| c as u32),
        memory_gb: row.get::<Option<i64>, _>("memory_gb").map(|m| m as u32),
        timestamp,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
