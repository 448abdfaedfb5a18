//! Database operations for `market_intelligence`.

use chrono::{DateTime, Utc};
use pricesync_core::MarketIntelligenceRecord;
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::DbError;

/// A row from the `market_intelligence` table.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct MarketIntelligenceRow {
    pub id: i64,
    pub catalog_identifier: String,
    pub marketplace_id: String,
    pub current_price: Decimal,
    pub list_price: Option<Decimal>,
    pub sales_rank: Option<i32>,
    pub in_stock: Option<bool>,
    pub fulfillment_method: Option<String>,
    /// One of `authoritative`, `catalog_fallback`, `cost_derived`.
    pub price_source: String,
    pub confidence: i16,
    pub profit_margin: Option<Decimal>,
    pub competitiveness_score: Option<i16>,
    pub raw_payload: Option<serde_json::Value>,
    pub price_fetched_at: DateTime<Utc>,
    pub last_synced_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Inserts or refreshes the market snapshot for one catalog identifier.
///
/// Conflicts on `(catalog_identifier, marketplace_id)` overwrite the price,
/// rank, availability, source and scoring columns and bump
/// `price_fetched_at` / `last_synced_at`. `id` and `created_at` are never
/// touched, so applying the same record twice leaves one row whose
/// non-timestamp columns are unchanged.
///
/// Prices are cast to `NUMERIC(12,2)` by the database.
///
/// Returns the row `id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_market_intelligence(
    pool: &PgPool,
    record: &MarketIntelligenceRecord,
) -> Result<i64, DbError> {
    let id: i64 = sqlx::query_scalar::<_, i64>(
        "INSERT INTO market_intelligence \
             (catalog_identifier, marketplace_id, current_price, list_price, sales_rank, \
              in_stock, fulfillment_method, price_source, confidence, profit_margin, \
              competitiveness_score, raw_payload) \
         VALUES ($1, $2, $3::numeric(12,2), $4::numeric(12,2), $5, \
                 $6, $7, $8, $9, $10::numeric(10,4), \
                 $11, $12::jsonb) \
         ON CONFLICT (catalog_identifier, marketplace_id) DO UPDATE SET \
             current_price         = EXCLUDED.current_price, \
             list_price            = EXCLUDED.list_price, \
             sales_rank            = EXCLUDED.sales_rank, \
             in_stock              = EXCLUDED.in_stock, \
             fulfillment_method    = EXCLUDED.fulfillment_method, \
             price_source          = EXCLUDED.price_source, \
             confidence            = EXCLUDED.confidence, \
             profit_margin         = EXCLUDED.profit_margin, \
             competitiveness_score = EXCLUDED.competitiveness_score, \
             raw_payload           = EXCLUDED.raw_payload, \
             price_fetched_at      = NOW(), \
             last_synced_at        = NOW() \
         RETURNING id",
    )
    .bind(&record.catalog_identifier)
    .bind(&record.marketplace_id)
    .bind(record.current_price)
    .bind(record.list_price)
    .bind(record.sales_rank)
    .bind(record.in_stock)
    .bind(&record.fulfillment_method)
    .bind(record.price_source.as_str())
    .bind(i16::from(record.confidence))
    .bind(record.profit_margin)
    .bind(record.competitiveness_score.map(i16::from))
    .bind(&record.raw_payload)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Returns the stored snapshot for an identifier, if any.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_market_intelligence(
    pool: &PgPool,
    catalog_identifier: &str,
    marketplace_id: &str,
) -> Result<Option<MarketIntelligenceRow>, DbError> {
    let row = sqlx::query_as::<_, MarketIntelligenceRow>(
        "SELECT id, catalog_identifier, marketplace_id, current_price, list_price, \
                sales_rank, in_stock, fulfillment_method, price_source, confidence, \
                profit_margin, competitiveness_score, raw_payload, \
                price_fetched_at, last_synced_at, created_at \
         FROM market_intelligence \
         WHERE catalog_identifier = $1 AND marketplace_id = $2",
    )
    .bind(catalog_identifier)
    .bind(marketplace_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}
