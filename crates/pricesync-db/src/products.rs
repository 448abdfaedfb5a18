//! Read access to `products` and `product_cost`.
//!
//! Both tables belong to the catalog subsystem. The only write this engine
//! performs on `products` is the listed-price update inside an identifier
//! correction (see [`crate::identifiers::apply_identifier_correction`]).

use pricesync_core::ProductCostRecord;
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::DbError;

/// One product considered for a sync cycle, joined with its cost and its
/// currently active catalog mapping on the target marketplace.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct SyncCandidateRow {
    pub product_id: i64,
    pub barcode: Option<String>,
    pub listed_price: Option<Decimal>,
    /// `NULL` when no `product_cost` row exists.
    pub unit_cost: Option<Decimal>,
    /// `NULL` when the barcode has no active mapping yet.
    pub catalog_identifier: Option<String>,
}

impl SyncCandidateRow {
    #[must_use]
    pub fn cost_record(&self) -> ProductCostRecord {
        ProductCostRecord {
            product_id: self.product_id,
            unit_cost: self.unit_cost,
            current_listed_price: self.listed_price,
        }
    }
}

/// Returns up to `limit` products that have either a barcode or an active
/// mapping, ordered by `id` so repeated runs walk the catalog stably.
///
/// When several active mappings exist for a barcode (mid-correction), the
/// highest-confidence, most recently verified one wins.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_sync_candidates(
    pool: &PgPool,
    marketplace_id: &str,
    limit: i64,
) -> Result<Vec<SyncCandidateRow>, DbError> {
    let rows = sqlx::query_as::<_, SyncCandidateRow>(
        "SELECT p.id AS product_id, p.barcode, p.listed_price, pc.unit_cost, \
                m.catalog_identifier \
         FROM products p \
         LEFT JOIN product_cost pc ON pc.product_id = p.id \
         LEFT JOIN LATERAL ( \
             SELECT im.catalog_identifier \
             FROM identifier_mappings im \
             WHERE im.barcode = p.barcode \
               AND im.marketplace_id = $1 \
               AND im.is_active \
             ORDER BY im.confidence DESC, im.last_verified_at DESC NULLS LAST, im.id DESC \
             LIMIT 1 \
         ) m ON TRUE \
         WHERE p.barcode IS NOT NULL AND p.barcode <> '' \
         ORDER BY p.id \
         LIMIT $2",
    )
    .bind(marketplace_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns the cost record for a single product, or `None` if the product
/// does not exist.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_product_cost(
    pool: &PgPool,
    product_id: i64,
) -> Result<Option<ProductCostRecord>, DbError> {
    let row: Option<(i64, Option<Decimal>, Option<Decimal>)> = sqlx::query_as(
        "SELECT p.id, pc.unit_cost, p.listed_price \
         FROM products p \
         LEFT JOIN product_cost pc ON pc.product_id = p.id \
         WHERE p.id = $1",
    )
    .bind(product_id)
    .fetch_optional(pool)
    .await?;

    Ok(
        row.map(|(product_id, unit_cost, current_listed_price)| ProductCostRecord {
            product_id,
            unit_cost,
            current_listed_price,
        }),
    )
}
