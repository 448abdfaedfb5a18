//! Database operations for `catalog_identifiers` and `identifier_mappings`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `identifier_mappings` table.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct IdentifierMappingRow {
    pub id: i64,
    pub barcode: String,
    pub catalog_identifier: String,
    pub marketplace_id: String,
    /// 0–100, enforced by a CHECK constraint.
    pub confidence: i16,
    /// How the link was established, e.g. `"catalog_search"` or `"import"`.
    pub source: String,
    pub is_active: bool,
    pub discovered_at: DateTime<Utc>,
    pub last_verified_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Descriptive fields stored the first time a catalog identifier is seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogItemMetadata {
    pub title: Option<String>,
    pub brand: Option<String>,
}

/// Everything needed to repoint a product's barcode at a new catalog
/// identifier in one transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentifierCorrection {
    pub product_id: i64,
    pub barcode: String,
    pub catalog_identifier: String,
    pub marketplace_id: String,
    pub confidence: i16,
    pub source: String,
    pub metadata: CatalogItemMetadata,
    /// When present, written to `products.listed_price` in the same transaction.
    pub new_listed_price: Option<Decimal>,
}

/// What [`apply_identifier_correction`] changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrectionWrite {
    /// Previously active mappings for the barcode that were switched off.
    pub deactivated: u64,
    /// `true` if the catalog identifier had never been recorded before.
    pub identifier_inserted: bool,
    pub price_updated: bool,
}

const MAPPING_COLUMNS: &str = "id, barcode, catalog_identifier, marketplace_id, confidence, \
     source, is_active, discovered_at, last_verified_at, updated_at";

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Returns the preferred active mapping for `barcode` on `marketplace_id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_active_mapping(
    pool: &PgPool,
    barcode: &str,
    marketplace_id: &str,
) -> Result<Option<IdentifierMappingRow>, DbError> {
    let row = sqlx::query_as::<_, IdentifierMappingRow>(&format!(
        "SELECT {MAPPING_COLUMNS} \
         FROM identifier_mappings \
         WHERE barcode = $1 AND marketplace_id = $2 AND is_active \
         ORDER BY confidence DESC, last_verified_at DESC NULLS LAST, id DESC \
         LIMIT 1"
    ))
    .bind(barcode)
    .bind(marketplace_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns every mapping (active or not) recorded for a barcode, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_mappings_for_barcode(
    pool: &PgPool,
    barcode: &str,
    marketplace_id: &str,
) -> Result<Vec<IdentifierMappingRow>, DbError> {
    let rows = sqlx::query_as::<_, IdentifierMappingRow>(&format!(
        "SELECT {MAPPING_COLUMNS} \
         FROM identifier_mappings \
         WHERE barcode = $1 AND marketplace_id = $2 \
         ORDER BY updated_at DESC, id DESC"
    ))
    .bind(barcode)
    .bind(marketplace_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Stamps `last_verified_at = NOW()` on an active mapping that the resolver
/// just confirmed.
///
/// Returns `false` if no active mapping matched.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn mark_mapping_verified(
    pool: &PgPool,
    barcode: &str,
    catalog_identifier: &str,
    marketplace_id: &str,
) -> Result<bool, DbError> {
    let result = sqlx::query(
        "UPDATE identifier_mappings \
         SET last_verified_at = NOW(), updated_at = NOW() \
         WHERE barcode = $1 AND catalog_identifier = $2 AND marketplace_id = $3 \
           AND is_active",
    )
    .bind(barcode)
    .bind(catalog_identifier)
    .bind(marketplace_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Repoints a barcode at a new catalog identifier.
///
/// In a single transaction:
/// 1. deactivates every other active mapping for the barcode,
/// 2. records the catalog identifier's metadata if it is unseen,
/// 3. inserts or reactivates the `(barcode, identifier, marketplace)` mapping,
/// 4. writes `new_listed_price` to the product when one is supplied.
///
/// Either all of it lands or none of it does.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if a price update was requested for a
/// product that does not exist (the transaction is rolled back), or
/// [`DbError::Sqlx`] if any statement fails.
pub async fn apply_identifier_correction(
    pool: &PgPool,
    correction: &IdentifierCorrection,
) -> Result<CorrectionWrite, DbError> {
    let mut tx = pool.begin().await?;

    let deactivated = sqlx::query(
        "UPDATE identifier_mappings \
         SET is_active = FALSE, updated_at = NOW() \
         WHERE barcode = $1 AND marketplace_id = $2 AND is_active \
           AND catalog_identifier <> $3",
    )
    .bind(&correction.barcode)
    .bind(&correction.marketplace_id)
    .bind(&correction.catalog_identifier)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    let identifier_inserted = sqlx::query(
        "INSERT INTO catalog_identifiers (catalog_identifier, marketplace_id, title, brand) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (catalog_identifier, marketplace_id) DO NOTHING",
    )
    .bind(&correction.catalog_identifier)
    .bind(&correction.marketplace_id)
    .bind(&correction.metadata.title)
    .bind(&correction.metadata.brand)
    .execute(&mut *tx)
    .await?
    .rows_affected()
        > 0;

    sqlx::query(
        "INSERT INTO identifier_mappings \
             (barcode, catalog_identifier, marketplace_id, confidence, source, \
              is_active, last_verified_at) \
         VALUES ($1, $2, $3, $4, $5, TRUE, NOW()) \
         ON CONFLICT (barcode, catalog_identifier, marketplace_id) DO UPDATE SET \
             confidence       = EXCLUDED.confidence, \
             source           = EXCLUDED.source, \
             is_active        = TRUE, \
             last_verified_at = NOW(), \
             updated_at       = NOW()",
    )
    .bind(&correction.barcode)
    .bind(&correction.catalog_identifier)
    .bind(&correction.marketplace_id)
    .bind(correction.confidence)
    .bind(&correction.source)
    .execute(&mut *tx)
    .await?;

    let mut price_updated = false;
    if let Some(price) = correction.new_listed_price {
        let updated = sqlx::query(
            "UPDATE products SET listed_price = $1::numeric(12,2), updated_at = NOW() \
             WHERE id = $2",
        )
        .bind(price)
        .bind(correction.product_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            // Dropping `tx` rolls back the mapping changes as well.
            return Err(DbError::NotFound);
        }
        price_updated = true;
    }

    tx.commit().await?;

    Ok(CorrectionWrite {
        deactivated,
        identifier_inserted,
        price_updated,
    })
}
