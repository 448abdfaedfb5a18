use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Where a persisted price came from.
///
/// Only [`PricingSource::Authoritative`] reflects the marketplace's own
/// competitive-pricing data. The other two are fallbacks and must never be
/// reported as authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingSource {
    Authoritative,
    /// Best-effort prices scraped from catalog attributes or offer listings.
    CatalogFallback,
    CostDerived,
}

impl PricingSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PricingSource::Authoritative => "authoritative",
            PricingSource::CatalogFallback => "catalog_fallback",
            PricingSource::CostDerived => "cost_derived",
        }
    }

    #[must_use]
    pub fn is_authoritative(self) -> bool {
        matches!(self, PricingSource::Authoritative)
    }
}

impl std::fmt::Display for PricingSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unit cost and current listing for one catalog product.
///
/// Owned by the catalog subsystem; this engine only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductCostRecord {
    pub product_id: i64,
    pub unit_cost: Option<Decimal>,
    pub current_listed_price: Option<Decimal>,
}

/// A freshly computed price set for one product.
///
/// Recomputed on every sync cycle. Monetary fields keep full `Decimal`
/// precision; use [`PricingCalculation::rounded_to_cents`] for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingCalculation {
    pub product_id: Option<i64>,
    pub catalog_identifier: Option<String>,
    /// `None` when an observed price was scored without known cost.
    pub cost: Option<Decimal>,
    pub market_price: Decimal,
    pub competitive_price: Decimal,
    pub list_price: Decimal,
    /// Fraction in `[0, 1)`; `None` without cost.
    pub profit_margin: Option<Decimal>,
    /// 0–100; `None` without cost.
    pub competitiveness_score: Option<u8>,
    pub source: PricingSource,
}

impl PricingCalculation {
    /// Attaches the product and catalog identifier this calculation prices.
    #[must_use]
    pub fn for_product(mut self, product_id: i64, catalog_identifier: &str) -> Self {
        self.product_id = Some(product_id);
        self.catalog_identifier = Some(catalog_identifier.to_owned());
        self
    }

    /// Returns a copy with prices rounded to cents and margin to four places.
    #[must_use]
    pub fn rounded_to_cents(&self) -> Self {
        Self {
            market_price: round_cents(self.market_price),
            competitive_price: round_cents(self.competitive_price),
            list_price: round_cents(self.list_price),
            profit_margin: self.profit_margin.map(|m| {
                m.round_dp_with_strategy(4, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
            }),
            ..self.clone()
        }
    }
}

/// Rounds a monetary amount to cents, midpoint away from zero.
#[must_use]
pub fn round_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
}

/// The durable market snapshot for one catalog identifier on one marketplace.
///
/// Keyed by `(catalog_identifier, marketplace_id)`. Fetch timestamps are set
/// by the store at write time and are not part of this value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketIntelligenceRecord {
    pub catalog_identifier: String,
    pub marketplace_id: String,
    pub current_price: Decimal,
    pub list_price: Option<Decimal>,
    pub sales_rank: Option<i32>,
    /// `None` when the price was not observed on the marketplace at all.
    pub in_stock: Option<bool>,
    /// Fulfillment channel as reported by the marketplace, e.g. `"AMAZON"` or `"MERCHANT"`.
    pub fulfillment_method: Option<String>,
    pub price_source: PricingSource,
    /// 0–100 trust in `current_price`.
    pub confidence: u8,
    pub profit_margin: Option<Decimal>,
    pub competitiveness_score: Option<u8>,
    /// Raw upstream response kept for auditing.
    pub raw_payload: Option<serde_json::Value>,
}
