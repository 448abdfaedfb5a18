//! Wire types for the marketplace API.
//!
//! Only the fields this engine reads are modelled. Everything else in the
//! provider's payloads is ignored.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A monetary amount as the provider encodes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Money {
    pub amount: Decimal,
    #[serde(default)]
    pub currency_code: Option<String>,
}

// ---------------------------------------------------------------------------
// Competitive summary batch
// ---------------------------------------------------------------------------

/// Items are kept as raw JSON so each one is parsed on its own.
#[derive(Debug, Deserialize)]
pub(crate) struct BatchResponse {
    #[serde(default)]
    pub responses: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BatchItemResponse {
    pub identifier: String,
    pub status: u16,
    #[serde(default)]
    pub body: serde_json::Value,
}

/// Aggregated competing-offer prices for one catalog identifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompetitiveSummary {
    #[serde(default)]
    pub buy_box_price: Option<Money>,
    #[serde(default)]
    pub lowest_offer_price: Option<Money>,
    /// The provider's "was" price.
    #[serde(default)]
    pub reference_price: Option<Money>,
    #[serde(default)]
    pub offer_count: Option<u32>,
    #[serde(default)]
    pub sales_rank: Option<i32>,
    #[serde(default)]
    pub fulfillment_channel: Option<String>,
}

impl CompetitiveSummary {
    /// Buy-box price, else lowest offer. Non-positive amounts are ignored.
    #[must_use]
    pub fn best_price(&self) -> Option<Decimal> {
        [&self.buy_box_price, &self.lowest_offer_price]
            .into_iter()
            .flatten()
            .map(|m| m.amount)
            .find(|amount| *amount > Decimal::ZERO)
    }

    #[must_use]
    pub fn reference_amount(&self) -> Option<Decimal> {
        self.reference_price
            .as_ref()
            .map(|m| m.amount)
            .filter(|amount| *amount > Decimal::ZERO)
    }

    /// `Some(false)` only when the provider explicitly reports zero offers.
    #[must_use]
    pub fn in_stock(&self) -> Option<bool> {
        match self.offer_count {
            Some(count) => Some(count > 0),
            None => self.best_price().map(|_| true),
        }
    }
}

// ---------------------------------------------------------------------------
// Catalog items and offers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesRank {
    pub rank: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSummary {
    #[serde(default)]
    pub item_name: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    pub identifier: String,
    /// Free-form attribute tree; searched for price-shaped text.
    #[serde(default)]
    pub attributes: serde_json::Value,
    #[serde(default)]
    pub sales_ranks: Vec<SalesRank>,
    #[serde(default)]
    pub summaries: Vec<ItemSummary>,
}

impl CatalogItem {
    /// Best (lowest) rank across categories.
    #[must_use]
    pub fn best_sales_rank(&self) -> Option<i32> {
        self.sales_ranks.iter().map(|r| r.rank).min()
    }

    #[must_use]
    pub fn summary(&self) -> Option<&ItemSummary> {
        self.summaries.first()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    #[serde(default)]
    pub listing_price: Option<Money>,
    #[serde(default)]
    pub is_buy_box_winner: bool,
    #[serde(default)]
    pub fulfillment_channel: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OffersPayload {
    #[serde(default)]
    pub offers: Vec<Offer>,
}

// ---------------------------------------------------------------------------
// Catalog search
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ItemIdentifier {
    #[serde(default)]
    pub identifier_type: Option<String>,
    pub identifier: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SearchItem {
    pub identifier: String,
    #[serde(default)]
    pub identifiers: Vec<ItemIdentifier>,
    #[serde(default)]
    pub summaries: Vec<ItemSummary>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default)]
    pub items: Vec<SearchItem>,
}
