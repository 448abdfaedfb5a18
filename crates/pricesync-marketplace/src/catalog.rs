//! Per-identifier catalog and offer lookups.
//!
//! This is the secondary price source for identifiers the batch endpoint
//! had nothing for. Prices found here are best-effort and are always tagged
//! as catalog fallback, never as authoritative.

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::client::MarketplaceClient;
use crate::error::MarketplaceError;
use crate::price_extract::PriceExtractor;
use crate::types::{CatalogItem, OffersPayload};

/// Confidence for a price read from a structured offer listing.
pub const OFFER_CONFIDENCE: u8 = 60;
/// Confidence for a price scraped out of attribute text.
pub const ATTRIBUTE_CONFIDENCE: u8 = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackOrigin {
    Offers,
    Attributes,
}

/// A plausible price found on the fallback path.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackPrice {
    pub price: Decimal,
    pub origin: FallbackOrigin,
    pub sales_rank: Option<i32>,
    pub in_stock: Option<bool>,
    pub fulfillment_method: Option<String>,
    /// The payload the price was read from.
    pub raw: serde_json::Value,
}

impl FallbackPrice {
    #[must_use]
    pub fn confidence(&self) -> u8 {
        match self.origin {
            FallbackOrigin::Offers => OFFER_CONFIDENCE,
            FallbackOrigin::Attributes => ATTRIBUTE_CONFIDENCE,
        }
    }
}

pub struct CatalogFallbackClient {
    client: Arc<MarketplaceClient>,
    extractor: PriceExtractor,
}

impl CatalogFallbackClient {
    #[must_use]
    pub fn new(client: Arc<MarketplaceClient>, extractor: PriceExtractor) -> Self {
        Self { client, extractor }
    }

    #[must_use]
    pub fn from_app_config(
        client: Arc<MarketplaceClient>,
        config: &pricesync_core::AppConfig,
    ) -> Self {
        Self::new(
            client,
            PriceExtractor::new(config.fallback_price_min, config.fallback_price_max),
        )
    }

    /// Fetches the catalog item. `Ok(None)` when the marketplace has no such item.
    ///
    /// # Errors
    ///
    /// Returns any non-404 error from the authorized request, or
    /// [`MarketplaceError::Deserialize`] if the item is unreadable.
    pub async fn get_catalog_attributes(
        &self,
        identifier: &str,
    ) -> Result<Option<CatalogItem>, MarketplaceError> {
        let url = self.client.endpoint(
            &["catalog", "items", identifier],
            &[
                ("marketplaceIds", self.client.marketplace_id()),
                ("includedData", "attributes,salesRanks,summaries"),
            ],
        );

        let value = match self.client.get_json(&url).await {
            Ok(value) => value,
            Err(e) if e.is_not_found() => {
                tracing::debug!(identifier, "catalog item not found");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| MarketplaceError::Deserialize {
                context: format!("catalog item {identifier}"),
                source: e,
            })
    }

    /// Fetches current offers. `Ok(None)` when the marketplace has no listing.
    ///
    /// # Errors
    ///
    /// Returns any non-404 error from the authorized request, or
    /// [`MarketplaceError::Deserialize`] if the payload is unreadable.
    pub async fn get_offers(
        &self,
        identifier: &str,
    ) -> Result<Option<OffersPayload>, MarketplaceError> {
        let url = self.client.endpoint(
            &["pricing", "items", identifier, "offers"],
            &[("marketplaceId", self.client.marketplace_id())],
        );

        let value = match self.client.get_json(&url).await {
            Ok(value) => value,
            Err(e) if e.is_not_found() => {
                tracing::debug!(identifier, "no offers listed");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| MarketplaceError::Deserialize {
                context: format!("offers for {identifier}"),
                source: e,
            })
    }

    /// Looks for a plausible price: structured offers first, then
    /// price-shaped text in the catalog attributes.
    ///
    /// Returns `Ok(None)` when neither source yields an in-range price.
    ///
    /// # Errors
    ///
    /// Propagates request errors from either lookup.
    pub async fn lookup(&self, identifier: &str) -> Result<Option<FallbackPrice>, MarketplaceError> {
        let item = self.get_catalog_attributes(identifier).await?;
        let sales_rank = item.as_ref().and_then(CatalogItem::best_sales_rank);

        if let Some(offers) = self.get_offers(identifier).await? {
            if let Some(mut found) = self.price_from_offers(&offers) {
                found.sales_rank = sales_rank;
                return Ok(Some(found));
            }
        }

        let Some(item) = item else {
            return Ok(None);
        };

        Ok(self
            .extractor
            .extract_from_json(&item.attributes)
            .map(|price| FallbackPrice {
                price,
                origin: FallbackOrigin::Attributes,
                sales_rank,
                in_stock: None,
                fulfillment_method: None,
                raw: item.attributes.clone(),
            }))
    }

    /// Buy-box winner first, otherwise the cheapest in-range listing.
    fn price_from_offers(&self, payload: &OffersPayload) -> Option<FallbackPrice> {
        let priced = payload.offers.iter().filter_map(|offer| {
            offer
                .listing_price
                .as_ref()
                .map(|m| m.amount)
                .filter(|amount| self.extractor.in_range(*amount))
                .map(|amount| (offer, amount))
        });

        let (offer, price) = priced
            .clone()
            .find(|(offer, _)| offer.is_buy_box_winner)
            .or_else(|| priced.min_by_key(|(_, amount)| *amount))?;

        Some(FallbackPrice {
            price,
            origin: FallbackOrigin::Offers,
            sales_rank: None,
            in_stock: Some(true),
            fulfillment_method: offer.fulfillment_channel.clone(),
            raw: serde_json::to_value(payload).unwrap_or(serde_json::Value::Null),
        })
    }
}
