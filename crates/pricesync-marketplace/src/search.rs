//! Catalog search by retail barcode.

use crate::client::MarketplaceClient;
use crate::error::MarketplaceError;
use crate::types::{SearchItem, SearchResponse};

/// One catalog item returned for a barcode search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub identifier: String,
    pub title: Option<String>,
    pub brand: Option<String>,
    /// `true` when one of the item's listed product codes equals the barcode
    /// that was searched for.
    pub matches_barcode: bool,
}

/// `UPC` for 12-digit codes, `EAN` for everything else.
fn identifier_type(barcode: &str) -> &'static str {
    if barcode.len() == 12 {
        "UPC"
    } else {
        "EAN"
    }
}

/// Compares product codes ignoring leading zeros, so a UPC-A and its EAN-13
/// form are equal.
fn same_code(a: &str, b: &str) -> bool {
    let a = a.trim().trim_start_matches('0');
    let b = b.trim().trim_start_matches('0');
    !a.is_empty() && a == b
}

fn to_result(item: SearchItem, barcode: &str) -> SearchResult {
    let matches_barcode = item.identifiers.iter().any(|code| {
        let is_product_code = code
            .identifier_type
            .as_deref()
            .is_none_or(|t| matches!(t.to_ascii_uppercase().as_str(), "UPC" | "EAN" | "GTIN"));
        is_product_code && same_code(&code.identifier, barcode)
    });
    let summary = item.summaries.into_iter().next().unwrap_or_default();

    SearchResult {
        identifier: item.identifier,
        title: summary.item_name,
        brand: summary.brand,
        matches_barcode,
    }
}

impl MarketplaceClient {
    /// Searches the catalog for items carrying `barcode`, in provider order.
    ///
    /// An unknown barcode yields an empty list, not an error.
    ///
    /// # Errors
    ///
    /// Returns request errors other than 404, or
    /// [`MarketplaceError::Deserialize`] if the response is unreadable.
    pub async fn search_catalog_by_barcode(
        &self,
        barcode: &str,
    ) -> Result<Vec<SearchResult>, MarketplaceError> {
        let url = self.endpoint(
            &["catalog", "search"],
            &[
                ("identifierType", identifier_type(barcode)),
                ("identifier", barcode),
                ("marketplaceIds", self.marketplace_id()),
            ],
        );

        let value = match self.get_json(&url).await {
            Ok(value) => value,
            Err(e) if e.is_not_found() => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let response: SearchResponse =
            serde_json::from_value(value).map_err(|e| MarketplaceError::Deserialize {
                context: format!("catalog search for {barcode}"),
                source: e,
            })?;

        Ok(response
            .items
            .into_iter()
            .map(|item| to_result(item, barcode))
            .collect())
    }
}
