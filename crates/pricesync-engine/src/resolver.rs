//! Barcode to catalog-identifier resolution.
//!
//! Mappings drift: the marketplace merges listings, retires identifiers and
//! reassigns barcodes. The resolver re-checks a mapping against a live
//! catalog search and proposes a correction when the stored identifier is no
//! longer among the results.

use std::sync::Arc;

use pricesync_core::round_cents;
use pricesync_db::{CatalogItemMetadata, DbError, IdentifierCorrection};
use pricesync_marketplace::{BatchPricingClient, MarketplaceClient, MarketplaceError, SearchResult};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::SyncError;
use crate::store::SyncStore;

/// Mapping source recorded for links established by catalog search.
pub const SEARCH_SOURCE: &str = "catalog_search";

/// Confidence when a candidate lists the searched barcode among its codes.
pub const BARCODE_MATCH_CONFIDENCE: u8 = 100;
/// Confidence when the first search result is taken without a code match.
pub const FIRST_RESULT_CONFIDENCE: u8 = 70;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingCheck {
    pub is_correct: bool,
    /// The proposed replacement when `is_correct` is `false` and the search
    /// returned anything at all.
    pub correct_identifier: Option<String>,
    pub candidates: Vec<SearchResult>,
}

impl MappingCheck {
    /// The correction to apply, if the mapping was found to be wrong.
    #[must_use]
    pub fn correction(&self, current: &str) -> Option<PendingCorrection> {
        if self.is_correct {
            return None;
        }
        propose(&self.candidates).map(|(candidate, confidence)| {
            PendingCorrection::from_candidate(candidate, confidence, Some(current))
        })
    }
}

/// A mapping change decided by the resolver but not yet written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCorrection {
    pub identifier: String,
    pub previous: Option<String>,
    pub confidence: u8,
    pub metadata: CatalogItemMetadata,
}

impl PendingCorrection {
    fn from_candidate(candidate: &SearchResult, confidence: u8, previous: Option<&str>) -> Self {
        Self {
            identifier: candidate.identifier.clone(),
            previous: previous.map(str::to_owned),
            confidence,
            metadata: CatalogItemMetadata {
                title: candidate.title.clone(),
                brand: candidate.brand.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The stored identifier is among the search results.
    Verified { identifier: String },
    /// The stored identifier is used as-is without confirmation.
    Unverified { identifier: String },
    /// The stored identifier is wrong and should be replaced.
    Corrected(PendingCorrection),
    /// There was no mapping and the search found one.
    Discovered(PendingCorrection),
    /// No mapping and nothing found.
    Unresolved,
}

impl Resolution {
    /// The identifier to price under, if any.
    #[must_use]
    pub fn identifier(&self) -> Option<&str> {
        match self {
            Resolution::Verified { identifier } | Resolution::Unverified { identifier } => {
                Some(identifier)
            }
            Resolution::Corrected(pending) | Resolution::Discovered(pending) => {
                Some(&pending.identifier)
            }
            Resolution::Unresolved => None,
        }
    }

    #[must_use]
    pub fn into_pending(self) -> Option<PendingCorrection> {
        match self {
            Resolution::Corrected(pending) | Resolution::Discovered(pending) => Some(pending),
            _ => None,
        }
    }
}

/// Result of writing a correction. Both variants are successes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CorrectionOutcome {
    /// Mapping repointed and the product's listed price refreshed.
    FullyApplied { identifier: String, new_price: Decimal },
    /// Mapping repointed; no fresh price was available for the new identifier.
    MappingOnly { identifier: String },
}

impl CorrectionOutcome {
    #[must_use]
    pub fn identifier(&self) -> &str {
        match self {
            CorrectionOutcome::FullyApplied { identifier, .. }
            | CorrectionOutcome::MappingOnly { identifier } => identifier,
        }
    }
}

/// Exact barcode match first, otherwise the first result.
fn propose(candidates: &[SearchResult]) -> Option<(&SearchResult, u8)> {
    candidates
        .iter()
        .find(|c| c.matches_barcode)
        .map(|c| (c, BARCODE_MATCH_CONFIDENCE))
        .or_else(|| candidates.first().map(|c| (c, FIRST_RESULT_CONFIDENCE)))
}

pub struct IdentityResolver {
    client: Arc<MarketplaceClient>,
    store: Arc<dyn SyncStore>,
}

impl IdentityResolver {
    #[must_use]
    pub fn new(client: Arc<MarketplaceClient>, store: Arc<dyn SyncStore>) -> Self {
        Self { client, store }
    }

    /// Checks `current` against a live catalog search for `barcode`.
    ///
    /// An empty search is reported as incorrect with no proposal.
    ///
    /// # Errors
    ///
    /// Returns the search request's error.
    pub async fn verify_mapping(
        &self,
        barcode: &str,
        current: &str,
    ) -> Result<MappingCheck, MarketplaceError> {
        let candidates = self.client.search_catalog_by_barcode(barcode).await?;
        let is_correct = candidates.iter().any(|c| c.identifier == current);
        let correct_identifier = if is_correct {
            None
        } else {
            propose(&candidates).map(|(c, _)| c.identifier.clone())
        };

        if !is_correct {
            tracing::info!(
                barcode,
                current,
                proposed = correct_identifier.as_deref().unwrap_or("-"),
                candidates = candidates.len(),
                "mapping did not verify"
            );
        }

        Ok(MappingCheck {
            is_correct,
            correct_identifier,
            candidates,
        })
    }

    /// Decides which identifier `barcode` should be priced under.
    ///
    /// A confirmed mapping has its verification time refreshed. When the
    /// search comes back empty the current mapping is kept unverified rather
    /// than dropped.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Marketplace`] if the search fails, or
    /// [`SyncError::Store`] if the verification stamp cannot be written.
    pub async fn resolve(
        &self,
        barcode: &str,
        current: Option<&str>,
    ) -> Result<Resolution, SyncError> {
        let Some(current) = current else {
            let candidates = self.client.search_catalog_by_barcode(barcode).await?;
            return Ok(match propose(&candidates) {
                Some((candidate, confidence)) => {
                    tracing::info!(barcode, identifier = %candidate.identifier, "discovered mapping");
                    Resolution::Discovered(PendingCorrection::from_candidate(
                        candidate, confidence, None,
                    ))
                }
                None => {
                    tracing::debug!(barcode, "no catalog item for barcode");
                    Resolution::Unresolved
                }
            });
        };

        let check = self.verify_mapping(barcode, current).await?;
        if check.is_correct {
            self.store
                .mark_verified(barcode, current, self.client.marketplace_id())
                .await?;
            return Ok(Resolution::Verified {
                identifier: current.to_owned(),
            });
        }

        Ok(match check.correction(current) {
            Some(pending) => Resolution::Corrected(pending),
            None => Resolution::Unverified {
                identifier: current.to_owned(),
            },
        })
    }

    /// Writes `pending` for the product, including `fresh_price` as the new
    /// listed price when one is available.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the transaction fails. Nothing is written in
    /// that case.
    pub async fn commit_correction(
        &self,
        product_id: i64,
        barcode: &str,
        pending: &PendingCorrection,
        fresh_price: Option<Decimal>,
    ) -> Result<CorrectionOutcome, DbError> {
        let correction = IdentifierCorrection {
            product_id,
            barcode: barcode.to_owned(),
            catalog_identifier: pending.identifier.clone(),
            marketplace_id: self.client.marketplace_id().to_owned(),
            confidence: i16::from(pending.confidence),
            source: SEARCH_SOURCE.to_owned(),
            metadata: pending.metadata.clone(),
            new_listed_price: fresh_price.map(round_cents),
        };

        let write = self.store.apply_correction(&correction).await?;

        tracing::info!(
            product_id,
            barcode,
            previous = pending.previous.as_deref().unwrap_or("-"),
            identifier = %pending.identifier,
            deactivated = write.deactivated,
            price_updated = write.price_updated,
            "mapping corrected"
        );

        Ok(match (write.price_updated, correction.new_listed_price) {
            (true, Some(new_price)) => CorrectionOutcome::FullyApplied {
                identifier: correction.catalog_identifier,
                new_price,
            },
            _ => CorrectionOutcome::MappingOnly {
                identifier: correction.catalog_identifier,
            },
        })
    }

    /// Looks up a fresh authoritative price for the new identifier and
    /// commits the correction with it.
    ///
    /// A pricing failure that does not abort the cycle only downgrades the
    /// result to [`CorrectionOutcome::MappingOnly`].
    ///
    /// # Errors
    ///
    /// Returns credential failures from the price lookup and any store error.
    pub async fn apply_correction(
        &self,
        product_id: i64,
        barcode: &str,
        pending: &PendingCorrection,
        pricing: &BatchPricingClient,
    ) -> Result<CorrectionOutcome, SyncError> {
        let ids = [pending.identifier.clone()];
        let fresh_price = match pricing.fetch_batch(&ids).await {
            Ok(summaries) => summaries
                .get(&pending.identifier)
                .and_then(pricesync_marketplace::CompetitiveSummary::best_price),
            Err(e) if e.aborts_cycle() => return Err(e.into()),
            Err(e) => {
                tracing::warn!(identifier = %pending.identifier, error = %e, "no fresh price for corrected mapping");
                None
            }
        };

        Ok(self
            .commit_correction(product_id, barcode, pending, fresh_price)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(identifier: &str, matches_barcode: bool) -> SearchResult {
        SearchResult {
            identifier: identifier.to_owned(),
            title: Some(format!("{identifier} title")),
            brand: None,
            matches_barcode,
        }
    }

    #[test]
    fn propose_prefers_barcode_match() {
        let candidates = [result("X1", false), result("X2", true)];
        let (chosen, confidence) = propose(&candidates).unwrap();
        assert_eq!(chosen.identifier, "X2");
        assert_eq!(confidence, BARCODE_MATCH_CONFIDENCE);
    }

    #[test]
    fn propose_falls_back_to_first_result() {
        let candidates = [result("X1", false), result("X2", false)];
        let (chosen, confidence) = propose(&candidates).unwrap();
        assert_eq!(chosen.identifier, "X1");
        assert_eq!(confidence, FIRST_RESULT_CONFIDENCE);
        assert!(propose(&[]).is_none());
    }

    #[test]
    fn correction_carries_metadata_and_previous() {
        let check = MappingCheck {
            is_correct: false,
            correct_identifier: Some("X1111111".to_owned()),
            candidates: vec![result("X1111111", true)],
        };
        let pending = check.correction("X0000000").unwrap();
        assert_eq!(pending.identifier, "X1111111");
        assert_eq!(pending.previous.as_deref(), Some("X0000000"));
        assert_eq!(pending.metadata.title.as_deref(), Some("X1111111 title"));
    }

    #[test]
    fn correct_mapping_has_no_correction() {
        let check = MappingCheck {
            is_correct: true,
            correct_identifier: None,
            candidates: vec![result("X0000000", true)],
        };
        assert!(check.correction("X0000000").is_none());
    }

    #[test]
    fn resolution_identifier() {
        assert_eq!(
            Resolution::Verified {
                identifier: "A".to_owned()
            }
            .identifier(),
            Some("A")
        );
        assert_eq!(Resolution::Unresolved.identifier(), None);
    }
}
