//! Structured outcome of a sync run.

use pricesync_core::PricingSource;
use serde::Serialize;

use crate::resolver::CorrectionOutcome;

/// Terminal state of one product in one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// A market snapshot was written, priced from `source`.
    Persisted(PricingSource),
    /// No marketplace price and no cost to fall back on.
    SkippedNoCost,
    /// Cost is zero or negative.
    SkippedInvalidCost,
    /// The barcode could not be linked to any catalog identifier.
    SkippedUnmapped,
    /// A request or a write failed. The product is retried next cycle.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemOutcome {
    pub product_id: i64,
    pub barcode: Option<String>,
    pub catalog_identifier: Option<String>,
    pub status: ItemStatus,
    /// Set when this cycle repointed the product's mapping.
    pub correction: Option<CorrectionOutcome>,
    pub detail: Option<String>,
}

impl ItemOutcome {
    #[must_use]
    pub fn new(product_id: i64, barcode: Option<&str>, status: ItemStatus) -> Self {
        Self {
            product_id,
            barcode: barcode.map(str::to_owned),
            catalog_identifier: None,
            status,
            correction: None,
            detail: None,
        }
    }

    #[must_use]
    pub fn with_identifier(mut self, identifier: &str) -> Self {
        self.catalog_identifier = Some(identifier.to_owned());
        self
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub total_requested: usize,
    pub authoritative: usize,
    pub fallback_catalog: usize,
    pub fallback_cost_derived: usize,
    pub skipped_no_cost: usize,
    pub skipped_invalid_cost: usize,
    pub skipped_unmapped: usize,
    pub failed: usize,
    pub mappings_corrected: usize,
    /// Corrections that also refreshed the listed price.
    pub corrections_fully_applied: usize,
    /// Corrections written without a fresh price.
    pub corrections_mapping_only: usize,
    /// `true` when the run stopped early on a cancel signal or deadline.
    pub cancelled: bool,
    pub items: Vec<ItemOutcome>,
}

impl SyncReport {
    #[must_use]
    pub fn new(total_requested: usize) -> Self {
        Self {
            total_requested,
            ..Self::default()
        }
    }

    pub fn record(&mut self, outcome: ItemOutcome) {
        match outcome.status {
            ItemStatus::Persisted(PricingSource::Authoritative) => self.authoritative += 1,
            ItemStatus::Persisted(PricingSource::CatalogFallback) => self.fallback_catalog += 1,
            ItemStatus::Persisted(PricingSource::CostDerived) => self.fallback_cost_derived += 1,
            ItemStatus::SkippedNoCost => self.skipped_no_cost += 1,
            ItemStatus::SkippedInvalidCost => self.skipped_invalid_cost += 1,
            ItemStatus::SkippedUnmapped => self.skipped_unmapped += 1,
            ItemStatus::Failed => self.failed += 1,
        }
        match &outcome.correction {
            Some(CorrectionOutcome::FullyApplied { .. }) => {
                self.mappings_corrected += 1;
                self.corrections_fully_applied += 1;
            }
            Some(CorrectionOutcome::MappingOnly { .. }) => {
                self.mappings_corrected += 1;
                self.corrections_mapping_only += 1;
            }
            None => {}
        }
        self.items.push(outcome);
    }

    /// Products that ended with a persisted snapshot, from any source.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.authoritative + self.fallback_catalog + self.fallback_cost_derived
    }

    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped_no_cost + self.skipped_invalid_cost + self.skipped_unmapped
    }

    /// Products the run never reached because it was cancelled.
    #[must_use]
    pub fn not_attempted(&self) -> usize {
        self.total_requested.saturating_sub(self.items.len())
    }

    #[must_use]
    pub fn outcome_for(&self, product_id: i64) -> Option<&ItemOutcome> {
        self.items.iter().find(|o| o.product_id == product_id)
    }

    /// JSON form stored on the `sync_runs` row.
    #[must_use]
    pub fn summary_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl std::fmt::Display for SyncReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "requested:              {}", self.total_requested)?;
        writeln!(f, "authoritative:          {}", self.authoritative)?;
        writeln!(f, "fallback (catalog):     {}", self.fallback_catalog)?;
        writeln!(f, "fallback (cost-derived): {}", self.fallback_cost_derived)?;
        writeln!(f, "skipped (no cost):      {}", self.skipped_no_cost)?;
        writeln!(f, "skipped (invalid cost): {}", self.skipped_invalid_cost)?;
        writeln!(f, "skipped (unmapped):     {}", self.skipped_unmapped)?;
        writeln!(f, "failed:                 {}", self.failed)?;
        writeln!(
            f,
            "mappings corrected:     {} ({} with price, {} mapping only)",
            self.mappings_corrected, self.corrections_fully_applied, self.corrections_mapping_only
        )?;
        if self.cancelled {
            writeln!(f, "cancelled; {} not attempted", self.not_attempted())?;
        }
        Ok(())
    }
}
