//! One sync cycle over every mapped product.
//!
//! Per batch: resolve identities, fetch authoritative summaries, commit any
//! mapping corrections, then price each product from the best available
//! source and persist it. Batches run one after another with the provider's
//! interval between them; progress is committed per item so a cancelled or
//! aborted run keeps what it already wrote.

use std::collections::HashMap;
use std::sync::Arc;

use pricesync_core::{
    AppConfig, CostBasedPricingCalculator, MarketIntelligenceRecord, PricingCalculation,
    PricingError, PricingSource,
};
use pricesync_db::{SyncCandidateRow, SyncRunStatus};
use pricesync_marketplace::{
    BatchGate, BatchPricingClient, CatalogFallbackClient, CompetitiveSummary, MarketplaceClient,
    MarketplaceError,
};
use rust_decimal::Decimal;

use crate::cancel::CancelSignal;
use crate::error::SyncError;
use crate::report::{ItemOutcome, ItemStatus, SyncReport};
use crate::resolver::{CorrectionOutcome, IdentityResolver, PendingCorrection, Resolution};
use crate::store::SyncStore;

/// Confidence stored with prices from the competitive-summary batch.
pub const AUTHORITATIVE_CONFIDENCE: u8 = 95;
/// Confidence stored with prices derived from unit cost alone.
pub const COST_DERIVED_CONFIDENCE: u8 = 25;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Maximum number of products considered this cycle.
    pub limit: i64,
    /// Re-check existing mappings against catalog search before pricing.
    pub verify_mappings: bool,
    /// Recorded on the run row, e.g. `"cli"` or `"scheduler"`.
    pub trigger_source: String,
}

impl SyncOptions {
    #[must_use]
    pub fn from_app_config(config: &AppConfig, trigger_source: &str) -> Self {
        Self {
            limit: config.sync_limit,
            verify_mappings: config.verify_mappings,
            trigger_source: trigger_source.to_owned(),
        }
    }
}

/// A product that made it through identity resolution.
struct WorkItem<'a> {
    row: &'a SyncCandidateRow,
    barcode: &'a str,
    identifier: String,
    pending: Option<PendingCorrection>,
}

enum Priced {
    Ready(MarketIntelligenceRecord),
    NoCost,
    Rejected(PricingError),
}

/// Catalog-fallback state shared by the items of one batch.
#[derive(Default)]
struct FallbackState {
    /// `Retry-After` from a throttled fallback call. Once set, the rest of
    /// the batch skips the fallback and the next batch waits at least this
    /// long.
    throttled: Option<u64>,
}

pub struct SyncOrchestrator {
    store: Arc<dyn SyncStore>,
    resolver: IdentityResolver,
    pricing: BatchPricingClient,
    fallback: CatalogFallbackClient,
    calculator: CostBasedPricingCalculator,
    marketplace_id: String,
}

impl SyncOrchestrator {
    #[must_use]
    pub fn new(
        store: Arc<dyn SyncStore>,
        resolver: IdentityResolver,
        pricing: BatchPricingClient,
        fallback: CatalogFallbackClient,
        calculator: CostBasedPricingCalculator,
        marketplace_id: &str,
    ) -> Self {
        Self {
            store,
            resolver,
            pricing,
            fallback,
            calculator,
            marketplace_id: marketplace_id.to_owned(),
        }
    }

    /// Wires every component from one client and one store.
    #[must_use]
    pub fn from_app_config(
        config: &AppConfig,
        client: Arc<MarketplaceClient>,
        store: Arc<dyn SyncStore>,
        gate: Arc<dyn BatchGate>,
        calculator: CostBasedPricingCalculator,
    ) -> Self {
        Self::new(
            Arc::clone(&store),
            IdentityResolver::new(Arc::clone(&client), Arc::clone(&store)),
            BatchPricingClient::from_app_config(Arc::clone(&client), gate, config),
            CatalogFallbackClient::from_app_config(Arc::clone(&client), config),
            calculator,
            client.marketplace_id(),
        )
    }

    /// Runs one full cycle and records it in `sync_runs`.
    ///
    /// A cancelled run still returns `Ok` with `report.cancelled` set; items
    /// persisted before the signal stay persisted.
    ///
    /// # Errors
    ///
    /// Returns a [`SyncError`] only for failures that abort the cycle:
    /// credential exchange failure or loss of the store. The run row is
    /// marked failed on a best-effort basis.
    pub async fn run(
        &self,
        options: &SyncOptions,
        cancel: &CancelSignal,
    ) -> Result<SyncReport, SyncError> {
        let run_id = self.store.start_run(&options.trigger_source).await?;
        tracing::info!(run_id, trigger = %options.trigger_source, "sync run started");

        let report = match self.run_cycle(options, cancel).await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(run_id, error = %e, "sync run aborted");
                self.fail_run_best_effort(run_id, &e.to_string()).await;
                return Err(e);
            }
        };

        let status = if report.cancelled {
            SyncRunStatus::Cancelled
        } else {
            SyncRunStatus::Succeeded
        };
        if let Err(e) = self.store.complete_run(run_id, status, &report).await {
            self.fail_run_best_effort(run_id, &e.to_string()).await;
            return Err(e.into());
        }

        tracing::info!(
            run_id,
            status = status.as_str(),
            requested = report.total_requested,
            authoritative = report.authoritative,
            fallback_catalog = report.fallback_catalog,
            fallback_cost_derived = report.fallback_cost_derived,
            skipped = report.skipped(),
            failed = report.failed,
            mappings_corrected = report.mappings_corrected,
            "sync run complete"
        );
        Ok(report)
    }

    async fn fail_run_best_effort(&self, run_id: i64, message: &str) {
        if let Err(mark_err) = self.store.fail_run(run_id, message).await {
            tracing::error!(run_id, error = %mark_err, "failed to mark sync run as failed");
        }
    }

    async fn run_cycle(
        &self,
        options: &SyncOptions,
        cancel: &CancelSignal,
    ) -> Result<SyncReport, SyncError> {
        let candidates = self
            .store
            .list_candidates(&self.marketplace_id, options.limit)
            .await?;
        let mut report = SyncReport::new(candidates.len());
        let mut retry_after = None;

        for (batch, chunk) in candidates.chunks(self.pricing.batch_size()).enumerate() {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            if batch > 0 {
                tokio::select! {
                    () = self.pricing.wait_between_batches(retry_after.take()) => {}
                    () = cancel.cancelled() => {}
                }
                if cancel.is_cancelled() {
                    report.cancelled = true;
                    break;
                }
            }

            tracing::debug!(batch, size = chunk.len(), "processing batch");
            retry_after = self.process_batch(batch, chunk, options, &mut report).await?;
        }

        if report.cancelled {
            tracing::warn!(
                not_attempted = report.not_attempted(),
                "sync run cancelled between batches"
            );
        }
        Ok(report)
    }

    /// Returns the provider's `Retry-After` when the batch or its catalog
    /// fallback calls were throttled.
    async fn process_batch(
        &self,
        batch: usize,
        chunk: &[SyncCandidateRow],
        options: &SyncOptions,
        report: &mut SyncReport,
    ) -> Result<Option<u64>, SyncError> {
        let mut work = Vec::with_capacity(chunk.len());
        for row in chunk {
            if let Some(item) = self.prepare(row, options, report).await? {
                work.push(item);
            }
        }
        if work.is_empty() {
            return Ok(None);
        }

        let mut identifiers: Vec<String> = Vec::with_capacity(work.len());
        for item in &work {
            if !identifiers.contains(&item.identifier) {
                identifiers.push(item.identifier.clone());
            }
        }

        let summaries = match self.pricing.fetch_batch(&identifiers).await {
            Ok(summaries) => summaries,
            Err(e) if e.aborts_cycle() => return Err(e.into()),
            Err(e) => {
                let retry_after = match &e {
                    MarketplaceError::RateLimited {
                        retry_after_secs, ..
                    } => Some(*retry_after_secs),
                    _ => None,
                };
                tracing::warn!(batch, size = identifiers.len(), error = %e, "pricing batch failed");
                for item in work {
                    report.record(
                        ItemOutcome::new(item.row.product_id, Some(item.barcode), ItemStatus::Failed)
                            .with_identifier(&item.identifier)
                            .with_detail(e.to_string()),
                    );
                }
                return Ok(retry_after);
            }
        };

        let mut fallback = FallbackState::default();
        for item in work {
            let outcome = self.finish_item(item, &summaries, &mut fallback).await?;
            report.record(outcome);
        }
        Ok(fallback.throttled)
    }

    /// Validates cost and resolves the identifier. Products that cannot go
    /// further are recorded here and yield `None`.
    async fn prepare<'a>(
        &self,
        row: &'a SyncCandidateRow,
        options: &SyncOptions,
        report: &mut SyncReport,
    ) -> Result<Option<WorkItem<'a>>, SyncError> {
        let barcode = row.barcode.as_deref().map(str::trim).unwrap_or_default();
        if barcode.is_empty() {
            report.record(
                ItemOutcome::new(row.product_id, None, ItemStatus::SkippedUnmapped)
                    .with_detail("product has no barcode"),
            );
            return Ok(None);
        }

        if let Some(cost) = row.unit_cost.filter(|c| *c <= Decimal::ZERO) {
            tracing::warn!(product_id = row.product_id, %cost, "skipping product with non-positive cost");
            report.record(
                ItemOutcome::new(row.product_id, Some(barcode), ItemStatus::SkippedInvalidCost)
                    .with_detail(PricingError::InvalidCost { cost }.to_string()),
            );
            return Ok(None);
        }

        let current = row.catalog_identifier.as_deref();
        let resolution = match current {
            Some(identifier) if !options.verify_mappings => Resolution::Unverified {
                identifier: identifier.to_owned(),
            },
            _ => match self.resolver.resolve(barcode, current).await {
                Ok(resolution) => resolution,
                Err(e) if e.aborts_cycle() => return Err(e),
                Err(e) => {
                    tracing::warn!(product_id = row.product_id, barcode, error = %e, "identity resolution failed");
                    if let Some(identifier) = current {
                        Resolution::Unverified {
                            identifier: identifier.to_owned(),
                        }
                    } else {
                        report.record(
                            ItemOutcome::new(row.product_id, Some(barcode), ItemStatus::Failed)
                                .with_detail(e.to_string()),
                        );
                        return Ok(None);
                    }
                }
            },
        };

        let Some(identifier) = resolution.identifier().map(str::to_owned) else {
            report.record(
                ItemOutcome::new(row.product_id, Some(barcode), ItemStatus::SkippedUnmapped)
                    .with_detail("no catalog item found for barcode"),
            );
            return Ok(None);
        };

        Ok(Some(WorkItem {
            row,
            barcode,
            identifier,
            pending: resolution.into_pending(),
        }))
    }

    async fn finish_item(
        &self,
        item: WorkItem<'_>,
        summaries: &HashMap<String, CompetitiveSummary>,
        fallback: &mut FallbackState,
    ) -> Result<ItemOutcome, SyncError> {
        let WorkItem {
            row,
            barcode,
            identifier,
            pending,
        } = item;
        let summary = summaries.get(&identifier);
        let base = ItemOutcome::new(row.product_id, Some(barcode), ItemStatus::Failed)
            .with_identifier(&identifier);

        let mut correction: Option<CorrectionOutcome> = None;
        if let Some(pending) = &pending {
            let fresh_price = summary.and_then(CompetitiveSummary::best_price);
            match self
                .resolver
                .commit_correction(row.product_id, barcode, pending, fresh_price)
                .await
            {
                Ok(outcome) => correction = Some(outcome),
                Err(e) if e.is_connectivity() => return Err(e.into()),
                Err(e) => {
                    tracing::warn!(product_id = row.product_id, identifier = %identifier, error = %e, "mapping correction failed");
                    return Ok(base.with_detail(e.to_string()));
                }
            }
        }

        let (priced, fallback_note) = self
            .price_item(row, &identifier, summary, fallback)
            .await?;
        let base = ItemOutcome {
            correction,
            detail: fallback_note,
            ..base
        };

        let record = match priced {
            Priced::Ready(record) => record,
            Priced::NoCost => {
                tracing::debug!(product_id = row.product_id, identifier = %identifier, "no price source and no cost");
                return Ok(ItemOutcome {
                    status: ItemStatus::SkippedNoCost,
                    ..base
                });
            }
            Priced::Rejected(e) => return Ok(base.with_detail(e.to_string())),
        };

        match self.store.upsert_market_intelligence(&record).await {
            Ok(_) => Ok(ItemOutcome {
                status: ItemStatus::Persisted(record.price_source),
                ..base
            }),
            Err(e) if e.is_connectivity() => Err(e.into()),
            Err(e) => {
                tracing::warn!(product_id = row.product_id, identifier = %identifier, error = %e, "failed to persist market snapshot");
                Ok(base.with_detail(e.to_string()))
            }
        }
    }

    /// Authoritative summary, else catalog fallback, else unit cost.
    ///
    /// The second value explains why the catalog fallback produced nothing
    /// when it failed or was skipped.
    async fn price_item(
        &self,
        row: &SyncCandidateRow,
        identifier: &str,
        summary: Option<&CompetitiveSummary>,
        fallback: &mut FallbackState,
    ) -> Result<(Priced, Option<String>), SyncError> {
        let cost = row.unit_cost;

        if let Some((summary, price)) = summary.and_then(|s| s.best_price().map(|p| (s, p))) {
            let calc = match self.calculator.score_observed(
                cost,
                price,
                summary.reference_amount(),
                PricingSource::Authoritative,
            ) {
                Ok(calc) => calc.for_product(row.product_id, identifier),
                Err(e) => return Ok((Priced::Rejected(e), None)),
            };
            let record = self.snapshot(
                &calc,
                identifier,
                AUTHORITATIVE_CONFIDENCE,
                Observed {
                    sales_rank: summary.sales_rank,
                    in_stock: summary.in_stock(),
                    fulfillment_method: summary.fulfillment_channel.clone(),
                    raw_payload: serde_json::to_value(summary).ok(),
                },
            );
            return Ok((Priced::Ready(record), None));
        }

        let fallback_note = if let Some(secs) = fallback.throttled {
            Some(format!("catalog fallback skipped: throttled, retry after {secs}s"))
        } else {
            match self.fallback.lookup(identifier).await {
                Ok(Some(found)) => {
                    tracing::debug!(identifier, price = %found.price, origin = ?found.origin, "catalog fallback price");
                    let calc = match self.calculator.score_observed(
                        cost,
                        found.price,
                        None,
                        PricingSource::CatalogFallback,
                    ) {
                        Ok(calc) => calc.for_product(row.product_id, identifier),
                        Err(e) => return Ok((Priced::Rejected(e), None)),
                    };
                    let confidence = found.confidence();
                    let record = self.snapshot(
                        &calc,
                        identifier,
                        confidence,
                        Observed {
                            sales_rank: found.sales_rank,
                            in_stock: found.in_stock,
                            fulfillment_method: found.fulfillment_method,
                            raw_payload: Some(found.raw),
                        },
                    );
                    return Ok((Priced::Ready(record), None));
                }
                Ok(None) => None,
                Err(e) if e.aborts_cycle() => return Err(e.into()),
                Err(e) => {
                    tracing::warn!(identifier, error = %e, "catalog fallback lookup failed");
                    if let MarketplaceError::RateLimited {
                        retry_after_secs, ..
                    } = &e
                    {
                        fallback.throttled = Some(*retry_after_secs);
                    }
                    Some(format!("catalog fallback failed: {e}"))
                }
            }
        };

        let Some(cost) = cost else {
            return Ok((Priced::NoCost, fallback_note));
        };
        let calc = match self.calculator.calculate(cost) {
            Ok(calc) => calc.for_product(row.product_id, identifier),
            Err(e) => return Ok((Priced::Rejected(e), fallback_note)),
        };
        let record = self.snapshot(
            &calc,
            identifier,
            COST_DERIVED_CONFIDENCE,
            Observed::default(),
        );
        Ok((Priced::Ready(record), fallback_note))
    }

    fn snapshot(
        &self,
        calc: &PricingCalculation,
        identifier: &str,
        confidence: u8,
        observed: Observed,
    ) -> MarketIntelligenceRecord {
        let rounded = calc.rounded_to_cents();
        MarketIntelligenceRecord {
            catalog_identifier: identifier.to_owned(),
            marketplace_id: self.marketplace_id.clone(),
            current_price: rounded.competitive_price,
            list_price: Some(rounded.list_price),
            sales_rank: observed.sales_rank,
            in_stock: observed.in_stock,
            fulfillment_method: observed.fulfillment_method,
            price_source: calc.source,
            confidence,
            profit_margin: rounded.profit_margin,
            competitiveness_score: rounded.competitiveness_score,
            raw_payload: observed.raw_payload,
        }
    }
}

/// Marketplace-side facts that accompany an observed price.
#[derive(Default)]
struct Observed {
    sales_rank: Option<i32>,
    in_stock: Option<bool>,
    fulfillment_method: Option<String>,
    raw_payload: Option<serde_json::Value>,
}
