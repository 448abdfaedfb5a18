//! Persistence seam for the sync engine.
//!
//! The orchestrator and resolver only talk to [`SyncStore`]. Production code
//! uses [`PgSyncStore`]; tests substitute an in-memory store.

use async_trait::async_trait;
use pricesync_core::MarketIntelligenceRecord;
use pricesync_db::{
    CorrectionWrite, DbError, IdentifierCorrection, SyncCandidateRow, SyncRunStatus,
};
use sqlx::PgPool;

use crate::report::SyncReport;

pub type StoreResult<T> = Result<T, DbError>;

#[async_trait]
pub trait SyncStore: Send + Sync {
    /// Products with a barcode, joined to cost and their active mapping.
    async fn list_candidates(
        &self,
        marketplace_id: &str,
        limit: i64,
    ) -> StoreResult<Vec<SyncCandidateRow>>;

    /// Upserts the snapshot keyed by `(catalog_identifier, marketplace_id)`.
    async fn upsert_market_intelligence(
        &self,
        record: &MarketIntelligenceRecord,
    ) -> StoreResult<i64>;

    /// Atomically repoints a barcode at a new identifier.
    async fn apply_correction(
        &self,
        correction: &IdentifierCorrection,
    ) -> StoreResult<CorrectionWrite>;

    async fn mark_verified(
        &self,
        barcode: &str,
        catalog_identifier: &str,
        marketplace_id: &str,
    ) -> StoreResult<bool>;

    /// Opens a run in the `running` state and returns its id.
    async fn start_run(&self, trigger_source: &str) -> StoreResult<i64>;

    async fn complete_run(
        &self,
        run_id: i64,
        status: SyncRunStatus,
        report: &SyncReport,
    ) -> StoreResult<()>;

    async fn fail_run(&self, run_id: i64, error_message: &str) -> StoreResult<()>;
}

/// [`SyncStore`] backed by the Postgres schema in `migrations/`.
#[derive(Debug, Clone)]
pub struct PgSyncStore {
    pool: PgPool,
}

impl PgSyncStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn count(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

#[async_trait]
impl SyncStore for PgSyncStore {
    async fn list_candidates(
        &self,
        marketplace_id: &str,
        limit: i64,
    ) -> StoreResult<Vec<SyncCandidateRow>> {
        pricesync_db::list_sync_candidates(&self.pool, marketplace_id, limit).await
    }

    async fn upsert_market_intelligence(
        &self,
        record: &MarketIntelligenceRecord,
    ) -> StoreResult<i64> {
        pricesync_db::upsert_market_intelligence(&self.pool, record).await
    }

    async fn apply_correction(
        &self,
        correction: &IdentifierCorrection,
    ) -> StoreResult<CorrectionWrite> {
        pricesync_db::apply_identifier_correction(&self.pool, correction).await
    }

    async fn mark_verified(
        &self,
        barcode: &str,
        catalog_identifier: &str,
        marketplace_id: &str,
    ) -> StoreResult<bool> {
        pricesync_db::mark_mapping_verified(&self.pool, barcode, catalog_identifier, marketplace_id)
            .await
    }

    async fn start_run(&self, trigger_source: &str) -> StoreResult<i64> {
        let run = pricesync_db::create_sync_run(&self.pool, trigger_source).await?;
        Ok(run.id)
    }

    async fn complete_run(
        &self,
        run_id: i64,
        status: SyncRunStatus,
        report: &SyncReport,
    ) -> StoreResult<()> {
        pricesync_db::complete_sync_run(
            &self.pool,
            run_id,
            status,
            count(report.total_requested),
            count(report.succeeded()),
            count(report.failed),
            &report.summary_json(),
        )
        .await
    }

    async fn fail_run(&self, run_id: i64, error_message: &str) -> StoreResult<()> {
        pricesync_db::fail_sync_run(&self.pool, run_id, error_message).await
    }
}
