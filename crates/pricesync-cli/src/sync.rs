//! Sync command handlers for the CLI.
//!
//! `run` drives a single cycle in the foreground; `schedule` registers the
//! same cycle as a cron job and keeps the process alive until interrupted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Subcommand;
use pricesync_core::AppConfig;
use pricesync_engine::{
    cancel_pair, ItemStatus, PgSyncStore, SyncOptions, SyncOrchestrator, SyncStore,
};
use pricesync_marketplace::{MarketplaceClient, TokioSleepGate};
use tokio_cron_scheduler::{Job, JobScheduler};

/// Sub-commands available under `sync`.
#[derive(Debug, Subcommand)]
pub enum SyncCommands {
    /// Run one sync cycle now
    Run {
        /// Maximum number of products to consider (defaults to `PRICESYNC_SYNC_LIMIT`)
        #[arg(long)]
        limit: Option<i64>,
        /// Stop between batches once this many seconds have elapsed
        #[arg(long)]
        timeout_secs: Option<u64>,
        /// Price existing mappings without re-checking them against catalog search
        #[arg(long)]
        skip_verify: bool,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run sync cycles on `PRICESYNC_SYNC_SCHEDULE` until interrupted
    Schedule,
}

/// Marks a scheduled cycle as in flight. The flag is cleared on drop, so a
/// cycle that panics does not block every later tick.
pub(crate) struct RunningGuard {
    flag: Arc<AtomicBool>,
}

impl RunningGuard {
    /// Returns `None` if another cycle already holds the flag.
    pub(crate) fn try_acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        if flag.swap(true, Ordering::SeqCst) {
            return None;
        }
        Some(Self {
            flag: Arc::clone(flag),
        })
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

fn build_orchestrator(pool: &sqlx::PgPool, config: &AppConfig) -> anyhow::Result<SyncOrchestrator> {
    let client = Arc::new(
        MarketplaceClient::from_app_config(config)
            .map_err(|e| anyhow::anyhow!("failed to build marketplace client: {e}"))?,
    );
    let store: Arc<dyn SyncStore> = Arc::new(PgSyncStore::new(pool.clone()));
    let calculator = crate::price::load_calculator(config.pricing_model_path.as_deref())?;

    Ok(SyncOrchestrator::from_app_config(
        config,
        client,
        store,
        Arc::new(TokioSleepGate),
        calculator,
    ))
}

/// Runs one cycle, cancelling between batches on Ctrl-C or after
/// `timeout_secs`, then prints the report.
///
/// # Errors
///
/// Returns an error if the components cannot be built or the cycle aborts
/// (credential failure or lost database).
pub(crate) async fn run_sync_once(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    limit: Option<i64>,
    timeout_secs: Option<u64>,
    skip_verify: bool,
    json: bool,
) -> anyhow::Result<()> {
    let sync = build_orchestrator(pool, config)?;

    let mut options = SyncOptions::from_app_config(config, "cli");
    if let Some(limit) = limit {
        anyhow::ensure!(limit > 0, "--limit must be positive, got {limit}");
        options.limit = limit;
    }
    if skip_verify {
        options.verify_mappings = false;
    }

    let (handle, signal) = cancel_pair();
    let signal = match timeout_secs {
        Some(secs) => signal.with_timeout(Duration::from_secs(secs)),
        None => signal,
    };
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; stopping after the current batch");
            handle.cancel();
        }
    });

    let result = sync.run(&options, &signal).await;
    interrupt.abort();
    let report = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report.summary_json())?);
        return Ok(());
    }

    print!("{report}");
    for item in report.items.iter().filter(|i| i.status == ItemStatus::Failed) {
        println!(
            "  failed: product {} ({}): {}",
            item.product_id,
            item.catalog_identifier.as_deref().unwrap_or("unmapped"),
            item.detail.as_deref().unwrap_or("no detail")
        );
    }
    Ok(())
}

/// Registers the sync cycle on `config.sync_schedule` and runs until Ctrl-C.
///
/// A tick that fires while the previous cycle is still running is skipped.
/// On shutdown the in-flight cycle is cancelled and allowed to finish its
/// current batch.
///
/// # Errors
///
/// Returns an error if the components cannot be built or the scheduler
/// cannot be created, started or stopped.
pub(crate) async fn run_sync_schedule(
    pool: sqlx::PgPool,
    config: Arc<AppConfig>,
) -> anyhow::Result<()> {
    let sync = Arc::new(build_orchestrator(&pool, &config)?);
    let options = Arc::new(SyncOptions::from_app_config(&config, "scheduler"));
    let running = Arc::new(AtomicBool::new(false));
    let (handle, signal) = cancel_pair();

    let mut scheduler = JobScheduler::new().await?;
    let cron = config.sync_schedule.clone();

    let job_running = Arc::clone(&running);
    let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
        let sync = Arc::clone(&sync);
        let options = Arc::clone(&options);
        let running = Arc::clone(&job_running);
        let signal = signal.clone();

        Box::pin(async move {
            let Some(_guard) = RunningGuard::try_acquire(&running) else {
                tracing::warn!("scheduler: previous sync run still in progress, skipping");
                return;
            };
            tracing::info!("scheduler: starting sync run");
            match sync.run(&options, &signal).await {
                Ok(report) => tracing::info!(
                    succeeded = report.succeeded(),
                    failed = report.failed,
                    cancelled = report.cancelled,
                    "scheduler: sync run complete"
                ),
                Err(e) => tracing::error!(error = %e, "scheduler: sync run failed"),
            }
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron = %cron, "scheduler: registered sync job");
    scheduler.start().await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("received shutdown signal, stopping scheduler");
    handle.cancel();
    while running.load(Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
    scheduler.shutdown().await?;
    Ok(())
}
