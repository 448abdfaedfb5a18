//! Mapping command handlers for the CLI.

use std::sync::Arc;

use clap::Subcommand;
use pricesync_core::AppConfig;
use pricesync_engine::{CorrectionOutcome, IdentityResolver, PgSyncStore, SyncStore};
use pricesync_marketplace::{BatchPricingClient, MarketplaceClient, TokioSleepGate};

/// Sub-commands available under `mapping`.
#[derive(Debug, Subcommand)]
pub enum MappingCommands {
    /// Check a barcode's catalog identifier against live catalog search
    Verify {
        /// Retail barcode (UPC or EAN)
        #[arg(long)]
        barcode: String,
        /// Catalog identifier currently mapped to the barcode
        #[arg(long)]
        identifier: String,
        /// Write the proposed correction
        #[arg(long, requires = "product_id")]
        apply: bool,
        /// Product whose listed price is refreshed when the correction is applied
        #[arg(long)]
        product_id: Option<i64>,
    },
}

/// Verifies one mapping and, with `apply`, writes the proposed correction.
///
/// # Errors
///
/// Returns an error if the marketplace client cannot be built, the search
/// fails, or the correction cannot be written.
pub(crate) async fn run_mapping_verify(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    barcode: &str,
    identifier: &str,
    apply: bool,
    product_id: Option<i64>,
) -> anyhow::Result<()> {
    let client = Arc::new(
        MarketplaceClient::from_app_config(config)
            .map_err(|e| anyhow::anyhow!("failed to build marketplace client: {e}"))?,
    );
    let store: Arc<dyn SyncStore> = Arc::new(PgSyncStore::new(pool.clone()));
    let resolver = IdentityResolver::new(Arc::clone(&client), store);

    let check = resolver.verify_mapping(barcode, identifier).await?;

    println!("candidates for {barcode}: {}", check.candidates.len());
    for candidate in &check.candidates {
        println!(
            "  {}{} {}",
            candidate.identifier,
            if candidate.matches_barcode { " *" } else { "" },
            candidate.title.as_deref().unwrap_or("")
        );
    }

    if check.is_correct {
        println!("{barcode} -> {identifier}: correct");
        return Ok(());
    }

    let Some(pending) = check.correction(identifier) else {
        println!("{barcode} -> {identifier}: not confirmed, no candidates to propose");
        return Ok(());
    };
    println!(
        "{barcode} -> {identifier}: incorrect, proposed {} (confidence {})",
        pending.identifier, pending.confidence
    );

    if !apply {
        println!("re-run with --apply --product-id <ID> to write the correction");
        return Ok(());
    }
    let product_id = product_id.ok_or_else(|| anyhow::anyhow!("--apply requires --product-id"))?;

    let pricing = BatchPricingClient::from_app_config(client, Arc::new(TokioSleepGate), config);
    match resolver
        .apply_correction(product_id, barcode, &pending, &pricing)
        .await?
    {
        CorrectionOutcome::FullyApplied {
            identifier,
            new_price,
        } => println!("corrected to {identifier}; listed price set to {new_price}"),
        CorrectionOutcome::MappingOnly { identifier } => {
            println!("corrected to {identifier}; no fresh price available, listed price unchanged");
        }
    }
    Ok(())
}
