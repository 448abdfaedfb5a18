mod mapping;
mod price;
mod sync;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::mapping::MappingCommands;
use crate::price::PriceCommands;
use crate::sync::SyncCommands;

/// Log level used before configuration is loaded.
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Parser)]
#[command(name = "pricesync-cli")]
#[command(about = "Marketplace price synchronization")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run or schedule price sync cycles
    Sync {
        #[command(subcommand)]
        command: SyncCommands,
    },
    /// Inspect and correct barcode mappings
    Mapping {
        #[command(subcommand)]
        command: MappingCommands,
    },
    /// Pricing calculations that need no database
    Price {
        #[command(subcommand)]
        command: PriceCommands,
    },
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check that the database is reachable
    Ping,
    /// Apply pending migrations
    Migrate,
}

fn init_tracing(log_level: &str) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(log_level))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    Ok(())
}

/// Loads config, starts logging and connects the pool.
async fn bootstrap() -> anyhow::Result<(pricesync_core::AppConfig, sqlx::PgPool)> {
    let config = pricesync_core::load_app_config()?;
    init_tracing(&config.log_level)?;

    let pool_config = pricesync_db::PoolConfig::from_app_config(&config);
    let pool = pricesync_db::connect_pool(&config.database_url, pool_config).await?;
    Ok((config, pool))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("pricesync-cli: no command given (see --help)");
        return Ok(());
    };

    match command {
        Commands::Sync { command } => {
            let (config, pool) = bootstrap().await?;
            match command {
                SyncCommands::Run {
                    limit,
                    timeout_secs,
                    skip_verify,
                    json,
                } => {
                    sync::run_sync_once(&pool, &config, limit, timeout_secs, skip_verify, json)
                        .await?;
                }
                SyncCommands::Schedule => {
                    sync::run_sync_schedule(pool, Arc::new(config)).await?;
                }
            }
        }
        Commands::Mapping {
            command:
                MappingCommands::Verify {
                    barcode,
                    identifier,
                    apply,
                    product_id,
                },
        } => {
            let (config, pool) = bootstrap().await?;
            mapping::run_mapping_verify(&pool, &config, &barcode, &identifier, apply, product_id)
                .await?;
        }
        Commands::Price {
            command: PriceCommands::Quote { cost, model },
        } => {
            init_tracing(DEFAULT_LOG_LEVEL)?;
            price::run_price_quote(cost, model.as_deref())?;
        }
        Commands::Db { command } => {
            let (_config, pool) = bootstrap().await?;
            match command {
                DbCommands::Ping => {
                    pricesync_db::ping(&pool).await?;
                    println!("database: ok");
                }
                DbCommands::Migrate => {
                    let applied = pricesync_db::run_migrations(&pool).await?;
                    println!("migrations: {applied} applied");
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests;
