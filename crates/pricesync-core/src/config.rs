use std::path::PathBuf;

use rust_decimal::Decimal;

use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Hard ceiling on identifiers per competitive-summary request.
pub const MAX_BATCH_SIZE: usize = 20;

const DEFAULT_API_BASE_URL: &str = "https://sellingpartnerapi-na.amazon.com";
const DEFAULT_TOKEN_URL: &str = "https://api.amazon.com/auth/o2/token";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let require = |var: &str| -> Result<String, ConfigError> {
        match lookup(var) {
            Ok(value) if !value.trim().is_empty() => Ok(value),
            _ => Err(ConfigError::MissingEnvVar(var.to_string())),
        }
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_i64 = |var: &str, default: &str| -> Result<i64, ConfigError> {
        or_default(var, default)
            .parse::<i64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_decimal = |var: &str, default: &str| -> Result<Decimal, ConfigError> {
        or_default(var, default)
            .parse::<Decimal>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_bool = |var: &str, default: &str| -> Result<bool, ConfigError> {
        match or_default(var, default).to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(invalid(var, format!("expected a boolean, got \"{other}\""))),
        }
    };

    let database_url = require("DATABASE_URL")?;
    let marketplace_client_id = require("MARKETPLACE_CLIENT_ID")?;
    let marketplace_client_secret = require("MARKETPLACE_CLIENT_SECRET")?;
    let marketplace_refresh_token = require("MARKETPLACE_REFRESH_TOKEN")?;
    let marketplace_id = require("MARKETPLACE_ID")?;

    let env = parse_environment(&or_default("PRICESYNC_ENV", "development"))?;
    let log_level = or_default("PRICESYNC_LOG_LEVEL", "info");

    let db_max_connections = parse_u32("PRICESYNC_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("PRICESYNC_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("PRICESYNC_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let marketplace_api_base_url = or_default("MARKETPLACE_API_BASE_URL", DEFAULT_API_BASE_URL);
    let marketplace_token_url = or_default("MARKETPLACE_TOKEN_URL", DEFAULT_TOKEN_URL);
    let request_timeout_secs = parse_u64("PRICESYNC_REQUEST_TIMEOUT_SECS", "30")?;
    let user_agent = or_default("PRICESYNC_USER_AGENT", "pricesync/0.1 (price-sync)");

    let batch_size = parse_usize("PRICESYNC_BATCH_SIZE", "20")?;
    if batch_size == 0 || batch_size > MAX_BATCH_SIZE {
        return Err(invalid(
            "PRICESYNC_BATCH_SIZE",
            format!("must be between 1 and {MAX_BATCH_SIZE}, got {batch_size}"),
        ));
    }
    let batch_interval_secs = parse_u64("PRICESYNC_BATCH_INTERVAL_SECS", "31")?;
    let token_safety_margin_secs = parse_u64("PRICESYNC_TOKEN_SAFETY_MARGIN_SECS", "60")?;

    let fallback_price_min = parse_decimal("PRICESYNC_FALLBACK_PRICE_MIN", "10")?;
    let fallback_price_max = parse_decimal("PRICESYNC_FALLBACK_PRICE_MAX", "10000")?;
    if fallback_price_min >= fallback_price_max {
        return Err(invalid(
            "PRICESYNC_FALLBACK_PRICE_MIN",
            format!("must be below PRICESYNC_FALLBACK_PRICE_MAX ({fallback_price_max})"),
        ));
    }

    let sync_limit = parse_i64("PRICESYNC_SYNC_LIMIT", "500")?;
    if sync_limit <= 0 {
        return Err(invalid(
            "PRICESYNC_SYNC_LIMIT",
            format!("must be positive, got {sync_limit}"),
        ));
    }
    let verify_mappings = parse_bool("PRICESYNC_VERIFY_MAPPINGS", "true")?;
    let sync_schedule = or_default("PRICESYNC_SYNC_SCHEDULE", "0 0 3 * * *");
    let pricing_model_path = lookup("PRICESYNC_PRICING_MODEL_PATH")
        .ok()
        .filter(|p| !p.trim().is_empty())
        .map(PathBuf::from);

    Ok(AppConfig {
        database_url,
        env,
        log_level,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        marketplace_api_base_url,
        marketplace_token_url,
        marketplace_client_id,
        marketplace_client_secret,
        marketplace_refresh_token,
        marketplace_id,
        request_timeout_secs,
        user_agent,
        batch_size,
        batch_interval_secs,
        token_safety_margin_secs,
        fallback_price_min,
        fallback_price_max,
        sync_limit,
        verify_mappings,
        sync_schedule,
        pricing_model_path,
    })
}

/// Parse a string into an `Environment` variant.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidEnvVar`] for unrecognised values.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "PRICESYNC_ENV".to_string(),
            reason: format!("unknown environment \"{other}\""),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
