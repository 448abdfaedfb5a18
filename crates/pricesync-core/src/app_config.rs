use std::path::PathBuf;

use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub marketplace_api_base_url: String,
    pub marketplace_token_url: String,
    pub marketplace_client_id: String,
    pub marketplace_client_secret: String,
    pub marketplace_refresh_token: String,
    pub marketplace_id: String,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    /// Identifiers per competitive-summary call. The provider caps this at 20.
    pub batch_size: usize,
    pub batch_interval_secs: u64,
    pub token_safety_margin_secs: u64,
    /// Inclusive bounds for prices scraped out of catalog/offer payloads.
    pub fallback_price_min: Decimal,
    pub fallback_price_max: Decimal,
    pub sync_limit: i64,
    pub verify_mappings: bool,
    pub sync_schedule: String,
    pub pricing_model_path: Option<PathBuf>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("marketplace_api_base_url", &self.marketplace_api_base_url)
            .field("marketplace_token_url", &self.marketplace_token_url)
            .field("marketplace_client_id", &self.marketplace_client_id)
            .field("marketplace_client_secret", &"[redacted]")
            .field("marketplace_refresh_token", &"[redacted]")
            .field("marketplace_id", &self.marketplace_id)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("batch_size", &self.batch_size)
            .field("batch_interval_secs", &self.batch_interval_secs)
            .field("token_safety_margin_secs", &self.token_safety_margin_secs)
            .field("fallback_price_min", &self.fallback_price_min)
            .field("fallback_price_max", &self.fallback_price_max)
            .field("sync_limit", &self.sync_limit)
            .field("verify_mappings", &self.verify_mappings)
            .field("sync_schedule", &self.sync_schedule)
            .field("pricing_model_path", &self.pricing_model_path)
            .finish()
    }
}
