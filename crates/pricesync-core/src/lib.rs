pub mod app_config;
pub mod config;
pub mod error;
pub mod market;
pub mod pricing;
pub mod pricing_model;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use error::{ConfigError, PricingError};
pub use market::{
    round_cents, MarketIntelligenceRecord, PricingCalculation, PricingSource, ProductCostRecord,
};
pub use pricing::CostBasedPricingCalculator;
pub use pricing_model::{load_pricing_model, PricingModel, ScoreTier};
