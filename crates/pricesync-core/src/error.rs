use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read pricing model file {path}: {source}")]
    PricingModelIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse pricing model file: {0}")]
    PricingModelParse(#[from] serde_yaml::Error),

    #[error("invalid pricing model: {0}")]
    InvalidPricingModel(String),
}

/// Validation failures from the cost-based pricing calculator.
///
/// These are never retryable: the input itself is unusable.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PricingError {
    #[error("unit cost must be positive, got {cost}")]
    InvalidCost { cost: Decimal },

    #[error("observed price must be positive, got {price}")]
    InvalidPrice { price: Decimal },

    #[error("pricing arithmetic overflowed for cost {cost}")]
    Overflow { cost: Decimal },
}
