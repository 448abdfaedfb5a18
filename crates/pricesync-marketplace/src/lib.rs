pub mod catalog;
pub mod client;
pub mod credentials;
pub mod error;
pub mod price_extract;
pub mod pricing;
pub mod rate_limit;
pub mod search;
pub mod types;

pub use catalog::{CatalogFallbackClient, FallbackOrigin, FallbackPrice};
pub use client::MarketplaceClient;
pub use credentials::{CredentialConfig, CredentialManager};
pub use error::MarketplaceError;
pub use price_extract::PriceExtractor;
pub use pricing::BatchPricingClient;
pub use rate_limit::{BatchGate, TokioSleepGate};
pub use search::SearchResult;
pub use types::{CatalogItem, CompetitiveSummary, Money, Offer, OffersPayload};
