use thiserror::Error;

#[derive(Debug, Error)]
pub enum MarketplaceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("token exchange rejected with HTTP {status}: {body}")]
    Auth { status: u16, body: String },

    #[error("token endpoint unreachable: {source}")]
    TokenUnavailable {
        #[source]
        source: reqwest::Error,
    },

    #[error("access to {endpoint} denied after credential refresh")]
    Forbidden { endpoint: String },

    #[error("rate limited by {endpoint} (retry after {retry_after_secs}s)")]
    RateLimited {
        endpoint: String,
        retry_after_secs: u64,
    },

    #[error("no data at {url}")]
    NotFound { url: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid URL \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("batch of {size} identifiers exceeds the provider limit of {max}")]
    BatchTooLarge { size: usize, max: usize },
}

impl MarketplaceError {
    /// Returns `true` for credential-exchange failures. Every later request
    /// in the cycle would fail the same way, so the whole cycle stops.
    #[must_use]
    pub fn aborts_cycle(&self) -> bool {
        matches!(
            self,
            MarketplaceError::Auth { .. } | MarketplaceError::TokenUnavailable { .. }
        )
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, MarketplaceError::NotFound { .. })
    }
}
