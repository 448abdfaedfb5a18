//! Cached bearer credential for the marketplace API.
//!
//! The long-lived refresh secret is exchanged for a short-lived access token
//! at the provider's token endpoint. The token is cached until it is within
//! the safety margin of expiry, or until a downstream 403 invalidates it.

use std::time::Duration;

use reqwest::{Client, Url};
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::MarketplaceError;

/// Longest lifetime trusted from a token response. Larger `expires_in`
/// values are capped so the token is still refreshed at least this often.
pub const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

/// Secrets and endpoint for the refresh-token grant.
#[derive(Clone)]
pub struct CredentialConfig {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub safety_margin: Duration,
    pub timeout_secs: u64,
}

impl CredentialConfig {
    #[must_use]
    pub fn from_app_config(config: &pricesync_core::AppConfig) -> Self {
        Self {
            token_url: config.marketplace_token_url.clone(),
            client_id: config.marketplace_client_id.clone(),
            client_secret: config.marketplace_client_secret.clone(),
            refresh_token: config.marketplace_refresh_token.clone(),
            safety_margin: Duration::from_secs(config.token_safety_margin_secs),
            timeout_secs: config.request_timeout_secs,
        }
    }
}

impl std::fmt::Debug for CredentialConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialConfig")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .field("refresh_token", &"[redacted]")
            .field("safety_margin", &self.safety_margin)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Owns the single cached access token.
///
/// The cache lock is held across the token exchange, so concurrent callers
/// that miss the cache wait for one refresh instead of each starting their
/// own.
pub struct CredentialManager {
    http: Client,
    token_url: Url,
    client_id: String,
    client_secret: String,
    refresh_token: String,
    safety_margin: Duration,
    cached: Mutex<Option<CachedToken>>,
}

impl CredentialManager {
    /// # Errors
    ///
    /// Returns [`MarketplaceError::InvalidUrl`] if the token URL does not
    /// parse, or [`MarketplaceError::Http`] if the HTTP client cannot be built.
    pub fn new(config: CredentialConfig) -> Result<Self, MarketplaceError> {
        let token_url =
            Url::parse(&config.token_url).map_err(|e| MarketplaceError::InvalidUrl {
                url: config.token_url.clone(),
                reason: e.to_string(),
            })?;

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            token_url,
            client_id: config.client_id,
            client_secret: config.client_secret,
            refresh_token: config.refresh_token,
            safety_margin: config.safety_margin,
            cached: Mutex::new(None),
        })
    }

    /// Returns a token that stays valid for at least the safety margin,
    /// exchanging the refresh secret when the cache is empty or stale.
    ///
    /// # Errors
    ///
    /// - [`MarketplaceError::Auth`] if the token endpoint answers non-2xx or
    ///   with a body that is not a token.
    /// - [`MarketplaceError::TokenUnavailable`] if the endpoint cannot be reached.
    pub async fn get_token(&self) -> Result<String, MarketplaceError> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            // A margin too large to add is never satisfied; refresh instead.
            let fresh_until = Instant::now().checked_add(self.safety_margin);
            if fresh_until.is_some_and(|t| t < token.expires_at) {
                return Ok(token.value.clone());
            }
        }

        let fresh = self.exchange().await?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }

    /// Drops the cached token if it is still `rejected`.
    ///
    /// Called after a 403. When another caller has already replaced the
    /// token, the newer one is kept.
    pub async fn invalidate(&self, rejected: &str) {
        let mut cached = self.cached.lock().await;
        if cached.as_ref().is_some_and(|t| t.value == rejected) {
            *cached = None;
            tracing::debug!("marketplace credential invalidated");
        }
    }

    async fn exchange(&self) -> Result<CachedToken, MarketplaceError> {
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", self.refresh_token.as_str()),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];

        let response = self
            .http
            .post(self.token_url.clone())
            .form(&form)
            .send()
            .await
            .map_err(|source| MarketplaceError::TokenUnavailable { source })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| MarketplaceError::TokenUnavailable { source })?;

        if !status.is_success() {
            tracing::error!(status = status.as_u16(), "token exchange rejected");
            return Err(MarketplaceError::Auth {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse =
            serde_json::from_str(&body).map_err(|e| MarketplaceError::Auth {
                status: status.as_u16(),
                body: format!("unreadable token response: {e}"),
            })?;

        tracing::info!(expires_in = token.expires_in, "marketplace credential refreshed");

        let lifetime = Duration::from_secs(token.expires_in).min(MAX_TOKEN_LIFETIME);
        Ok(CachedToken {
            value: token.access_token,
            expires_at: Instant::now() + lifetime,
        })
    }
}
