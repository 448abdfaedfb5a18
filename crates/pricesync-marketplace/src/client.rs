//! Authorized HTTP access to the marketplace API.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, StatusCode, Url};

use crate::credentials::{CredentialConfig, CredentialManager};
use crate::error::MarketplaceError;

/// Header the provider reads the access token from, alongside `Authorization`.
const ACCESS_TOKEN_HEADER: &str = "x-amz-access-token";

/// Used when a 429 carries no usable `Retry-After`.
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// HTTP client bound to one marketplace and one credential.
///
/// Every request goes through [`MarketplaceClient::send_authorized`], which
/// attaches the current token and, on a 403, invalidates it and re-sends the
/// request exactly once with a fresh one.
pub struct MarketplaceClient {
    http: Client,
    base_url: Url,
    marketplace_id: String,
    credentials: Arc<CredentialManager>,
}

impl MarketplaceClient {
    /// Builds the client and its credential manager from application config.
    ///
    /// # Errors
    ///
    /// Returns [`MarketplaceError::InvalidUrl`] if either URL is malformed,
    /// or [`MarketplaceError::Http`] if a `reqwest::Client` cannot be built.
    pub fn from_app_config(config: &pricesync_core::AppConfig) -> Result<Self, MarketplaceError> {
        let credentials = Arc::new(CredentialManager::new(
            CredentialConfig::from_app_config(config),
        )?);
        Self::with_base_url(
            &config.marketplace_api_base_url,
            &config.marketplace_id,
            credentials,
            config.request_timeout_secs,
            &config.user_agent,
        )
    }

    /// Creates a client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`MarketplaceError::InvalidUrl`] if `base_url` is not an
    /// absolute http(s) URL, or [`MarketplaceError::Http`] if the underlying
    /// `reqwest::Client` cannot be constructed.
    pub fn with_base_url(
        base_url: &str,
        marketplace_id: &str,
        credentials: Arc<CredentialManager>,
        timeout_secs: u64,
        user_agent: &str,
    ) -> Result<Self, MarketplaceError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;

        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| MarketplaceError::InvalidUrl {
            url: base_url.to_owned(),
            reason: e.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(MarketplaceError::InvalidUrl {
                url: base_url.to_string(),
                reason: "not a base URL".to_owned(),
            });
        }

        Ok(Self {
            http,
            base_url,
            marketplace_id: marketplace_id.to_owned(),
            credentials,
        })
    }

    #[must_use]
    pub fn marketplace_id(&self) -> &str {
        &self.marketplace_id
    }

    #[must_use]
    pub fn credentials(&self) -> &Arc<CredentialManager> {
        &self.credentials
    }

    /// Appends percent-encoded path segments and query pairs to the base URL.
    pub(crate) fn endpoint(&self, segments: &[&str], query: &[(&str, &str)]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in query {
                pairs.append_pair(k, v);
            }
        }
        url
    }

    pub(crate) async fn get_json(&self, url: &Url) -> Result<serde_json::Value, MarketplaceError> {
        self.send_authorized(Method::GET, url, None).await
    }

    pub(crate) async fn post_json(
        &self,
        url: &Url,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, MarketplaceError> {
        self.send_authorized(Method::POST, url, Some(body)).await
    }

    /// Sends one request with the current token and parses the JSON body.
    ///
    /// # Errors
    ///
    /// - [`MarketplaceError::Forbidden`] if the request is refused twice, the
    ///   second time with a freshly exchanged token.
    /// - [`MarketplaceError::RateLimited`] on HTTP 429.
    /// - [`MarketplaceError::NotFound`] on HTTP 404.
    /// - [`MarketplaceError::UnexpectedStatus`] on any other non-2xx status.
    /// - [`MarketplaceError::Deserialize`] if the body is not JSON.
    /// - Any credential error from [`CredentialManager::get_token`].
    async fn send_authorized(
        &self,
        method: Method,
        url: &Url,
        body: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value, MarketplaceError> {
        let mut refreshed = false;

        loop {
            let token = self.credentials.get_token().await?;

            let mut request = self
                .http
                .request(method.clone(), url.clone())
                .header(ACCESS_TOKEN_HEADER, &token)
                .bearer_auth(&token)
                .header(reqwest::header::ACCEPT, "application/json");
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request.send().await?;
            let status = response.status();

            if status == StatusCode::FORBIDDEN {
                self.credentials.invalidate(&token).await;
                if refreshed {
                    return Err(MarketplaceError::Forbidden {
                        endpoint: url.path().to_owned(),
                    });
                }
                refreshed = true;
                tracing::warn!(endpoint = url.path(), "403 from marketplace; refreshing credential");
                continue;
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after_secs = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.trim().parse::<u64>().ok())
                    .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
                return Err(MarketplaceError::RateLimited {
                    endpoint: url.path().to_owned(),
                    retry_after_secs,
                });
            }

            if status == StatusCode::NOT_FOUND {
                return Err(MarketplaceError::NotFound {
                    url: url.to_string(),
                });
            }

            if !status.is_success() {
                return Err(MarketplaceError::UnexpectedStatus {
                    status: status.as_u16(),
                    url: url.to_string(),
                });
            }

            let text = response.text().await?;
            return serde_json::from_str(&text).map_err(|e| MarketplaceError::Deserialize {
                context: url.path().to_owned(),
                source: e,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client(base_url: &str) -> MarketplaceClient {
        let credentials = CredentialManager::new(CredentialConfig {
            token_url: "https://auth.example/o2/token".to_owned(),
            client_id: "id".to_owned(),
            client_secret: "secret".to_owned(),
            refresh_token: "refresh".to_owned(),
            safety_margin: Duration::from_secs(60),
            timeout_secs: 5,
        })
        .expect("credential manager");
        MarketplaceClient::with_base_url(base_url, "MKT1", Arc::new(credentials), 5, "test-agent")
            .expect("client construction should not fail")
    }

    #[test]
    fn endpoint_joins_segments_under_base_path() {
        let client = test_client("https://api.example/v1/");
        let url = client.endpoint(&["catalog", "items", "X1111111"], &[("marketplaceIds", "MKT1")]);
        assert_eq!(
            url.as_str(),
            "https://api.example/v1/catalog/items/X1111111?marketplaceIds=MKT1"
        );
    }

    #[test]
    fn endpoint_encodes_identifier_segments() {
        let client = test_client("https://api.example");
        let url = client.endpoint(&["pricing", "items", "A/B C", "offers"], &[]);
        assert_eq!(
            url.as_str(),
            "https://api.example/pricing/items/A%2FB%20C/offers"
        );
    }

    #[test]
    fn rejects_relative_base_url() {
        let credentials = CredentialManager::new(CredentialConfig {
            token_url: "https://auth.example/o2/token".to_owned(),
            client_id: "id".to_owned(),
            client_secret: "secret".to_owned(),
            refresh_token: "refresh".to_owned(),
            safety_margin: Duration::from_secs(60),
            timeout_secs: 5,
        })
        .expect("credential manager");
        let result =
            MarketplaceClient::with_base_url("/relative", "MKT1", Arc::new(credentials), 5, "ua");
        assert!(matches!(result, Err(MarketplaceError::InvalidUrl { .. })));
    }
}
