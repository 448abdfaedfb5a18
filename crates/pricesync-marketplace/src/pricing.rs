//! Batched competitive-pricing lookups.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use pricesync_core::config::MAX_BATCH_SIZE;

use crate::client::MarketplaceClient;
use crate::error::MarketplaceError;
use crate::rate_limit::{next_batch_delay, BatchGate};
use crate::types::{BatchItemResponse, BatchResponse, CompetitiveSummary};

/// Fetches competitive summaries in provider-sized batches.
///
/// Each batch is a single upstream call. Items inside a batch are parsed
/// independently, so one bad item never drops its batch-mates. Identifiers
/// that come back without a usable price are simply absent from the result.
pub struct BatchPricingClient {
    client: Arc<MarketplaceClient>,
    gate: Arc<dyn BatchGate>,
    batch_size: usize,
    interval: Duration,
}

impl BatchPricingClient {
    /// `batch_size` is clamped to `1..=20`.
    #[must_use]
    pub fn new(
        client: Arc<MarketplaceClient>,
        gate: Arc<dyn BatchGate>,
        batch_size: usize,
        interval: Duration,
    ) -> Self {
        Self {
            client,
            gate,
            batch_size: batch_size.clamp(1, MAX_BATCH_SIZE),
            interval,
        }
    }

    #[must_use]
    pub fn from_app_config(
        client: Arc<MarketplaceClient>,
        gate: Arc<dyn BatchGate>,
        config: &pricesync_core::AppConfig,
    ) -> Self {
        Self::new(
            client,
            gate,
            config.batch_size,
            Duration::from_secs(config.batch_interval_secs),
        )
    }

    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Waits out the inter-batch interval, stretched to `retry_after_secs`
    /// when the previous batch was throttled.
    pub async fn wait_between_batches(&self, retry_after_secs: Option<u64>) {
        self.gate
            .wait(next_batch_delay(self.interval, retry_after_secs))
            .await;
    }

    /// Fetches every identifier, pacing between batches but not after the
    /// last one.
    ///
    /// A batch that fails outright (network error, throttling, unexpected
    /// status) is logged and its identifiers are left out of the result.
    ///
    /// # Errors
    ///
    /// Returns the error only when it aborts the cycle (credential exchange
    /// failure); see [`MarketplaceError::aborts_cycle`].
    pub async fn fetch_competitive_pricing(
        &self,
        identifiers: &[String],
    ) -> Result<HashMap<String, CompetitiveSummary>, MarketplaceError> {
        let mut found = HashMap::with_capacity(identifiers.len());
        let mut retry_after = None;

        for (batch, chunk) in identifiers.chunks(self.batch_size).enumerate() {
            if batch > 0 {
                self.wait_between_batches(retry_after.take()).await;
            }

            match self.fetch_batch(chunk).await {
                Ok(summaries) => found.extend(summaries),
                Err(e) if e.aborts_cycle() => return Err(e),
                Err(e) => {
                    if let MarketplaceError::RateLimited {
                        retry_after_secs, ..
                    } = &e
                    {
                        retry_after = Some(*retry_after_secs);
                    }
                    tracing::warn!(batch, size = chunk.len(), error = %e, "pricing batch failed");
                }
            }
        }

        Ok(found)
    }

    /// Sends one competitive-summary call for at most 20 identifiers.
    ///
    /// # Errors
    ///
    /// - [`MarketplaceError::BatchTooLarge`] if more than 20 identifiers are given.
    /// - Any error from the authorized request itself.
    /// - [`MarketplaceError::Deserialize`] if the response envelope is unreadable.
    pub async fn fetch_batch(
        &self,
        identifiers: &[String],
    ) -> Result<HashMap<String, CompetitiveSummary>, MarketplaceError> {
        if identifiers.len() > MAX_BATCH_SIZE {
            return Err(MarketplaceError::BatchTooLarge {
                size: identifiers.len(),
                max: MAX_BATCH_SIZE,
            });
        }
        if identifiers.is_empty() {
            return Ok(HashMap::new());
        }

        let marketplace_id = self.client.marketplace_id();
        let requests: Vec<serde_json::Value> = identifiers
            .iter()
            .map(|id| serde_json::json!({ "identifier": id, "marketplaceId": marketplace_id }))
            .collect();
        let body = serde_json::json!({ "requests": requests });

        let url = self
            .client
            .endpoint(&["pricing", "batch", "competitiveSummary"], &[]);
        let value = self.client.post_json(&url, &body).await?;

        let envelope: BatchResponse =
            serde_json::from_value(value).map_err(|e| MarketplaceError::Deserialize {
                context: "competitiveSummary batch".to_owned(),
                source: e,
            })?;

        Ok(collect_summaries(identifiers, envelope))
    }
}

fn collect_summaries(
    requested: &[String],
    envelope: BatchResponse,
) -> HashMap<String, CompetitiveSummary> {
    let mut found = HashMap::new();

    for raw in envelope.responses {
        let item: BatchItemResponse = match serde_json::from_value(raw) {
            Ok(item) => item,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable batch item");
                continue;
            }
        };

        if !requested.contains(&item.identifier) {
            tracing::warn!(identifier = %item.identifier, "batch returned an identifier that was not requested");
            continue;
        }

        if !(200..300).contains(&item.status) {
            tracing::debug!(identifier = %item.identifier, status = item.status, "no competitive summary");
            continue;
        }

        match serde_json::from_value::<CompetitiveSummary>(item.body) {
            Ok(summary) if summary.best_price().is_some() => {
                found.insert(item.identifier, summary);
            }
            Ok(_) => {
                tracing::debug!(identifier = %item.identifier, "competitive summary has no price");
            }
            Err(e) => {
                tracing::warn!(identifier = %item.identifier, error = %e, "unreadable competitive summary");
            }
        }
    }

    found
}
