//! Inter-batch pacing.
//!
//! The competitive-summary endpoint allows roughly one call every 30
//! seconds per credential. [`BatchPricingClient`](crate::BatchPricingClient)
//! waits on a [`BatchGate`] between batches; tests substitute a gate that
//! records the requested delays instead of sleeping.

use std::time::Duration;

use async_trait::async_trait;

#[async_trait]
pub trait BatchGate: Send + Sync {
    /// Suspends the caller for `delay` before the next batch is sent.
    async fn wait(&self, delay: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleepGate;

#[async_trait]
impl BatchGate for TokioSleepGate {
    async fn wait(&self, delay: Duration) {
        tracing::debug!(delay_secs = delay.as_secs(), "waiting before next pricing batch");
        tokio::time::sleep(delay).await;
    }
}

/// The wait before the next batch: the fixed interval, or the provider's
/// `Retry-After` if that is longer.
#[must_use]
pub fn next_batch_delay(interval: Duration, retry_after_secs: Option<u64>) -> Duration {
    retry_after_secs
        .map(Duration::from_secs)
        .map_or(interval, |retry_after| retry_after.max(interval))
}
