//! Shared replay store with a local fallback.
//!
//! Mirrors the counter store fallback: every shared call is bounded by a
//! timeout, and on failure the local store answers instead. Tokens accepted
//! during an outage are only remembered by this instance.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::clock::Clock;
use crate::observability::metrics;
use crate::replay::memory::MemoryReplayStore;
use crate::replay::store::{ReplayError, ReplayStats, ReplayStore};

pub struct FallbackReplayStore {
    shared: Arc<dyn ReplayStore>,
    local: MemoryReplayStore,
    timeout: Duration,
}

impl FallbackReplayStore {
    pub fn new(shared: Arc<dyn ReplayStore>, clock: Arc<dyn Clock>, timeout: Duration) -> Self {
        Self {
            shared,
            local: MemoryReplayStore::new(clock),
            timeout,
        }
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, ReplayError>
    where
        F: Future<Output = Result<T, ReplayError>> + Send,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ReplayError::Timeout(self.timeout.as_millis() as u64)),
        }
    }

    fn record_fallback(&self, op: &str, error: &ReplayError) {
        tracing::warn!(
            backend = self.shared.name(),
            op = op,
            error = %error,
            "Shared replay store unavailable, using local store"
        );
        metrics::record_backend_fallback(self.shared.name());
    }
}

#[async_trait]
impl ReplayStore for FallbackReplayStore {
    fn name(&self) -> &'static str {
        self.shared.name()
    }

    async fn is_used(&self, token: &str) -> Result<bool, ReplayError> {
        match self.bounded(self.shared.is_used(token)).await {
            Ok(used) => Ok(used || self.local.is_used(token).await?),
            Err(e) => {
                self.record_fallback("is_used", &e);
                self.local.is_used(token).await
            }
        }
    }

    async fn mark_used(&self, token: &str, ttl: Duration) -> Result<(), ReplayError> {
        match self.bounded(self.shared.mark_used(token, ttl)).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.record_fallback("mark_used", &e);
                self.local.mark_used(token, ttl).await
            }
        }
    }

    async fn check_and_mark(&self, token: &str, ttl: Duration) -> Result<bool, ReplayError> {
        match self.bounded(self.shared.check_and_mark(token, ttl)).await {
            Ok(created) => Ok(created && !self.local.is_used(token).await?),
            Err(e) => {
                self.record_fallback("check_and_mark", &e);
                self.local.check_and_mark(token, ttl).await
            }
        }
    }

    async fn sweep(&self) -> Result<usize, ReplayError> {
        let local = self.local.sweep().await?;
        let shared = self.bounded(self.shared.sweep()).await?;
        Ok(local + shared)
    }

    async fn clear(&self) -> Result<usize, ReplayError> {
        let local = self.local.clear().await?;
        let shared = self.bounded(self.shared.clear()).await?;
        Ok(local + shared)
    }

    async fn stats(&self) -> Result<ReplayStats, ReplayError> {
        let mut stats = self.bounded(self.shared.stats()).await?;
        let local = self.local.stats().await?;
        stats.total += local.total;
        stats.records.extend(local.records);
        Ok(stats)
    }
}
