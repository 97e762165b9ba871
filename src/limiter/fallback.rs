//! Shared store with a local fallback.
//!
//! # Data Flow
//! ```text
//! try_consume(key)
//!     → shared store, bounded by timeout
//!     → on error/timeout: warn, count fallback, use local store
//! ```
//!
//! # Design Decisions
//! - The local store keeps its own buckets; during an outage each instance
//!   limits independently rather than not at all
//! - Every shared call is bounded so a hung backend cannot stall admission

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::limiter::memory::MemoryCounterStore;
use crate::limiter::store::{BucketSnapshot, ConsumeOutcome, ConsumeRequest, CounterStore, StoreError};
use crate::observability::metrics;

pub struct FallbackCounterStore {
    shared: Arc<dyn CounterStore>,
    local: MemoryCounterStore,
    timeout: Duration,
}

impl FallbackCounterStore {
    pub fn new(shared: Arc<dyn CounterStore>, timeout: Duration) -> Self {
        Self {
            shared,
            local: MemoryCounterStore::new(),
            timeout,
        }
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>> + Send,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.timeout.as_millis() as u64)),
        }
    }

    fn record_fallback(&self, op: &str, error: &StoreError) {
        tracing::warn!(
            backend = self.shared.name(),
            op = op,
            error = %error,
            "Shared counter store unavailable, using local store"
        );
        metrics::record_backend_fallback(self.shared.name());
    }
}

#[async_trait]
impl CounterStore for FallbackCounterStore {
    fn name(&self) -> &'static str {
        self.shared.name()
    }

    async fn try_consume(
        &self,
        key: &str,
        req: ConsumeRequest,
    ) -> Result<ConsumeOutcome, StoreError> {
        match self.bounded(self.shared.try_consume(key, req)).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.record_fallback("try_consume", &e);
                self.local.try_consume(key, req).await
            }
        }
    }

    async fn reset(&self, key: &str) -> Result<(), StoreError> {
        self.local.reset(key).await?;
        self.bounded(self.shared.reset(key)).await
    }

    async fn peek(&self, key: &str, now_ms: u64) -> Result<Option<BucketSnapshot>, StoreError> {
        match self.bounded(self.shared.peek(key, now_ms)).await {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => {
                self.record_fallback("peek", &e);
                self.local.peek(key, now_ms).await
            }
        }
    }

    async fn clear(&self) -> Result<usize, StoreError> {
        let local = self.local.clear().await?;
        let shared = self.bounded(self.shared.clear()).await?;
        Ok(local + shared)
    }

    async fn sweep(&self, now_ms: u64) -> Result<usize, StoreError> {
        self.local.sweep(now_ms).await
    }
}
