//! Rate limiter service: rule + key → quota decision.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::clock::{from_unix_millis, Clock};
use crate::limiter::rule::RateLimitRule;
use crate::limiter::store::{BucketSnapshot, ConsumeRequest, CounterStore, StoreError};

/// Outcome of a rate limit check, carried back to the caller for headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitResult {
    pub allowed: bool,
    /// Points per window for the applied rule.
    pub limit: u32,
    pub remaining: u32,
    /// When the window (or block) ends.
    pub reset_at: SystemTime,
    /// Seconds to wait before retrying. 0 when allowed.
    pub retry_after_secs: u64,
}

/// Rate limiter over an injected counter store.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &Arc<dyn CounterStore> {
        &self.store
    }

    /// Bucket identity for `key` under `rule`. Rules with different windows
    /// never share a bucket; the default rule uses the bare key.
    pub fn bucket_key(rule: &RateLimitRule, key: &str) -> String {
        if rule.name == "default" {
            key.to_string()
        } else {
            format!("{}@{}", key, rule.name)
        }
    }

    /// Atomically consume one point for `key` under `rule`.
    pub async fn consume(&self, key: &str, rule: &RateLimitRule) -> Result<RateLimitResult, StoreError> {
        let now_ms = self.clock.now_millis();
        let req = ConsumeRequest {
            points: rule.points,
            window_ms: duration_ms(rule.duration),
            block_ms: duration_ms(rule.block_duration),
            now_ms,
        };

        let outcome = self
            .store
            .try_consume(&Self::bucket_key(rule, key), req)
            .await?;

        let retry_after_secs = if outcome.allowed {
            0
        } else {
            outcome.ms_before_next.div_ceil(1000)
        };

        Ok(RateLimitResult {
            allowed: outcome.allowed,
            limit: rule.points,
            remaining: rule.points.saturating_sub(outcome.consumed),
            reset_at: from_unix_millis(now_ms.saturating_add(outcome.ms_before_next)),
            retry_after_secs,
        })
    }

    /// Bucket state for `key` under `rule`, without consuming.
    pub async fn inspect(&self, key: &str, rule: &RateLimitRule) -> Result<Option<BucketSnapshot>, StoreError> {
        self.store
            .peek(&Self::bucket_key(rule, key), self.clock.now_millis())
            .await
    }

    /// Administrative reset of `key` under each of `rules`.
    pub async fn reset<'a, I>(&self, key: &str, rules: I) -> Result<(), StoreError>
    where
        I: IntoIterator<Item = &'a RateLimitRule>,
    {
        for rule in rules {
            self.store.reset(&Self::bucket_key(rule, key)).await?;
        }
        Ok(())
    }

    pub async fn clear(&self) -> Result<usize, StoreError> {
        self.store.clear().await
    }

    pub async fn sweep(&self) -> Result<usize, StoreError> {
        self.store.sweep(self.clock.now_millis()).await
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
