//! Process-local counter store.
//!
//! Buckets live in a `DashMap`. `try_consume` holds the entry guard for the
//! whole check-and-increment, which serializes callers of the same key while
//! keys in other shards proceed in parallel.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::limiter::store::{BucketSnapshot, ConsumeOutcome, ConsumeRequest, CounterStore, StoreError};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Bucket {
    consumed: u32,
    window_started_at_ms: u64,
    window_ms: u64,
    blocked_until_ms: Option<u64>,
}

impl Bucket {
    fn fresh(now_ms: u64, window_ms: u64) -> Self {
        Self {
            consumed: 0,
            window_started_at_ms: now_ms,
            window_ms,
            blocked_until_ms: None,
        }
    }

    fn window_end_ms(&self) -> u64 {
        self.window_started_at_ms.saturating_add(self.window_ms)
    }

    fn expires_at_ms(&self) -> u64 {
        self.window_end_ms().max(self.blocked_until_ms.unwrap_or(0))
    }

    fn is_blocked(&self, now_ms: u64) -> bool {
        self.blocked_until_ms.is_some_and(|until| now_ms < until)
    }

    fn consume(&mut self, req: ConsumeRequest) -> ConsumeOutcome {
        let now = req.now_ms;

        if let Some(until) = self.blocked_until_ms {
            if now < until {
                return ConsumeOutcome {
                    allowed: false,
                    consumed: self.consumed,
                    ms_before_next: until - now,
                    blocked: true,
                };
            }
            *self = Self::fresh(now, req.window_ms);
        }

        if now >= self.window_end_ms() {
            *self = Self::fresh(now, req.window_ms);
        }
        self.window_ms = req.window_ms;
        let until_reset = self.window_end_ms().saturating_sub(now);

        if self.consumed >= req.points {
            if req.block_ms > 0 {
                self.blocked_until_ms = Some(now.saturating_add(req.block_ms));
                return ConsumeOutcome {
                    allowed: false,
                    consumed: self.consumed,
                    ms_before_next: req.block_ms,
                    blocked: true,
                };
            }
            return ConsumeOutcome {
                allowed: false,
                consumed: self.consumed,
                ms_before_next: until_reset,
                blocked: false,
            };
        }

        self.consumed += 1;
        ConsumeOutcome {
            allowed: true,
            consumed: self.consumed,
            ms_before_next: until_reset,
            blocked: false,
        }
    }
}

/// In-memory buckets keyed by limiting key.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    buckets: DashMap<String, Bucket>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked buckets, live or not yet swept.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn try_consume(
        &self,
        key: &str,
        req: ConsumeRequest,
    ) -> Result<ConsumeOutcome, StoreError> {
        let mut bucket = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| Bucket::fresh(req.now_ms, req.window_ms));
        Ok(bucket.consume(req))
    }

    async fn reset(&self, key: &str) -> Result<(), StoreError> {
        self.buckets.remove(key);
        Ok(())
    }

    async fn peek(&self, key: &str, now_ms: u64) -> Result<Option<BucketSnapshot>, StoreError> {
        let Some(bucket) = self.buckets.get(key) else {
            return Ok(None);
        };
        if now_ms >= bucket.expires_at_ms() {
            return Ok(None);
        }
        Ok(Some(BucketSnapshot {
            consumed: bucket.consumed,
            ms_before_reset: bucket.expires_at_ms() - now_ms,
            blocked: bucket.is_blocked(now_ms),
        }))
    }

    async fn clear(&self) -> Result<usize, StoreError> {
        let count = self.buckets.len();
        self.buckets.clear();
        Ok(count)
    }

    async fn sweep(&self, now_ms: u64) -> Result<usize, StoreError> {
        let before = self.buckets.len();
        self.buckets.retain(|_, bucket| now_ms < bucket.expires_at_ms());
        Ok(before.saturating_sub(self.buckets.len()))
    }
}
