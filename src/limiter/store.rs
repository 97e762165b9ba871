//! Counter store abstraction.
//!
//! # Responsibilities
//! - Define the two required backend operations: `try_consume` and `reset`
//! - Define optional administrative operations with safe defaults
//!
//! # Design Decisions
//! - `try_consume` is atomic per key; backends choose how
//! - Time is passed in as `now_ms` so buckets are deterministic under test
//! - Backends never decide on fail-open; they report `StoreError` and the
//!   caller decides

use async_trait::async_trait;
use thiserror::Error;

/// Result of a single consumption attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumeOutcome {
    pub allowed: bool,
    /// Points consumed in the current window after this attempt.
    pub consumed: u32,
    /// Milliseconds until the next attempt can succeed (window end, or
    /// block end when blocked).
    pub ms_before_next: u64,
    /// Whether the key is in a blocked state.
    pub blocked: bool,
}

/// Read-only view of a bucket, for administration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct BucketSnapshot {
    pub consumed: u32,
    pub ms_before_reset: u64,
    pub blocked: bool,
}

/// Window parameters for one consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumeRequest {
    pub points: u32,
    pub window_ms: u64,
    pub block_ms: u64,
    pub now_ms: u64,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("backend call timed out after {0}ms")]
    Timeout(u64),

    #[error("unexpected backend reply: {0}")]
    Protocol(String),
}

/// Backend holding per-key buckets.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Short backend name for logs and metrics.
    fn name(&self) -> &'static str;

    /// Atomically check and consume one point for `key`.
    async fn try_consume(&self, key: &str, req: ConsumeRequest)
        -> Result<ConsumeOutcome, StoreError>;

    /// Drop all state for `key`, including any block.
    async fn reset(&self, key: &str) -> Result<(), StoreError>;

    /// Current bucket state without consuming.
    async fn peek(&self, _key: &str, _now_ms: u64) -> Result<Option<BucketSnapshot>, StoreError> {
        Ok(None)
    }

    /// Drop every bucket. Returns how many were removed.
    async fn clear(&self) -> Result<usize, StoreError> {
        Ok(0)
    }

    /// Remove buckets whose window and block have both elapsed.
    /// Backends with native expiry leave this as a no-op.
    async fn sweep(&self, _now_ms: u64) -> Result<usize, StoreError> {
        Ok(0)
    }
}
