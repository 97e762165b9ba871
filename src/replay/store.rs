//! Replay store abstraction.
//!
//! # Responsibilities
//! - Remember accepted one-time signatures until they expire
//! - Offer an atomic upsert-if-absent for the accept path
//!
//! # Design Decisions
//! - A record is live while `now < expires_at`; expired records are evicted
//!   on lookup as well as by sweep
//! - `mark_used` on a live record only refreshes `used_at`, so marking twice
//!   never extends eligibility

use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::clock::rfc3339_millis;

/// Longest lifetime a record is given. Larger TTLs are clamped.
pub const MAX_RECORD_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// An accepted signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureRecord {
    pub value: String,
    pub used_at: SystemTime,
    pub expires_at: SystemTime,
}

impl SignatureRecord {
    pub fn new(value: &str, now: SystemTime, ttl: Duration) -> Self {
        Self {
            value: value.to_string(),
            used_at: now,
            expires_at: now
                .checked_add(ttl.min(MAX_RECORD_TTL))
                .unwrap_or(now),
        }
    }

    pub fn is_live(&self, now: SystemTime) -> bool {
        now < self.expires_at
    }
}

/// A record as shown to administrators: the value is truncated.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RecordSummary {
    pub value: String,
    pub used_at: String,
    pub expires_at: String,
}

const SUMMARY_PREFIX_CHARS: usize = 20;

impl From<&SignatureRecord> for RecordSummary {
    fn from(record: &SignatureRecord) -> Self {
        let value = if record.value.chars().count() > SUMMARY_PREFIX_CHARS {
            let prefix: String = record.value.chars().take(SUMMARY_PREFIX_CHARS).collect();
            format!("{prefix}...")
        } else {
            record.value.clone()
        };
        Self {
            value,
            used_at: rfc3339_millis(record.used_at).unwrap_or_default(),
            expires_at: rfc3339_millis(record.expires_at).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ReplayStats {
    pub total: usize,
    pub records: Vec<RecordSummary>,
}

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("replay backend unavailable: {0}")]
    Unavailable(String),

    #[error("replay backend call timed out after {0}ms")]
    Timeout(u64),
}

/// Store of consumed one-time signatures.
#[async_trait]
pub trait ReplayStore: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether `token` has a live record.
    async fn is_used(&self, token: &str) -> Result<bool, ReplayError>;

    /// Record `token` as used for `ttl`. A live record keeps its expiry.
    async fn mark_used(&self, token: &str, ttl: Duration) -> Result<(), ReplayError>;

    /// Record `token` only if it has no live record.
    /// Returns `true` when this call created the record.
    async fn check_and_mark(&self, token: &str, ttl: Duration) -> Result<bool, ReplayError>;

    /// Remove expired records. Returns how many were removed.
    async fn sweep(&self) -> Result<usize, ReplayError>;

    /// Remove every record. Returns how many were removed.
    async fn clear(&self) -> Result<usize, ReplayError>;

    async fn stats(&self) -> Result<ReplayStats, ReplayError>;
}
