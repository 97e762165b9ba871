//! Admission outcomes.

use std::time::SystemTime;

use axum::http::StatusCode;

use crate::error::GatekeeperError;
use crate::limiter::RateLimitResult;

/// Quota information attached to the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaMetadata {
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: SystemTime,
}

impl From<&RateLimitResult> for QuotaMetadata {
    fn from(result: &RateLimitResult) -> Self {
        Self {
            limit: result.limit,
            remaining: result.remaining,
            reset_at: result.reset_at,
        }
    }
}

/// A denied request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denial {
    pub status: StatusCode,
    /// Caller-visible message.
    pub message: String,
    /// Only set for rate limit denials.
    pub retry_after_secs: Option<u64>,
    pub quota: Option<QuotaMetadata>,
    /// Internal reason, never sent to the caller.
    pub reason: GatekeeperError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow { quota: Option<QuotaMetadata> },
    Deny(Denial),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow { .. })
    }

    pub fn quota(&self) -> Option<&QuotaMetadata> {
        match self {
            Self::Allow { quota } => quota.as_ref(),
            Self::Deny(denial) => denial.quota.as_ref(),
        }
    }

    pub fn denial(&self) -> Option<&Denial> {
        match self {
            Self::Allow { .. } => None,
            Self::Deny(denial) => Some(denial),
        }
    }
}
