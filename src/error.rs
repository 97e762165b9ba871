//! Error taxonomy for the admission core.
//!
//! # Design Decisions
//! - Infrastructure errors (`Configuration`, `BackendUnavailable`) never deny
//!   a request; the pipeline logs them and lets traffic through
//! - `QuotaExceeded` is an expected outcome, logged as an admission event
//! - The three signature reasons stay distinct internally and collapse to a
//!   single 401 message externally

use thiserror::Error;

use crate::limiter::StoreError;
use crate::replay::ReplayError;
use crate::signature::{EnvelopeError, SignatureRejection};

/// Errors surfaced by the gatekeeper core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatekeeperError {
    /// Malformed rule, pattern, or missing key.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Shared counter or replay backend unreachable or timed out.
    #[error("backend unavailable: {backend}: {reason}")]
    BackendUnavailable {
        backend: &'static str,
        reason: String,
    },

    /// Request exceeded its quota.
    #[error("quota exceeded, retry after {retry_after_secs}s")]
    QuotaExceeded { retry_after_secs: u64 },

    #[error("signature missing")]
    SignatureMissing,

    #[error("signature invalid")]
    SignatureInvalid,

    #[error("signature already used")]
    SignatureReplayed,

    /// Envelope could not be opened. Only ever observed internally.
    #[error("decryption failed: {0}")]
    Decryption(String),
}

impl GatekeeperError {
    /// Whether the pipeline should let the request through despite the error.
    pub fn is_fail_open(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::BackendUnavailable { .. })
    }

    /// Short label for logs and metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::BackendUnavailable { .. } => "backend_unavailable",
            Self::QuotaExceeded { .. } => "quota_exceeded",
            Self::SignatureMissing => "missing",
            Self::SignatureInvalid => "invalid",
            Self::SignatureReplayed => "replayed",
            Self::Decryption(_) => "decryption",
        }
    }
}

impl From<StoreError> for GatekeeperError {
    fn from(e: StoreError) -> Self {
        Self::BackendUnavailable {
            backend: "counter",
            reason: e.to_string(),
        }
    }
}

impl From<ReplayError> for GatekeeperError {
    fn from(e: ReplayError) -> Self {
        Self::BackendUnavailable {
            backend: "replay",
            reason: e.to_string(),
        }
    }
}

impl From<EnvelopeError> for GatekeeperError {
    fn from(e: EnvelopeError) -> Self {
        match e {
            EnvelopeError::MissingKey => Self::Configuration(e.to_string()),
            other => Self::Decryption(other.to_string()),
        }
    }
}

impl From<SignatureRejection> for GatekeeperError {
    fn from(r: SignatureRejection) -> Self {
        match r {
            SignatureRejection::Missing => Self::SignatureMissing,
            SignatureRejection::Invalid => Self::SignatureInvalid,
            SignatureRejection::Replayed => Self::SignatureReplayed,
        }
    }
}

pub type Result<T> = std::result::Result<T, GatekeeperError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fail_open_classification() {
        assert!(GatekeeperError::Configuration("bad rule".into()).is_fail_open());
        assert!(GatekeeperError::from(StoreError::Timeout(250)).is_fail_open());
        assert!(GatekeeperError::from(ReplayError::Unavailable("refused".into())).is_fail_open());
        assert!(!GatekeeperError::QuotaExceeded { retry_after_secs: 3 }.is_fail_open());
        assert!(!GatekeeperError::SignatureReplayed.is_fail_open());
        assert!(!GatekeeperError::from(EnvelopeError::InvalidFormat).is_fail_open());
    }

    #[test]
    fn test_display() {
        let err = GatekeeperError::from(StoreError::Unavailable("connection refused".into()));
        assert_eq!(
            err.to_string(),
            "backend unavailable: counter: backend unavailable: connection refused"
        );
    }

    #[test]
    fn test_rejection_mapping() {
        assert_eq!(
            GatekeeperError::from(SignatureRejection::Replayed),
            GatekeeperError::SignatureReplayed
        );
        assert_eq!(GatekeeperError::from(SignatureRejection::Missing).reason(), "missing");
        assert!(matches!(
            GatekeeperError::from(EnvelopeError::MissingKey),
            GatekeeperError::Configuration(_)
        ));
    }
}
