//! Signature verification with one-time-use enforcement.
//!
//! # Data Flow
//! ```text
//! signature
//!     → [once_only] replay pre-check (is_used)      → Replayed
//!     → mode check (allow list / envelope / hmac)   → Invalid | Missing
//!     → [once_only] check_and_mark (atomic)         → Replayed if lost race
//!     → accepted
//! ```
//!
//! # Design Decisions
//! - The pre-check skips decryption for tokens already burned
//! - `check_and_mark` is the only write, so an accepted token is recorded
//!   exactly once even when two requests race
//! - Replay backend errors fail open; an invalid signature never does
//! - Decryption failures are swallowed into `Invalid`

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::admission::context::RequestContext;
use crate::clock::Clock;
use crate::config::schema::{CryptoConfig, SignatureConfig, SignatureMode};
use crate::error::GatekeeperError;
use crate::replay::ReplayStore;
use crate::signature::digest::{self, DigestFailure};
use crate::signature::envelope::EnvelopeCipher;
use crate::signature::exemption::ExemptionList;

/// Internal rejection reason. Callers outside the pipeline only see a 401.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureRejection {
    Missing,
    Invalid,
    Replayed,
}

/// Immutable verification settings for one policy snapshot.
#[derive(Debug, Clone)]
pub struct VerificationConfig {
    pub mode: SignatureMode,
    pub allow_list: HashSet<String>,
    /// Resolved envelope key (`encryption_key`, else `crypto.master_key`).
    pub envelope_key: String,
    pub marker: String,
    pub one_time_use: bool,
    pub record_ttl: Duration,
    pub exemptions: ExemptionList,
    pub path_prefix: String,
    pub hmac_secret: String,
    pub time_window: Duration,
}

impl VerificationConfig {
    pub fn from_config(signature: &SignatureConfig, crypto: &CryptoConfig) -> Self {
        let envelope_key = if signature.encryption_key.is_empty() {
            crypto.master_key.clone()
        } else {
            signature.encryption_key.clone()
        };

        Self {
            mode: signature.mode,
            allow_list: signature.valid_signs.iter().cloned().collect(),
            envelope_key,
            marker: signature.marker.clone(),
            one_time_use: signature.once_only,
            record_ttl: Duration::from_secs(signature.sign_expiration_secs),
            exemptions: ExemptionList::new(&signature.whitelist),
            path_prefix: signature.path_prefix.clone(),
            hmac_secret: signature.hmac_secret.clone(),
            time_window: Duration::from_secs(signature.time_window_secs),
        }
    }

    /// A reason this configuration can never accept a signature, if any.
    pub fn unusable_reason(&self) -> Option<&'static str> {
        match self.mode {
            SignatureMode::AllowList if self.allow_list.is_empty() => {
                Some("allow_list mode with no valid_signs")
            }
            SignatureMode::EncryptedEnvelope if self.envelope_key.is_empty() => {
                Some("encrypted_envelope mode with no encryption_key or crypto.master_key")
            }
            SignatureMode::Either if self.allow_list.is_empty() && self.envelope_key.is_empty() => {
                Some("either mode with no valid_signs and no envelope key")
            }
            SignatureMode::Hmac if self.hmac_secret.is_empty() => Some("hmac mode with no hmac_secret"),
            _ => None,
        }
    }

    /// Whether `path` requires a signature.
    pub fn applies_to(&self, path: &str) -> bool {
        path.starts_with(self.path_prefix.as_str()) && !self.exemptions.is_exempt(path)
    }
}

/// First characters of a signature, for logs.
pub(crate) fn redact(signature: &str) -> String {
    let prefix: String = signature.chars().take(8).collect();
    format!("{prefix}...")
}

pub struct SignatureVerifier {
    replay: Arc<dyn ReplayStore>,
    cipher: Arc<dyn EnvelopeCipher>,
    clock: Arc<dyn Clock>,
}

impl SignatureVerifier {
    pub fn new(
        replay: Arc<dyn ReplayStore>,
        cipher: Arc<dyn EnvelopeCipher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            replay,
            cipher,
            clock,
        }
    }

    pub fn replay_store(&self) -> &Arc<dyn ReplayStore> {
        &self.replay
    }

    /// `true` iff the signature is accepted.
    pub async fn verify(&self, signature: &str, ctx: &RequestContext, config: &VerificationConfig) -> bool {
        self.check(signature, ctx, config).await.is_ok()
    }

    /// Verify and, in one-time mode, burn the signature.
    pub async fn check(
        &self,
        signature: &str,
        ctx: &RequestContext,
        config: &VerificationConfig,
    ) -> Result<(), SignatureRejection> {
        if signature.is_empty() {
            return Err(SignatureRejection::Missing);
        }

        if config.one_time_use {
            match self.replay.is_used(signature).await {
                Ok(true) => return Err(SignatureRejection::Replayed),
                Ok(false) => {}
                Err(e) => {
                    let err = GatekeeperError::from(e);
                    tracing::warn!(error = %err, "Replay pre-check failed, continuing");
                }
            }
        }

        if !self.mode_check(signature, ctx, config)? {
            return Err(SignatureRejection::Invalid);
        }

        if config.one_time_use {
            match self.replay.check_and_mark(signature, config.record_ttl).await {
                Ok(true) => {}
                Ok(false) => return Err(SignatureRejection::Replayed),
                Err(e) => {
                    let err = GatekeeperError::from(e);
                    tracing::warn!(
                        error = %err,
                        signature = %redact(signature),
                        "Could not record one-time signature, accepting"
                    );
                }
            }
        }

        Ok(())
    }

    fn mode_check(
        &self,
        signature: &str,
        ctx: &RequestContext,
        config: &VerificationConfig,
    ) -> Result<bool, SignatureRejection> {
        match config.mode {
            SignatureMode::AllowList => Ok(config.allow_list.contains(signature)),
            SignatureMode::EncryptedEnvelope => Ok(self.envelope_check(signature, config)),
            SignatureMode::Either => Ok(config.allow_list.contains(signature)
                || self.envelope_check(signature, config)),
            SignatureMode::Hmac => {
                let now_secs = self.clock.now_millis() / 1000;
                match digest::verify(
                    &config.hmac_secret,
                    signature,
                    ctx.timestamp.as_deref(),
                    ctx.nonce.as_deref().unwrap_or(""),
                    ctx.method.as_str(),
                    &ctx.path,
                    now_secs,
                    config.time_window.as_secs(),
                ) {
                    Ok(()) => Ok(true),
                    Err(DigestFailure::MissingTimestamp) => Err(SignatureRejection::Missing),
                    Err(failure) => {
                        tracing::debug!(failure = ?failure, "Digest rejected");
                        Ok(false)
                    }
                }
            }
        }
    }

    fn envelope_check(&self, signature: &str, config: &VerificationConfig) -> bool {
        if config.envelope_key.is_empty() {
            return false;
        }
        match self.cipher.open(signature, &config.envelope_key) {
            Ok(plaintext) => plaintext.contains(config.marker.as_str()),
            Err(e) => {
                let err = GatekeeperError::from(e);
                tracing::debug!(error = %err, signature = %redact(signature), "Envelope rejected");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::replay::MemoryReplayStore;
    use crate::signature::envelope::AesGcmEnvelope;
    use axum::http::Method;

    fn config(mode: SignatureMode) -> VerificationConfig {
        VerificationConfig::from_config(
            &SignatureConfig {
                enabled: true,
                mode,
                valid_signs: vec!["abc".into(), "xyz".into()],
                encryption_key: "envelope-key".into(),
                hmac_secret: "hmac-secret".into(),
                ..Default::default()
            },
            &CryptoConfig::default(),
        )
    }

    fn verifier() -> (SignatureVerifier, ManualClock) {
        let clock = ManualClock::at_unix_secs(1_700_000_000);
        let shared: Arc<dyn Clock> = Arc::new(clock.clone());
        let verifier = SignatureVerifier::new(
            Arc::new(MemoryReplayStore::new(shared.clone())),
            Arc::new(AesGcmEnvelope),
            shared,
        );
        (verifier, clock)
    }

    fn ctx() -> RequestContext {
        RequestContext::new(Method::POST, "/api/orders", "10.0.0.1")
    }

    #[tokio::test]
    async fn test_allow_list_mode() {
        let (verifier, _) = verifier();
        let cfg = config(SignatureMode::AllowList);
        assert!(verifier.verify("abc", &ctx(), &cfg).await);
        assert!(!verifier.verify("abcd", &ctx(), &cfg).await);
    }

    #[tokio::test]
    async fn test_envelope_mode_requires_marker() {
        let (verifier, _) = verifier();
        let cfg = config(SignatureMode::EncryptedEnvelope);
        let good = AesGcmEnvelope.seal("bag-2024-001", "envelope-key").unwrap();
        let no_marker = AesGcmEnvelope.seal("box-2024-001", "envelope-key").unwrap();

        assert!(verifier.verify(&good, &ctx(), &cfg).await);
        assert!(!verifier.verify(&no_marker, &ctx(), &cfg).await);
        assert!(!verifier.verify("abc", &ctx(), &cfg).await);
    }

    #[tokio::test]
    async fn test_envelope_falls_back_to_master_key() {
        let (verifier, _) = verifier();
        let cfg = VerificationConfig::from_config(
            &SignatureConfig {
                mode: SignatureMode::EncryptedEnvelope,
                ..Default::default()
            },
            &CryptoConfig {
                master_key: "master".into(),
            },
        );
        let envelope = AesGcmEnvelope.seal("bag", "master").unwrap();
        assert!(verifier.verify(&envelope, &ctx(), &cfg).await);
    }

    #[tokio::test]
    async fn test_either_mode_accepts_allow_list_when_decode_fails() {
        let (verifier, _) = verifier();
        let cfg = config(SignatureMode::Either);
        assert!(verifier.verify("abc", &ctx(), &cfg).await);

        let envelope = AesGcmEnvelope.seal("bag", "envelope-key").unwrap();
        assert!(verifier.verify(&envelope, &ctx(), &cfg).await);
        assert!(!verifier.verify("nope", &ctx(), &cfg).await);
    }

    #[tokio::test]
    async fn test_one_time_use_rejects_replay() {
        let (verifier, clock) = verifier();
        let mut cfg = config(SignatureMode::Either);
        cfg.one_time_use = true;

        assert_eq!(verifier.check("xyz", &ctx(), &cfg).await, Ok(()));
        assert_eq!(
            verifier.check("xyz", &ctx(), &cfg).await,
            Err(SignatureRejection::Replayed)
        );

        clock.advance(cfg.record_ttl);
        assert_eq!(verifier.check("xyz", &ctx(), &cfg).await, Ok(()));
    }

    #[tokio::test]
    async fn test_invalid_signature_is_not_recorded() {
        let (verifier, _) = verifier();
        let mut cfg = config(SignatureMode::AllowList);
        cfg.one_time_use = true;

        assert_eq!(
            verifier.check("forged", &ctx(), &cfg).await,
            Err(SignatureRejection::Invalid)
        );
        assert!(!verifier.replay_store().is_used("forged").await.unwrap());
    }

    #[tokio::test]
    async fn test_hmac_mode() {
        let (verifier, _) = verifier();
        let cfg = config(SignatureMode::Hmac);
        let sig = digest::sign("hmac-secret", "1700000000", "n-1", "POST", "/api/orders");

        let signed = ctx().with_timestamp("1700000000").with_nonce("n-1");
        assert_eq!(verifier.check(&sig, &signed, &cfg).await, Ok(()));
        assert_eq!(
            verifier.check(&sig, &ctx(), &cfg).await,
            Err(SignatureRejection::Missing)
        );

        let other_path = RequestContext::new(Method::POST, "/api/refunds", "10.0.0.1")
            .with_timestamp("1700000000")
            .with_nonce("n-1");
        assert_eq!(
            verifier.check(&sig, &other_path, &cfg).await,
            Err(SignatureRejection::Invalid)
        );
    }

    #[tokio::test]
    async fn test_empty_signature_is_missing() {
        let (verifier, _) = verifier();
        assert_eq!(
            verifier.check("", &ctx(), &config(SignatureMode::AllowList)).await,
            Err(SignatureRejection::Missing)
        );
    }

    #[test]
    fn test_unusable_configurations() {
        let mut cfg = config(SignatureMode::AllowList);
        assert!(cfg.unusable_reason().is_none());

        cfg.allow_list.clear();
        assert!(cfg.unusable_reason().is_some());

        cfg.mode = SignatureMode::Either;
        assert!(cfg.unusable_reason().is_none());
        cfg.envelope_key.clear();
        assert!(cfg.unusable_reason().is_some());

        cfg.mode = SignatureMode::Hmac;
        assert!(cfg.unusable_reason().is_none());
        cfg.hmac_secret.clear();
        assert!(cfg.unusable_reason().is_some());
    }

    #[test]
    fn test_applies_to_prefix_and_exemptions() {
        let mut cfg = config(SignatureMode::AllowList);
        cfg.exemptions = ExemptionList::new(&["^/api/public".to_string()]);
        assert!(cfg.applies_to("/api/orders"));
        assert!(!cfg.applies_to("/api/public/menus"));
        assert!(!cfg.applies_to("/admin/login"));
    }

    #[test]
    fn test_redact() {
        assert_eq!(redact("0123456789abcdef"), "01234567...");
    }
}
