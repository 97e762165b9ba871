//! The admission pipeline.
//!
//! # Data Flow
//! ```text
//! RequestContext
//!     → skip path?                         yes → step 4
//!     → resolve rule, derive key
//!     → whitelisted?                       yes → step 4
//!     → RateLimiter::consume               denied → 429 + Retry-After
//!     → (4) signature required for path?   no  → allow
//!     → SignatureVerifier::check           rejected → 401 (generic message)
//!     → allow, with quota metadata
//! ```
//!
//! # Design Decisions
//! - The policy is an immutable snapshot behind `ArcSwap`; a reload swaps it
//!   without locking request handling
//! - Backend errors are logged and the request proceeds
//! - Every signature rejection produces the same caller-visible message

use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::http::StatusCode;

use crate::admission::context::RequestContext;
use crate::admission::decision::{Decision, Denial, QuotaMetadata};
use crate::config::schema::GatekeeperConfig;
use crate::error::GatekeeperError;
use crate::limiter::{derive_key, BucketSnapshot, KeyGenerator, RateLimiter, RuleSet, StoreError, Whitelist};
use crate::observability::metrics;
use crate::signature::verifier::{redact, SignatureRejection, SignatureVerifier, VerificationConfig};

/// Message returned for every signature rejection.
pub const SIGNATURE_REJECTED_MESSAGE: &str = "Invalid or missing request signature";

/// Everything compiled from one configuration.
#[derive(Debug, Clone)]
pub struct AdmissionPolicy {
    pub rate_limit_enabled: bool,
    pub rules: RuleSet,
    pub whitelist: Whitelist,
    /// `None` when verification is disabled or cannot work.
    pub signature: Option<VerificationConfig>,
    pub trust_proxy: bool,
    /// Problems found while compiling. The policy is still usable.
    pub config_errors: Vec<GatekeeperError>,
}

impl AdmissionPolicy {
    pub fn from_config(config: &GatekeeperConfig) -> Self {
        let mut config_errors = Vec::new();

        let signature = if config.signature.enabled {
            let verification = VerificationConfig::from_config(&config.signature, &config.crypto);
            match verification.unusable_reason() {
                None => Some(verification),
                Some(reason) => {
                    let err = GatekeeperError::Configuration(reason.to_string());
                    tracing::error!(
                        error = %err,
                        "Signature verification disabled until the configuration is fixed"
                    );
                    config_errors.push(err);
                    None
                }
            }
        } else {
            None
        };

        Self {
            rate_limit_enabled: config.rate_limit.enabled,
            rules: RuleSet::from_config(&config.rate_limit),
            whitelist: Whitelist::new(&config.rate_limit.whitelist),
            signature,
            trust_proxy: config.rate_limit.trust_proxy,
            config_errors,
        }
    }
}

pub struct AdmissionPipeline {
    policy: ArcSwap<AdmissionPolicy>,
    limiter: RateLimiter,
    verifier: SignatureVerifier,
    key_generator: Option<KeyGenerator>,
}

impl AdmissionPipeline {
    pub fn new(policy: AdmissionPolicy, limiter: RateLimiter, verifier: SignatureVerifier) -> Self {
        Self {
            policy: ArcSwap::from_pointee(policy),
            limiter,
            verifier,
            key_generator: None,
        }
    }

    /// Register the generator used by the `custom` key strategy.
    pub fn with_key_generator(mut self, generator: KeyGenerator) -> Self {
        self.key_generator = Some(generator);
        self
    }

    pub fn policy(&self) -> Arc<AdmissionPolicy> {
        self.policy.load_full()
    }

    pub fn update_policy(&self, policy: AdmissionPolicy) {
        self.policy.store(Arc::new(policy));
        tracing::info!("Admission policy updated");
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn verifier(&self) -> &SignatureVerifier {
        &self.verifier
    }

    /// Decide whether a request may proceed.
    pub async fn admit(&self, ctx: &RequestContext) -> Decision {
        let policy = self.policy.load_full();
        let mut quota = None;

        if policy.rate_limit_enabled && !policy.rules.is_skipped(&ctx.path) {
            match self.rate_limit(&policy, ctx).await {
                Ok(meta) => quota = meta,
                Err(denial) => {
                    metrics::record_decision("rate_limited");
                    return Decision::Deny(denial);
                }
            }
        }

        if let Some(verification) = policy.signature.as_ref() {
            if verification.applies_to(&ctx.path) {
                let outcome = match ctx.signature.as_deref() {
                    Some(signature) => self.verifier.check(signature, ctx, verification).await,
                    None => Err(SignatureRejection::Missing),
                };

                if let Err(rejection) = outcome {
                    let reason = GatekeeperError::from(rejection);
                    tracing::warn!(
                        reason = reason.reason(),
                        method = %ctx.method,
                        path = %ctx.path,
                        client = %ctx.client_addr,
                        signature = %ctx.signature.as_deref().map(redact).unwrap_or_default(),
                        "Signature rejected"
                    );
                    metrics::record_signature_rejection(reason.reason());
                    metrics::record_decision("signature_rejected");
                    return Decision::Deny(Denial {
                        status: StatusCode::UNAUTHORIZED,
                        message: SIGNATURE_REJECTED_MESSAGE.to_string(),
                        retry_after_secs: None,
                        quota,
                        reason,
                    });
                }
            }
        }

        tracing::debug!(
            method = %ctx.method,
            path = %ctx.path,
            client = %ctx.client_addr,
            remaining = quota.as_ref().map(|q| q.remaining),
            "Request admitted"
        );
        metrics::record_decision("allowed");
        Decision::Allow { quota }
    }

    /// `Ok(None)`: not counted (whitelisted or backend down).
    async fn rate_limit(
        &self,
        policy: &AdmissionPolicy,
        ctx: &RequestContext,
    ) -> Result<Option<QuotaMetadata>, Denial> {
        let rule = policy.rules.resolve_with(&ctx.path, ctx.rule_override.as_ref());
        let key = derive_key(ctx, rule.key_strategy, self.key_generator.as_ref());

        if policy.whitelist.matches(&key, &ctx.client_addr) {
            tracing::debug!(key = %key, "Whitelisted, skipping rate limit");
            return Ok(None);
        }

        let result = match self.limiter.consume(&key, &rule).await {
            Ok(result) => result,
            Err(e) => {
                let err = GatekeeperError::from(e);
                tracing::warn!(
                    reason = err.reason(),
                    error = %err,
                    key = %key,
                    "Rate limiter unavailable, allowing request"
                );
                return Ok(None);
            }
        };

        let meta = QuotaMetadata::from(&result);
        if result.allowed {
            return Ok(Some(meta));
        }

        tracing::info!(
            key = %key,
            rule = %rule.name,
            retry_after_secs = result.retry_after_secs,
            "Rate limit exceeded"
        );
        metrics::record_rate_limited(&rule.name);
        Err(Denial {
            status: StatusCode::TOO_MANY_REQUESTS,
            message: rule.message.clone(),
            retry_after_secs: Some(result.retry_after_secs),
            quota: Some(meta),
            reason: GatekeeperError::QuotaExceeded {
                retry_after_secs: result.retry_after_secs,
            },
        })
    }

    /// Bucket state for `key` under the rule that applies to `path`
    /// (the default rule when no path is given).
    pub async fn inspect_key(
        &self,
        key: &str,
        path: Option<&str>,
    ) -> Result<Option<BucketSnapshot>, StoreError> {
        let policy = self.policy.load_full();
        let rule = match path {
            Some(path) => policy.rules.resolve_rule(path),
            None => policy.rules.default_rule(),
        };
        self.limiter.inspect(key, rule).await
    }

    /// Reset `key` under every configured rule.
    pub async fn reset_key(&self, key: &str) -> Result<(), StoreError> {
        let policy = self.policy.load_full();
        self.limiter.reset(key, policy.rules.all_rules()).await?;
        tracing::info!(key = %key, "Rate limit key reset");
        Ok(())
    }
}
