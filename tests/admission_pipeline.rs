//! End-to-end admission decisions through the pipeline.

use std::time::Duration;

use axum::http::{Method, StatusCode};

use api_gatekeeper::admission::{AuthenticatedIdentity, RequestContext};
use api_gatekeeper::config::schema::{GatekeeperConfig, KeyStrategy, SignatureMode};
use api_gatekeeper::signature::{AesGcmEnvelope, EnvelopeCipher};
use api_gatekeeper::GatekeeperError;

mod common;
use common::{allow_list_config, config_with_rule, Harness};

fn ctx(path: &str) -> RequestContext {
    RequestContext::new(Method::GET, path, "1.2.3.4")
}

#[tokio::test]
async fn test_block_after_quota_exhausted() {
    let mut config = GatekeeperConfig::default();
    config.rate_limit.points = 2;
    config.rate_limit.duration_secs = 60;
    config.rate_limit.block_duration_secs = 30;
    let harness = Harness::new(config);
    let pipeline = harness.pipeline();

    let first = pipeline.admit(&ctx("/api/orders")).await;
    assert!(first.is_allowed());
    assert_eq!(first.quota().map(|q| q.remaining), Some(1));

    let second = pipeline.admit(&ctx("/api/orders")).await;
    assert!(second.is_allowed());
    assert_eq!(second.quota().map(|q| q.remaining), Some(0));

    let third = pipeline.admit(&ctx("/api/orders")).await;
    let denial = third.denial().unwrap();
    assert_eq!(denial.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(denial.retry_after_secs, Some(30));
    assert_eq!(denial.reason, GatekeeperError::QuotaExceeded { retry_after_secs: 30 });

    harness.clock.advance(Duration::from_secs(29));
    let blocked = pipeline.admit(&ctx("/api/orders")).await;
    assert_eq!(blocked.denial().and_then(|d| d.retry_after_secs), Some(1));

    harness.clock.advance(Duration::from_secs(1));
    let after_block = pipeline.admit(&ctx("/api/orders")).await;
    assert!(after_block.is_allowed());
    assert_eq!(after_block.quota().map(|q| q.remaining), Some(1));
}

#[tokio::test]
async fn test_window_elapses_and_resets() {
    let mut config = GatekeeperConfig::default();
    config.rate_limit.points = 3;
    let harness = Harness::new(config);
    let pipeline = harness.pipeline();

    for _ in 0..3 {
        assert!(pipeline.admit(&ctx("/api/orders")).await.is_allowed());
    }
    harness.clock.advance(Duration::from_secs(10));
    let denied = pipeline.admit(&ctx("/api/orders")).await;
    assert_eq!(denied.denial().and_then(|d| d.retry_after_secs), Some(50));

    harness.clock.advance(Duration::from_secs(50));
    let fresh = pipeline.admit(&ctx("/api/orders")).await;
    assert!(fresh.is_allowed());
    assert_eq!(fresh.quota().map(|q| q.remaining), Some(2));
}

#[tokio::test]
async fn test_path_rule_and_default() {
    let harness = Harness::new(config_with_rule("/api/auth/login", 5));
    let pipeline = harness.pipeline();

    let login = pipeline.admit(&ctx("/api/auth/login")).await;
    assert_eq!(login.quota().map(|q| q.limit), Some(5));

    let other = pipeline.admit(&ctx("/api/other")).await;
    assert_eq!(other.quota().map(|q| q.limit), Some(100));
}

#[tokio::test]
async fn test_whitelisted_key_is_never_denied() {
    let mut config = GatekeeperConfig::default();
    config.rate_limit.points = 1;
    config.rate_limit.whitelist = vec!["10.0.0.*".into(), "identity:svc-batch".into()];
    config.rate_limit.key_strategy = KeyStrategy::Identity;
    let harness = Harness::new(config);
    let pipeline = harness.pipeline();

    let internal = RequestContext::new(Method::GET, "/api/orders", "10.0.0.7");
    let batch = RequestContext::new(Method::GET, "/api/orders", "198.51.100.1")
        .with_identity("svc-batch");
    for _ in 0..50 {
        let decision = pipeline.admit(&internal).await;
        assert!(decision.is_allowed());
        assert!(decision.quota().is_none());
        assert!(pipeline.admit(&batch).await.is_allowed());
    }

    let outsider = RequestContext::new(Method::GET, "/api/orders", "198.51.100.1");
    assert!(pipeline.admit(&outsider).await.is_allowed());
    assert!(!pipeline.admit(&outsider).await.is_allowed());
}

#[tokio::test]
async fn test_skip_paths_bypass_limits() {
    let mut config = GatekeeperConfig::default();
    config.rate_limit.points = 1;
    config.rate_limit.skip_paths = vec!["/health".into()];
    let harness = Harness::new(config);

    for _ in 0..5 {
        let decision = harness.pipeline().admit(&ctx("/health")).await;
        assert!(decision.is_allowed());
        assert!(decision.quota().is_none());
    }
}

#[tokio::test]
async fn test_identity_strategy_separates_users() {
    let mut config = GatekeeperConfig::default();
    config.rate_limit.points = 1;
    config.rate_limit.key_strategy = KeyStrategy::Identity;
    let harness = Harness::new(config);
    let pipeline = harness.pipeline();

    let alice = ctx("/api/orders").with_identity("alice");
    let bob = ctx("/api/orders").with_identity("bob");
    assert!(pipeline.admit(&alice).await.is_allowed());
    assert!(pipeline.admit(&bob).await.is_allowed());
    assert!(!pipeline.admit(&alice).await.is_allowed());
}

#[tokio::test]
async fn test_either_mode_accepts_allow_list_entry() {
    let mut config = allow_list_config(&["abc"], false);
    config.signature.mode = SignatureMode::Either;
    config.signature.encryption_key = "envelope-key".into();
    let harness = Harness::new(config);

    let decision = harness
        .pipeline()
        .admit(&ctx("/api/orders").with_signature("abc"))
        .await;
    assert!(decision.is_allowed());
}

#[tokio::test]
async fn test_either_mode_accepts_envelope_with_marker() {
    let mut config = allow_list_config(&["abc"], false);
    config.signature.mode = SignatureMode::Either;
    config.signature.encryption_key = "envelope-key".into();
    let harness = Harness::new(config);

    let good = AesGcmEnvelope.seal("client-bag-7", "envelope-key").unwrap();
    let no_marker = AesGcmEnvelope.seal("client-7", "envelope-key").unwrap();
    let wrong_key = AesGcmEnvelope.seal("client-bag-7", "other-key").unwrap();

    let pipeline = harness.pipeline();
    assert!(pipeline.admit(&ctx("/api/a").with_signature(&good)).await.is_allowed());
    assert!(!pipeline.admit(&ctx("/api/a").with_signature(&no_marker)).await.is_allowed());
    assert!(!pipeline.admit(&ctx("/api/a").with_signature(&wrong_key)).await.is_allowed());
}

#[tokio::test]
async fn test_one_time_signature_is_replayed() {
    let harness = Harness::new(allow_list_config(&["xyz"], true));
    let pipeline = harness.pipeline();

    let first = pipeline.admit(&ctx("/api/orders").with_signature("xyz")).await;
    assert!(first.is_allowed());

    let second = pipeline.admit(&ctx("/api/orders").with_signature("xyz")).await;
    let denial = second.denial().unwrap();
    assert_eq!(denial.status, StatusCode::UNAUTHORIZED);
    assert_eq!(denial.reason, GatekeeperError::SignatureReplayed);
}

#[tokio::test]
async fn test_replayed_and_invalid_look_the_same() {
    let harness = Harness::new(allow_list_config(&["xyz"], true));
    let pipeline = harness.pipeline();
    pipeline.admit(&ctx("/api/a").with_signature("xyz")).await;

    let replayed = pipeline.admit(&ctx("/api/a").with_signature("xyz")).await;
    let invalid = pipeline.admit(&ctx("/api/a").with_signature("nope")).await;
    let replayed = replayed.denial().unwrap();
    let invalid = invalid.denial().unwrap();

    assert_eq!(replayed.status, invalid.status);
    assert_eq!(replayed.message, invalid.message);
    assert_ne!(replayed.reason, invalid.reason);
}

#[tokio::test]
async fn test_one_time_signature_usable_after_expiry() {
    let mut config = allow_list_config(&["xyz"], true);
    config.signature.sign_expiration_secs = 60;
    let harness = Harness::new(config);
    let pipeline = harness.pipeline();

    assert!(pipeline.admit(&ctx("/api/a").with_signature("xyz")).await.is_allowed());
    harness.clock.advance(Duration::from_secs(60));
    assert!(pipeline.admit(&ctx("/api/a").with_signature("xyz")).await.is_allowed());
}

#[tokio::test]
async fn test_unbounded_expiration_still_burns_signature() {
    let mut config = allow_list_config(&["xyz"], true);
    config.signature.sign_expiration_secs = u64::MAX;
    let harness = Harness::new(config);
    let pipeline = harness.pipeline();

    assert!(pipeline.admit(&ctx("/api/a").with_signature("xyz")).await.is_allowed());
    harness.clock.advance(Duration::from_secs(50 * 365 * 24 * 60 * 60));
    let replayed = pipeline.admit(&ctx("/api/a").with_signature("xyz")).await;
    assert_eq!(
        replayed.denial().map(|d| d.reason.clone()),
        Some(GatekeeperError::SignatureReplayed)
    );

    let stats = pipeline.verifier().replay_store().stats().await.unwrap();
    assert!(stats.records[0].expires_at.starts_with("2123-"));
}

#[tokio::test]
async fn test_rate_limit_runs_before_signature() {
    let mut config = allow_list_config(&["abc"], false);
    config.rate_limit.points = 1;
    let harness = Harness::new(config);
    let pipeline = harness.pipeline();

    assert!(pipeline.admit(&ctx("/api/a").with_signature("abc")).await.is_allowed());
    let denied = pipeline.admit(&ctx("/api/a").with_signature("abc")).await;
    assert_eq!(denied.denial().map(|d| d.status), Some(StatusCode::TOO_MANY_REQUESTS));
}

#[tokio::test]
async fn test_exempt_path_skips_verification() {
    let mut config = allow_list_config(&["abc"], false);
    config.signature.whitelist = vec!["^/api/public/".into()];
    let harness = Harness::new(config);

    let decision = harness.pipeline().admit(&ctx("/api/public/catalog")).await;
    assert!(decision.is_allowed());
    let guarded = harness.pipeline().admit(&ctx("/api/private")).await;
    assert_eq!(guarded.denial().map(|d| d.reason.clone()), Some(GatekeeperError::SignatureMissing));
}

#[tokio::test]
async fn test_manual_sweep_drops_expired_records() {
    let mut config = allow_list_config(&["xyz", "abc"], true);
    config.signature.sign_expiration_secs = 30;
    let harness = Harness::new(config);
    let pipeline = harness.pipeline();

    pipeline.admit(&ctx("/api/a").with_signature("xyz")).await;
    pipeline.admit(&ctx("/api/a").with_signature("abc")).await;
    let stats = pipeline.verifier().replay_store().stats().await.unwrap();
    assert_eq!(stats.total, 2);

    harness.clock.advance(Duration::from_secs(31));
    let report = harness.server.state().housekeeper.run_once().await;
    assert_eq!(report.replay_removed, 2);
    assert_eq!(report.replay_live, 0);
}

#[tokio::test]
async fn test_identity_extension_reaches_context() {
    let mut request = axum::http::Request::builder()
        .uri("/api/orders")
        .body(axum::body::Body::empty())
        .unwrap();
    request
        .extensions_mut()
        .insert(AuthenticatedIdentity("carol".into()));

    let ctx = RequestContext::from_request(&request, true);
    assert_eq!(ctx.identity.as_deref(), Some("carol"));
    assert_eq!(ctx.client_addr, "unknown");
}
