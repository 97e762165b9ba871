//! No double admission under concurrent load.

use std::sync::Arc;

use axum::http::Method;
use tokio::task::JoinSet;

use api_gatekeeper::admission::RequestContext;
use api_gatekeeper::clock::{Clock, ManualClock};
use api_gatekeeper::config::schema::GatekeeperConfig;
use api_gatekeeper::limiter::{MemoryCounterStore, RateLimitRule, RateLimiter};

mod common;
use common::{allow_list_config, Harness, START_SECS};

const TASKS: usize = 64;

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_single_point_admits_exactly_one() {
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::at_unix_secs(START_SECS));
    let limiter = RateLimiter::new(Arc::new(MemoryCounterStore::new()), clock);
    let rule = RateLimitRule {
        points: 1,
        ..RateLimitRule::moderate()
    };

    let mut set = JoinSet::new();
    for _ in 0..TASKS {
        let limiter = limiter.clone();
        let rule = rule.clone();
        set.spawn(async move { limiter.consume("ip:203.0.113.9", &rule).await.unwrap().allowed });
    }

    let mut admitted = 0;
    while let Some(result) = set.join_next().await {
        if result.unwrap() {
            admitted += 1;
        }
    }
    assert_eq!(admitted, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_pipeline_quota_holds_under_load() {
    let mut config = GatekeeperConfig::default();
    config.rate_limit.points = 10;
    let harness = Harness::new(config);
    let pipeline = harness.pipeline().clone();

    let mut set = JoinSet::new();
    for _ in 0..TASKS {
        let pipeline = pipeline.clone();
        set.spawn(async move {
            let ctx = RequestContext::new(Method::GET, "/api/orders", "203.0.113.9");
            pipeline.admit(&ctx).await.is_allowed()
        });
    }

    let mut admitted = 0;
    while let Some(result) = set.join_next().await {
        if result.unwrap() {
            admitted += 1;
        }
    }
    assert_eq!(admitted, 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_one_time_signature_accepted_once() {
    let harness = Harness::new(allow_list_config(&["xyz"], true));
    let pipeline = harness.pipeline().clone();

    let mut set = JoinSet::new();
    for i in 0..TASKS {
        let pipeline = pipeline.clone();
        set.spawn(async move {
            let ctx = RequestContext::new(Method::POST, "/api/orders", format!("198.51.100.{i}"))
                .with_signature("xyz");
            pipeline.admit(&ctx).await.is_allowed()
        });
    }

    let mut admitted = 0;
    while let Some(result) = set.join_next().await {
        if result.unwrap() {
            admitted += 1;
        }
    }
    assert_eq!(admitted, 1);
}
