//! Shared builders for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Method, Request};
use axum::response::Response;
use tower::ServiceExt;

use api_gatekeeper::clock::{Clock, ManualClock};
use api_gatekeeper::config::schema::{GatekeeperConfig, PathRuleConfig, SignatureMode};
use api_gatekeeper::http::{GatekeeperServer, Stores};
use api_gatekeeper::AdmissionPipeline;

pub const START_SECS: u64 = 1_700_000_000;

/// A server over fresh in-memory stores and a controllable clock.
pub struct Harness {
    pub server: GatekeeperServer,
    pub clock: ManualClock,
}

impl Harness {
    pub fn new(config: GatekeeperConfig) -> Self {
        let clock = ManualClock::at_unix_secs(START_SECS);
        let shared: Arc<dyn Clock> = Arc::new(clock.clone());
        let server = GatekeeperServer::with_stores(config, Stores::memory(shared.clone()), shared);
        Self { server, clock }
    }

    pub fn pipeline(&self) -> &Arc<AdmissionPipeline> {
        &self.server.state().pipeline
    }

    /// Send one request through the full router.
    pub async fn send(&self, request: Request<Body>) -> Response {
        self.server.router().oneshot(request).await.unwrap()
    }
}

pub fn config_with_rule(pattern: &str, points: u32) -> GatekeeperConfig {
    let mut config = GatekeeperConfig::default();
    config.rate_limit.path_rules.push(PathRuleConfig {
        pattern: pattern.to_string(),
        points: Some(points),
        ..Default::default()
    });
    config
}

pub fn allow_list_config(signs: &[&str], once_only: bool) -> GatekeeperConfig {
    let mut config = GatekeeperConfig::default();
    config.signature.enabled = true;
    config.signature.mode = SignatureMode::AllowList;
    config.signature.valid_signs = signs.iter().map(|s| s.to_string()).collect();
    config.signature.once_only = once_only;
    config
}

/// A request as it arrives from a socket at `peer`.
pub fn request_from(method: Method, path: &str, peer: &str) -> Request<Body> {
    let mut request = Request::builder()
        .method(method)
        .uri(path)
        .body(Body::empty())
        .unwrap();
    request
        .extensions_mut()
        .insert(ConnectInfo(peer.parse::<std::net::SocketAddr>().unwrap()));
    request
}

pub async fn json_body(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
