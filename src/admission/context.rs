//! Per-request admission input.

use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Method, Request};

use crate::config::resolve::RuleOverride;
use crate::limiter::key::extract_client_addr;

/// Identity established by an upstream auth layer, inserted as a request
/// extension. Used by the `identity` key strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedIdentity(pub String);

/// Everything the pipeline needs to know about a request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    pub path: String,
    pub client_addr: String,
    pub signature: Option<String>,
    pub timestamp: Option<String>,
    pub nonce: Option<String>,
    pub identity: Option<String>,
    pub rule_override: Option<RuleOverride>,
}

const SIGNATURE_HEADERS: [&str; 2] = ["sign", "x-sign"];
const TIMESTAMP_HEADERS: [&str; 2] = ["timestamp", "x-timestamp"];
const NONCE_HEADERS: [&str; 2] = ["nonce", "x-nonce"];

fn first_header(headers: &HeaderMap, names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| headers.get(*name))
        .filter_map(|v| v.to_str().ok())
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

impl RequestContext {
    pub fn new(method: Method, path: impl Into<String>, client_addr: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            client_addr: client_addr.into(),
            signature: None,
            timestamp: None,
            nonce: None,
            identity: None,
            rule_override: None,
        }
    }

    /// Build the context from an HTTP request. Reads `ConnectInfo`,
    /// `AuthenticatedIdentity` and `RuleOverride` from the extensions.
    pub fn from_request<B>(request: &Request<B>, trust_proxy: bool) -> Self {
        let headers = request.headers();
        let extensions = request.extensions();

        let client_addr = extract_client_addr(
            headers,
            extensions.get::<ConnectInfo<SocketAddr>>(),
            trust_proxy,
        );

        Self {
            method: request.method().clone(),
            path: request.uri().path().to_string(),
            client_addr,
            signature: first_header(headers, &SIGNATURE_HEADERS),
            timestamp: first_header(headers, &TIMESTAMP_HEADERS),
            nonce: first_header(headers, &NONCE_HEADERS),
            identity: extensions
                .get::<AuthenticatedIdentity>()
                .map(|id| id.0.clone()),
            rule_override: extensions.get::<RuleOverride>().cloned(),
        }
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    pub fn with_rule_override(mut self, rule: RuleOverride) -> Self {
        self.rule_override = Some(rule);
        self
    }
}
