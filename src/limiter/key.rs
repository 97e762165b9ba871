//! Limiting key derivation and client address extraction.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::http::HeaderMap;

use crate::admission::context::RequestContext;
use crate::config::schema::KeyStrategy;

/// Caller-supplied key builder for [`KeyStrategy::Custom`].
pub type KeyGenerator = Arc<dyn Fn(&RequestContext) -> String + Send + Sync>;

/// Build the limiting key for a request.
pub fn derive_key(
    ctx: &RequestContext,
    strategy: KeyStrategy,
    generator: Option<&KeyGenerator>,
) -> String {
    let addr = ctx.client_addr.as_str();
    match strategy {
        KeyStrategy::Ip => format!("ip:{addr}"),
        KeyStrategy::Identity => match ctx.identity.as_deref() {
            Some(id) if !id.is_empty() => format!("identity:{id}"),
            _ => format!("identity:{addr}"),
        },
        KeyStrategy::Endpoint => format!("endpoint:{}:{}:{}", ctx.method, ctx.path, addr),
        KeyStrategy::Custom => match generator {
            Some(generate) => generate(ctx),
            None => format!("custom:{addr}"),
        },
    }
}

/// Extract the client address.
///
/// When `trust_proxy` is true, the first X-Forwarded-For entry wins, then
/// X-Real-IP. Header values that are not IP addresses are ignored. Falls
/// back to the socket peer, then `"unknown"`.
pub fn extract_client_addr(
    headers: &HeaderMap,
    connect_info: Option<&ConnectInfo<SocketAddr>>,
    trust_proxy: bool,
) -> String {
    if trust_proxy {
        let forwarded = headers
            .get("X-Forwarded-For")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|first| first.trim().parse::<IpAddr>().ok());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }

        let real_ip = headers
            .get("X-Real-IP")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<IpAddr>().ok());
        if let Some(ip) = real_ip {
            return ip.to_string();
        }
    }

    connect_info
        .map(|c| c.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
