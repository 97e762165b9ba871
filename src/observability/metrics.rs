//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gatekeeper_requests_total` (counter): admission decisions by outcome
//! - `gatekeeper_rate_limited_total` (counter): quota denials by rule
//! - `gatekeeper_signature_rejections_total` (counter): by internal reason
//! - `gatekeeper_backend_fallbacks_total` (counter): shared backend failures
//! - `gatekeeper_replay_records` (gauge): live one-time signature records
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, so tests need no setup
//! - Labels stay low-cardinality: never keys, addresses or signatures

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_decision(outcome: &'static str) {
    counter!("gatekeeper_requests_total", "outcome" => outcome).increment(1);
}

pub fn record_rate_limited(rule: &str) {
    counter!("gatekeeper_rate_limited_total", "rule" => rule.to_string()).increment(1);
}

pub fn record_signature_rejection(reason: &'static str) {
    counter!("gatekeeper_signature_rejections_total", "reason" => reason).increment(1);
}

pub fn record_backend_fallback(backend: &'static str) {
    counter!("gatekeeper_backend_fallbacks_total", "backend" => backend).increment(1);
}

pub fn set_replay_records(count: usize) {
    gauge!("gatekeeper_replay_records").set(count as f64);
}
