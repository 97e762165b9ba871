//! Request admission layer for HTTP APIs.
//!
//! Every inbound request passes a rate limiter and, on guarded paths, a
//! signature verifier with replay protection, before reaching a handler.
//!
//! ```text
//!   request ─▶ admission::middleware ─▶ AdmissionPipeline::admit
//!                                          │
//!                      ┌───────────────────┼───────────────────┐
//!                      ▼                                       ▼
//!               limiter::RateLimiter                 signature::SignatureVerifier
//!               (memory | redis | fallback)          (allow list | envelope | hmac)
//!                                                              │
//!                                                              ▼
//!                                                   replay::ReplayStore
//! ```

// Core subsystems
pub mod admission;
pub mod limiter;
pub mod replay;
pub mod signature;

// Host binding
pub mod admin;
pub mod backend;
pub mod http;

// Cross-cutting concerns
pub mod clock;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod observability;

pub use admission::{AdmissionPipeline, AdmissionPolicy, Decision, RequestContext};
pub use config::schema::GatekeeperConfig;
pub use error::GatekeeperError;
pub use http::GatekeeperServer;
pub use lifecycle::Shutdown;
