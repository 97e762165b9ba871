//! HTTP binding of the gatekeeper.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, trace + timeout layers)
//!     → request.rs (request ID)
//!     → admission middleware (allow / 429 / 401)
//!     → downstream.rs (placeholder handler)
//! ```

pub mod downstream;
pub mod request;
pub mod server;

pub use request::{request_id_layer, RequestIdExt, X_REQUEST_ID};
pub use server::{build_router, AppState, GatekeeperServer, Stores};
