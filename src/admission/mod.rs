//! Admission subsystem: the per-request allow/deny decision.
//!
//! # Data Flow
//! ```text
//! HTTP request
//!     → middleware.rs (RequestContext from headers + extensions)
//!     → pipeline.rs (rate limiter, then signature verifier)
//!     → decision.rs (Allow + quota | Deny + reason)
//!     → middleware.rs (forward with X-RateLimit-* headers, or JSON denial)
//! ```

pub mod context;
pub mod decision;
pub mod middleware;
pub mod pipeline;

pub use context::{AuthenticatedIdentity, RequestContext};
pub use decision::{Decision, Denial, QuotaMetadata};
pub use middleware::admission_middleware;
pub use pipeline::{AdmissionPipeline, AdmissionPolicy, SIGNATURE_REJECTED_MESSAGE};
