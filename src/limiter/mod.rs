//! Rate limiting subsystem.
//!
//! # Data Flow
//! ```text
//! request path
//!     → rule.rs (skip paths, first matching path rule, default)
//!     → key.rs (ip / identity / endpoint / custom key)
//!     → whitelist.rs (bypass: no bucket, no headers)
//!     → service.rs (consume one point)
//!     → store.rs backend:
//!           memory.rs   (DashMap, per-key entry lock)
//!           redis.rs    (Lua script, shared across instances)
//!           fallback.rs (redis first, memory when unreachable)
//! ```
//!
//! # Design Decisions
//! - Fixed window per bucket, optional block once exhausted
//! - Exceeded quota fails closed; backend errors fail open at the pipeline
//! - Stores are injected, never global

pub mod fallback;
pub mod key;
pub mod memory;
pub mod redis;
pub mod rule;
pub mod service;
pub mod store;
pub mod whitelist;

pub use key::{derive_key, extract_client_addr, KeyGenerator};
pub use memory::MemoryCounterStore;
pub use rule::{PathPattern, RateLimitRule, RuleSet};
pub use service::{RateLimitResult, RateLimiter};
pub use store::{BucketSnapshot, ConsumeOutcome, CounterStore, StoreError};
pub use whitelist::Whitelist;
