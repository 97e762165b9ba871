//! Replay protection for one-time signatures.
//!
//! # Data Flow
//! ```text
//! per token:  absent → used(ttl) → absent
//!                         │
//!                         ├─ expiry noticed on lookup (is_used / check_and_mark)
//!                         └─ periodic sweep (lifecycle::housekeeping)
//! ```
//!
//! # Design Decisions
//! - The accept path uses `check_and_mark`, a single upsert-if-absent, so two
//!   concurrent requests carrying the same token cannot both win
//! - Backends: in-process `DashMap`, Redis `SET NX PX`, or Redis with a local
//!   fallback when unreachable

pub mod fallback;
pub mod memory;
pub mod redis;
pub mod store;

pub use fallback::FallbackReplayStore;
pub use memory::MemoryReplayStore;
pub use redis::RedisReplayStore;
pub use store::{RecordSummary, ReplayError, ReplayStats, ReplayStore, SignatureRecord};
