//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Build stores + pipeline → Start listeners
//!     → Spawn housekeeper
//!
//! Housekeeping (housekeeping.rs):
//!     every interval → sweep replay records + expired buckets
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     SIGTERM/SIGINT → broadcast → servers drain, housekeeper exits
//! ```
//!
//! # Design Decisions
//! - Background work is an explicit task with a start and a stop, never a
//!   detached timer
//! - Tests call `Housekeeper::run_once` instead of waiting on the clock

pub mod housekeeping;
pub mod shutdown;
pub mod signals;

pub use housekeeping::{sweep_interval, Housekeeper, SweepReport};
pub use shutdown::Shutdown;
