//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatekeeperConfig (validated, immutable)
//!     → compiled into an AdmissionPolicy snapshot
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → atomic swap of the AdmissionPolicy
//!
//! Per request:
//!     resolve.rs merges defaults ← path rule ← route override
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod resolve;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use resolve::RuleOverride;
pub use schema::{
    GatekeeperConfig, KeyStrategy, PathRuleConfig, RateLimitConfig, SignatureConfig,
    SignatureMode, StorageKind,
};
