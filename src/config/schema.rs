//! Configuration schema definitions.
//!
//! This module defines the complete configuration surface of the gatekeeper.
//! All types derive Serde traits for deserialization from TOML files, and every
//! section falls back to defaults so a minimal file is enough.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatekeeperConfig {
    /// Listener configuration (bind address, request timeout).
    pub listener: ListenerConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Signature verification configuration.
    pub signature: SignatureConfig,

    /// Key material shared by crypto collaborators.
    pub crypto: CryptoConfig,

    /// Shared backend connection.
    pub redis: RedisConfig,

    /// Replay store housekeeping.
    pub housekeeping: HousekeepingConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Counter / replay storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    /// Process-local maps.
    #[default]
    Memory,
    /// Shared Redis instance, degrading to memory when unreachable.
    Redis,
}

/// How the limiting key is derived from a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum KeyStrategy {
    /// `ip:<addr>`
    #[default]
    Ip,
    /// `identity:<id-or-ip>`
    #[serde(alias = "user")]
    Identity,
    /// `endpoint:<method>:<path>:<ip>`
    Endpoint,
    /// Caller-registered generator, `custom:<ip>` without one.
    Custom,
}

impl KeyStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ip => "ip",
            Self::Identity => "identity",
            Self::Endpoint => "endpoint",
            Self::Custom => "custom",
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Default points per window.
    pub points: u32,

    /// Default window length in seconds.
    pub duration_secs: u64,

    /// Default block length in seconds once the quota is exhausted (0 = no block).
    pub block_duration_secs: u64,

    /// Counter backend.
    pub storage: StorageKind,

    /// Message returned with 429 responses.
    pub message: String,

    /// Default key strategy.
    pub key_strategy: KeyStrategy,

    /// Keys or addresses that bypass the limiter.
    /// Entries prefixed with `re:` are regexes, entries containing `*` are wildcards.
    pub whitelist: Vec<String>,

    /// Paths that are never rate limited.
    pub skip_paths: Vec<String>,

    /// Per-path overrides, first match wins.
    pub path_rules: Vec<PathRuleConfig>,

    /// Trust X-Forwarded-For / X-Real-IP for the client address.
    pub trust_proxy: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            points: 100,
            duration_secs: 60,
            block_duration_secs: 0,
            storage: StorageKind::Memory,
            message: "Too many requests, please try again later".to_string(),
            key_strategy: KeyStrategy::Ip,
            whitelist: Vec::new(),
            skip_paths: Vec::new(),
            path_rules: Vec::new(),
            trust_proxy: true,
        }
    }
}

/// A per-path rate limit override. Unset fields inherit the defaults.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct PathRuleConfig {
    /// Exact, prefix, or `*` wildcard path pattern.
    pub pattern: String,
    /// Named preset (`strict`, `moderate`, `relaxed`, `captcha`) the fields
    /// below refine.
    pub preset: Option<String>,
    pub points: Option<u32>,
    pub duration_secs: Option<u64>,
    pub block_duration_secs: Option<u64>,
    pub message: Option<String>,
    pub key_strategy: Option<KeyStrategy>,
}

/// Signature verification mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SignatureMode {
    /// Signature must be one of `valid_signs`.
    #[serde(alias = "simple")]
    AllowList,
    /// Signature must be an envelope whose plaintext carries the marker.
    #[serde(alias = "encrypted")]
    EncryptedEnvelope,
    /// Either of the above.
    #[default]
    #[serde(alias = "both")]
    Either,
    /// Hex HMAC-SHA256 over timestamp, nonce, method and path.
    Hmac,
}

/// Signature verification configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SignatureConfig {
    /// Enable signature verification.
    pub enabled: bool,

    /// Verification mode.
    pub mode: SignatureMode,

    /// Accepted literal signatures.
    pub valid_signs: Vec<String>,

    /// Envelope key. Falls back to `crypto.master_key` when empty.
    pub encryption_key: String,

    /// Substring an opened envelope must contain.
    pub marker: String,

    /// Reject reuse of an accepted signature.
    pub once_only: bool,

    /// How long an accepted signature stays burned, in seconds.
    pub sign_expiration_secs: u64,

    /// Path regexes that skip verification.
    pub whitelist: Vec<String>,

    /// Only paths under this prefix are verified.
    pub path_prefix: String,

    /// Replay store backend.
    pub storage: StorageKind,

    /// Secret for `hmac` mode.
    pub hmac_secret: String,

    /// Accepted clock skew for `hmac` mode, in seconds.
    pub time_window_secs: u64,
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: SignatureMode::Either,
            valid_signs: Vec::new(),
            encryption_key: String::new(),
            marker: "bag".to_string(),
            once_only: false,
            sign_expiration_secs: 3600,
            whitelist: Vec::new(),
            path_prefix: "/api".to_string(),
            storage: StorageKind::Memory,
            hmac_secret: String::new(),
            time_window_secs: 300,
        }
    }
}

/// Key material.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CryptoConfig {
    /// Fallback envelope key.
    pub master_key: String,
}

/// Shared backend connection.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RedisConfig {
    /// Connection URL.
    pub url: String,

    /// Key prefix for counters and replay records.
    pub key_prefix: String,

    /// Upper bound on a single backend call, in milliseconds.
    pub timeout_ms: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: "gatekeeper".to_string(),
            timeout_ms: 250,
        }
    }
}

/// Background housekeeping.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HousekeepingConfig {
    /// Sweep interval in seconds. 0 sweeps at `signature.sign_expiration_secs`.
    pub sweep_interval_secs: u64,
}

impl Default for HousekeepingConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 60,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: placeholder, validation rejects it when the admin API is enabled.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
