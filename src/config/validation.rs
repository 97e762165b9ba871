//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (points > 0, windows within 0..=10 years, addresses parse)
//! - Reject unknown rate-limit preset names
//! - Refuse the placeholder admin key when the admin API is enabled
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatekeeperConfig → Result<(), Vec<ValidationError>>
//! - Patterns are not validated here: an invalid regex degrades to exact
//!   matching when the policy is compiled, so a typo never blocks all traffic

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::GatekeeperConfig;
use crate::limiter::rule::RateLimitRule;

/// Upper bound for every window, block and expiry: ten years.
pub const MAX_DURATION_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

fn check_max_duration(errors: &mut Vec<ValidationError>, field: String, secs: Option<u64>) {
    if let Some(secs) = secs.filter(|s| *s > MAX_DURATION_SECS) {
        errors.push(ValidationError::new(
            field,
            format!("{secs} exceeds the maximum of {MAX_DURATION_SECS} seconds"),
        ));
    }
}

/// Validate a configuration, collecting every error.
pub fn validate_config(config: &GatekeeperConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    let rl = &config.rate_limit;
    if rl.points == 0 {
        errors.push(ValidationError::new("rate_limit.points", "must be greater than 0"));
    }
    if rl.duration_secs == 0 {
        errors.push(ValidationError::new(
            "rate_limit.duration_secs",
            "must be greater than 0",
        ));
    }
    check_max_duration(&mut errors, "rate_limit.duration_secs".into(), Some(rl.duration_secs));
    check_max_duration(
        &mut errors,
        "rate_limit.block_duration_secs".into(),
        Some(rl.block_duration_secs),
    );

    for (i, rule) in rl.path_rules.iter().enumerate() {
        if rule.pattern.is_empty() {
            errors.push(ValidationError::new(
                format!("rate_limit.path_rules[{i}].pattern"),
                "must not be empty",
            ));
        }
        if rule.points == Some(0) {
            errors.push(ValidationError::new(
                format!("rate_limit.path_rules[{i}].points"),
                "must be greater than 0",
            ));
        }
        if rule.duration_secs == Some(0) {
            errors.push(ValidationError::new(
                format!("rate_limit.path_rules[{i}].duration_secs"),
                "must be greater than 0",
            ));
        }
        check_max_duration(
            &mut errors,
            format!("rate_limit.path_rules[{i}].duration_secs"),
            rule.duration_secs,
        );
        check_max_duration(
            &mut errors,
            format!("rate_limit.path_rules[{i}].block_duration_secs"),
            rule.block_duration_secs,
        );
        if let Some(name) = rule.preset.as_deref() {
            if RateLimitRule::named_preset(name).is_none() {
                errors.push(ValidationError::new(
                    format!("rate_limit.path_rules[{i}].preset"),
                    format!("unknown preset '{name}'"),
                ));
            }
        }
    }

    if config.signature.once_only && config.signature.sign_expiration_secs == 0 {
        errors.push(ValidationError::new(
            "signature.sign_expiration_secs",
            "must be greater than 0 when once_only is set",
        ));
    }
    check_max_duration(
        &mut errors,
        "signature.sign_expiration_secs".into(),
        Some(config.signature.sign_expiration_secs),
    );
    check_max_duration(
        &mut errors,
        "signature.time_window_secs".into(),
        Some(config.signature.time_window_secs),
    );
    check_max_duration(
        &mut errors,
        "housekeeping.sweep_interval_secs".into(),
        Some(config.housekeeping.sweep_interval_secs),
    );

    if config.redis.timeout_ms == 0 {
        errors.push(ValidationError::new("redis.timeout_ms", "must be greater than 0"));
    }

    if config.admin.enabled {
        if config.admin.api_key.is_empty() || config.admin.api_key == "CHANGE_ME_IN_PRODUCTION" {
            errors.push(ValidationError::new(
                "admin.api_key",
                "must be set when the admin API is enabled",
            ));
        }
        if config.admin.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new(
                "admin.bind_address",
                format!("'{}' is not a socket address", config.admin.bind_address),
            ));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
