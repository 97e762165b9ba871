//! Layered rate-limit rule resolution.
//!
//! # Data Flow
//! ```text
//! RateLimitConfig defaults
//!     ← matching PathRuleConfig (first declared match)
//!     ← RuleOverride attached by the route (request extension)
//!     → RateLimitRule (immutable, evaluated once per request)
//! ```
//!
//! # Design Decisions
//! - Each layer only overrides the fields it sets
//! - Resolution is a pure function so it can be tested without a store

use std::time::Duration;

use crate::config::schema::{KeyStrategy, PathRuleConfig, RateLimitConfig};
use crate::limiter::rule::RateLimitRule;

/// A partial rule. Unset fields inherit from the layer below.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleOverride {
    pub points: Option<u32>,
    pub duration_secs: Option<u64>,
    pub block_duration_secs: Option<u64>,
    pub message: Option<String>,
    pub key_strategy: Option<KeyStrategy>,
}

impl RuleOverride {
    /// Override taken from a named preset. The key strategy is left to the
    /// layers below.
    pub fn from_rule(rule: &RateLimitRule) -> Self {
        Self {
            points: Some(rule.points),
            duration_secs: Some(rule.duration.as_secs()),
            block_duration_secs: Some(rule.block_duration.as_secs()),
            message: Some(rule.message.clone()),
            key_strategy: None,
        }
    }
}

/// The path rule's preset, if any, with its explicit fields on top.
/// Unknown preset names contribute nothing.
impl From<&PathRuleConfig> for RuleOverride {
    fn from(rule: &PathRuleConfig) -> Self {
        let preset = rule
            .preset
            .as_deref()
            .and_then(RateLimitRule::named_preset)
            .map(|p| Self::from_rule(&p))
            .unwrap_or_default();
        Self {
            points: rule.points.or(preset.points),
            duration_secs: rule.duration_secs.or(preset.duration_secs),
            block_duration_secs: rule.block_duration_secs.or(preset.block_duration_secs),
            message: rule.message.clone().or(preset.message),
            key_strategy: rule.key_strategy.or(preset.key_strategy),
        }
    }
}

/// The rule that applies when no layer overrides anything.
pub fn default_rule(defaults: &RateLimitConfig) -> RateLimitRule {
    RateLimitRule {
        name: "default".to_string(),
        points: defaults.points,
        duration: Duration::from_secs(defaults.duration_secs),
        block_duration: Duration::from_secs(defaults.block_duration_secs),
        message: defaults.message.clone(),
        key_strategy: defaults.key_strategy,
    }
}

/// Apply `layers` in order on top of `base`. Later layers win.
pub fn resolve_rule(base: &RateLimitRule, layers: &[&RuleOverride]) -> RateLimitRule {
    let mut rule = base.clone();
    for layer in layers {
        if let Some(points) = layer.points {
            rule.points = points;
        }
        if let Some(secs) = layer.duration_secs {
            rule.duration = Duration::from_secs(secs);
        }
        if let Some(secs) = layer.block_duration_secs {
            rule.block_duration = Duration::from_secs(secs);
        }
        if let Some(message) = &layer.message {
            rule.message = message.clone();
        }
        if let Some(strategy) = layer.key_strategy {
            rule.key_strategy = strategy;
        }
    }
    rule
}
