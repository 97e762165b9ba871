//! Rate limit rules and path-scoped rule resolution.
//!
//! # Responsibilities
//! - Define the effective rule applied to a request
//! - Compile path patterns (exact, prefix, `*` wildcard)
//! - Resolve the rule for a path, first declared match wins
//! - Exempt skip paths before any rule applies
//!
//! # Design Decisions
//! - `*` expands to `.*` with the whole pattern anchored at both ends
//! - A wildcard that does not compile degrades to exact comparison and is
//!   logged once at compile time
//! - Skip paths beat every rule regardless of specificity

use std::time::Duration;

use regex::Regex;

use crate::config::resolve::{default_rule, resolve_rule, RuleOverride};
use crate::config::schema::{KeyStrategy, RateLimitConfig};

/// The effective limit applied to one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitRule {
    /// Label used in logs and metrics (pattern or preset name).
    pub name: String,
    pub points: u32,
    pub duration: Duration,
    pub block_duration: Duration,
    pub message: String,
    pub key_strategy: KeyStrategy,
}

impl RateLimitRule {
    fn preset(name: &str, points: u32, duration_secs: u64, block_secs: u64, message: &str) -> Self {
        Self {
            name: name.to_string(),
            points,
            duration: Duration::from_secs(duration_secs),
            block_duration: Duration::from_secs(block_secs),
            message: message.to_string(),
            key_strategy: KeyStrategy::Ip,
        }
    }

    /// Login, registration and other credential endpoints.
    pub fn strict() -> Self {
        Self::preset(
            "strict",
            5,
            900,
            1800,
            "Too many attempts, please try again later",
        )
    }

    /// General API traffic.
    pub fn moderate() -> Self {
        Self::preset("moderate", 50, 60, 0, "Too many requests, please try again later")
    }

    /// Read-heavy public endpoints.
    pub fn relaxed() -> Self {
        Self::preset("relaxed", 200, 60, 0, "Too many requests, please try again later")
    }

    /// Captcha issuance.
    pub fn captcha() -> Self {
        Self::preset("captcha", 10, 60, 0, "Captcha requested too often, please wait")
    }

    /// Look up a preset by name.
    pub fn named_preset(name: &str) -> Option<Self> {
        match name {
            "strict" => Some(Self::strict()),
            "moderate" => Some(Self::moderate()),
            "relaxed" => Some(Self::relaxed()),
            "captcha" => Some(Self::captcha()),
            _ => None,
        }
    }
}

/// `*` becomes `.*`, anchored at both ends. The rest is taken as regex syntax.
pub(crate) fn wildcard_regex(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("^{}$", pattern.replace('*', ".*")))
}

/// A compiled path pattern.
#[derive(Debug, Clone)]
pub enum PathPattern {
    /// Matches the pattern itself and everything below it.
    Prefix(String),
    /// `*` wildcard, anchored.
    Wildcard(Regex),
    /// Wildcard that failed to compile, compared literally.
    Exact(String),
}

impl PathPattern {
    pub fn compile(pattern: &str) -> Self {
        if !pattern.contains('*') {
            return Self::Prefix(pattern.to_string());
        }

        match wildcard_regex(pattern) {
            Ok(re) => Self::Wildcard(re),
            Err(e) => {
                tracing::error!(
                    pattern = %pattern,
                    error = %e,
                    "Invalid path pattern, falling back to exact match"
                );
                Self::Exact(pattern.to_string())
            }
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Prefix(prefix) => path.starts_with(prefix.as_str()),
            Self::Wildcard(re) => re.is_match(path),
            Self::Exact(literal) => path == literal,
        }
    }
}

#[derive(Debug, Clone)]
struct PathRule {
    pattern: PathPattern,
    layer: RuleOverride,
    rule: RateLimitRule,
}

/// Ordered path rules plus the default and skip list.
#[derive(Debug, Clone)]
pub struct RuleSet {
    default: RateLimitRule,
    rules: Vec<PathRule>,
    skip_paths: Vec<PathPattern>,
}

impl RuleSet {
    pub fn from_config(config: &RateLimitConfig) -> Self {
        let default = default_rule(config);

        let rules = config
            .path_rules
            .iter()
            .map(|cfg| {
                let layer = RuleOverride::from(cfg);
                let mut rule = resolve_rule(&default, &[&layer]);
                rule.name = cfg.pattern.clone();
                PathRule {
                    pattern: PathPattern::compile(&cfg.pattern),
                    layer,
                    rule,
                }
            })
            .collect();

        let skip_paths = config
            .skip_paths
            .iter()
            .map(|p| PathPattern::compile(p))
            .collect();

        Self {
            default,
            rules,
            skip_paths,
        }
    }

    pub fn default_rule(&self) -> &RateLimitRule {
        &self.default
    }

    /// The default rule followed by every path rule, in declaration order.
    pub fn all_rules(&self) -> impl Iterator<Item = &RateLimitRule> {
        std::iter::once(&self.default).chain(self.rules.iter().map(|r| &r.rule))
    }

    /// Whether the path bypasses rate limiting entirely.
    pub fn is_skipped(&self, path: &str) -> bool {
        self.skip_paths.iter().any(|p| p.matches(path))
    }

    /// The rule for `path`: first matching path rule, else the default.
    pub fn resolve_rule(&self, path: &str) -> &RateLimitRule {
        self.rules
            .iter()
            .find(|r| r.pattern.matches(path))
            .map(|r| &r.rule)
            .unwrap_or(&self.default)
    }

    /// Like [`resolve_rule`](Self::resolve_rule), with a route-level override on top.
    pub fn resolve_with(&self, path: &str, route: Option<&RuleOverride>) -> RateLimitRule {
        let Some(route) = route else {
            return self.resolve_rule(path).clone();
        };

        let matched = self.rules.iter().find(|r| r.pattern.matches(path));
        let mut layers: Vec<&RuleOverride> = Vec::with_capacity(2);
        if let Some(m) = matched {
            layers.push(&m.layer);
        }
        layers.push(route);

        let mut rule = resolve_rule(&self.default, &layers);
        rule.name = matched.map_or("route", |m| m.rule.name.as_str()).to_string();
        rule
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::PathRuleConfig;

    fn config_with(rules: &[(&str, u32)]) -> RateLimitConfig {
        RateLimitConfig {
            path_rules: rules
                .iter()
                .map(|(pattern, points)| PathRuleConfig {
                    pattern: pattern.to_string(),
                    points: Some(*points),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_specific_rule_and_default() {
        let set = RuleSet::from_config(&config_with(&[("/api/auth/login", 5)]));
        assert_eq!(set.resolve_rule("/api/auth/login").points, 5);
        assert_eq!(set.resolve_rule("/api/other").points, 100);
        assert_eq!(set.resolve_rule("/api/other").name, "default");
    }

    #[test]
    fn test_prefix_match() {
        let set = RuleSet::from_config(&config_with(&[("/api/auth", 5)]));
        assert_eq!(set.resolve_rule("/api/auth/register").points, 5);
        assert_eq!(set.resolve_rule("/api").points, 100);
    }

    #[test]
    fn test_wildcard_is_anchored() {
        let set = RuleSet::from_config(&config_with(&[("/api/*/login", 7)]));
        assert_eq!(set.resolve_rule("/api/v1/login").points, 7);
        assert_eq!(set.resolve_rule("/api/v1/login/extra").points, 100);
        assert_eq!(set.resolve_rule("/x/api/v1/login").points, 100);
    }

    #[test]
    fn test_first_declared_match_wins() {
        let set = RuleSet::from_config(&config_with(&[("/api/*", 50), ("/api/auth/login", 5)]));
        assert_eq!(set.resolve_rule("/api/auth/login").points, 50);
        assert_eq!(set.resolve_rule("/api/auth/login").name, "/api/*");
    }

    #[test]
    fn test_invalid_wildcard_falls_back_to_exact() {
        let pattern = PathPattern::compile("/api/(*");
        assert!(matches!(pattern, PathPattern::Exact(_)));
        assert!(pattern.matches("/api/(*"));
        assert!(!pattern.matches("/api/(anything"));
    }

    #[test]
    fn test_skip_path_beats_rule() {
        let mut config = config_with(&[("/health", 1)]);
        config.skip_paths = vec!["/health".into()];
        let set = RuleSet::from_config(&config);
        assert!(set.is_skipped("/health"));
        assert!(set.is_skipped("/health/live"));
        assert!(!set.is_skipped("/api"));
    }

    #[test]
    fn test_route_override_layers_on_path_rule() {
        let mut config = config_with(&[("/api/auth", 5)]);
        config.path_rules[0].duration_secs = Some(900);
        let set = RuleSet::from_config(&config);

        let route = RuleOverride {
            points: Some(2),
            ..Default::default()
        };
        let rule = set.resolve_with("/api/auth/login", Some(&route));
        assert_eq!(rule.points, 2);
        assert_eq!(rule.duration, Duration::from_secs(900));
        assert_eq!(rule.name, "/api/auth");

        let rule = set.resolve_with("/other", Some(&route));
        assert_eq!(rule.points, 2);
        assert_eq!(rule.duration, Duration::from_secs(60));
    }

    #[test]
    fn test_presets() {
        let strict = RateLimitRule::strict();
        assert_eq!(strict.points, 5);
        assert_eq!(strict.duration, Duration::from_secs(900));
        assert_eq!(strict.block_duration, Duration::from_secs(1800));
        assert_eq!(RateLimitRule::named_preset("captcha").map(|r| r.points), Some(10));
        assert!(RateLimitRule::named_preset("unknown").is_none());
    }

    #[test]
    fn test_preset_named_in_toml() {
        let config: crate::config::schema::GatekeeperConfig = toml::from_str(
            r#"
            [[rate_limit.path_rules]]
            pattern = "/api/auth/login"
            preset = "strict"
            "#,
        )
        .unwrap();
        let set = RuleSet::from_config(&config.rate_limit);

        let rule = set.resolve_rule("/api/auth/login");
        assert_eq!(rule.name, "/api/auth/login");
        assert_eq!(rule.points, 5);
        assert_eq!(rule.duration, Duration::from_secs(900));
        assert_eq!(rule.block_duration, Duration::from_secs(1800));
        assert_eq!(set.resolve_rule("/api/other").points, 100);

        let route = RuleOverride {
            points: Some(2),
            ..Default::default()
        };
        let layered = set.resolve_with("/api/auth/login", Some(&route));
        assert_eq!(layered.points, 2);
        assert_eq!(layered.block_duration, Duration::from_secs(1800));
    }
}
