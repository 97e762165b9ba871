//! Rate limiter whitelist.
//!
//! Entries are compared against both the full limiting key and the bare
//! client address, so `10.0.0.*` and `identity:service-account` both work.
//! Entry syntax:
//! - `re:<regex>` is a regex, unanchored
//! - anything containing `*` is an anchored wildcard
//! - everything else is an exact match

use regex::Regex;

use crate::limiter::rule::wildcard_regex;

#[derive(Debug, Clone)]
enum Entry {
    Exact(String),
    Pattern(Regex),
}

impl Entry {
    fn matches(&self, candidate: &str) -> bool {
        match self {
            Self::Exact(value) => candidate == value,
            Self::Pattern(re) => re.is_match(candidate),
        }
    }
}

/// Compiled whitelist. Matching keys bypass the limiter entirely.
#[derive(Debug, Clone, Default)]
pub struct Whitelist {
    entries: Vec<Entry>,
}

impl Whitelist {
    pub fn new(entries: &[String]) -> Self {
        let entries = entries.iter().map(|raw| compile_entry(raw)).collect();
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `key` or `client_addr` is whitelisted.
    pub fn matches(&self, key: &str, client_addr: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.matches(key) || e.matches(client_addr))
    }
}

fn compile_entry(raw: &str) -> Entry {
    let compiled = if let Some(expr) = raw.strip_prefix("re:") {
        Regex::new(expr)
    } else if raw.contains('*') {
        wildcard_regex(raw)
    } else {
        return Entry::Exact(raw.to_string());
    };

    match compiled {
        Ok(re) => Entry::Pattern(re),
        Err(e) => {
            tracing::error!(
                entry = %raw,
                error = %e,
                "Invalid whitelist pattern, falling back to exact match"
            );
            Entry::Exact(raw.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(entries: &[&str]) -> Whitelist {
        Whitelist::new(&entries.iter().map(|s| s.to_string()).collect::<Vec<_>>())
    }

    #[test]
    fn test_exact_address() {
        let wl = list(&["127.0.0.1"]);
        assert!(wl.matches("ip:127.0.0.1", "127.0.0.1"));
        assert!(!wl.matches("ip:127.0.0.2", "127.0.0.2"));
    }

    #[test]
    fn test_full_key_entry() {
        let wl = list(&["identity:svc-batch"]);
        assert!(wl.matches("identity:svc-batch", "10.1.1.1"));
        assert!(!wl.matches("identity:alice", "10.1.1.1"));
    }

    #[test]
    fn test_wildcard_is_anchored() {
        let wl = list(&["10.0.*"]);
        assert!(wl.matches("ip:10.0.3.4", "10.0.3.4"));
        assert!(!wl.matches("ip:110.0.3.4", "110.0.3.4"));
    }

    #[test]
    fn test_regex_entry() {
        let wl = list(&[r"re:^192\.168\.\d+\.\d+$"]);
        assert!(wl.matches("ip:192.168.1.20", "192.168.1.20"));
        assert!(!wl.matches("ip:192.169.1.20", "192.169.1.20"));
    }

    #[test]
    fn test_invalid_regex_falls_back_to_exact() {
        let wl = list(&["re:[unclosed"]);
        assert!(wl.matches("re:[unclosed", "1.1.1.1"));
        assert!(!wl.matches("ip:1.1.1.1", "1.1.1.1"));
    }

    #[test]
    fn test_empty() {
        let wl = Whitelist::default();
        assert!(wl.is_empty());
        assert!(!wl.matches("ip:1.1.1.1", "1.1.1.1"));
    }
}
