//! Paths that skip signature verification.
//!
//! Each entry is a regex tested anywhere in the path (`^`/`$` anchor when
//! wanted). An entry that is not a valid regex is compared literally.

use regex::Regex;

#[derive(Debug, Clone)]
enum Exemption {
    Pattern(Regex),
    Literal(String),
}

#[derive(Debug, Clone, Default)]
pub struct ExemptionList {
    entries: Vec<Exemption>,
}

impl ExemptionList {
    pub fn new(patterns: &[String]) -> Self {
        let entries = patterns
            .iter()
            .map(|p| match Regex::new(p) {
                Ok(re) => Exemption::Pattern(re),
                Err(e) => {
                    tracing::error!(
                        pattern = %p,
                        error = %e,
                        "Invalid exemption pattern, falling back to exact match"
                    );
                    Exemption::Literal(p.clone())
                }
            })
            .collect();
        Self { entries }
    }

    pub fn is_exempt(&self, path: &str) -> bool {
        self.entries.iter().any(|e| match e {
            Exemption::Pattern(re) => re.is_match(path),
            Exemption::Literal(literal) => path == literal,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(patterns: &[&str]) -> ExemptionList {
        ExemptionList::new(&patterns.iter().map(|s| s.to_string()).collect::<Vec<_>>())
    }

    #[test]
    fn test_regex_exemption() {
        let list = list(&["^/api/public/", "/captcha$"]);
        assert!(list.is_exempt("/api/public/menus"));
        assert!(list.is_exempt("/api/auth/captcha"));
        assert!(!list.is_exempt("/api/orders"));
    }

    #[test]
    fn test_unanchored_match() {
        let list = list(&["health"]);
        assert!(list.is_exempt("/api/health/live"));
    }

    #[test]
    fn test_invalid_regex_is_literal() {
        let list = list(&["/api/(broken"]);
        assert!(list.is_exempt("/api/(broken"));
        assert!(!list.is_exempt("/api/(broken/more"));
    }
}
