// src/core/domain.rs

//! Normalization and validation of the domain a caller asks us to audit.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

use crate::core::errors::AuditError;

static RE_SCHEME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^https?://").unwrap());
static RE_PORT: Lazy<Regex> = Lazy::new(|| Regex::new(r":\d*$").unwrap());
static RE_HOSTNAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9.-]+\.[a-z]{2,}$").unwrap());

/// Minimum accepted length of a normalized domain.
const MIN_DOMAIN_LEN: usize = 3;

/// Reduces free text to a bare hostname.
///
/// One pass trims, lowercases, strips `http://`/`https://`, strips a leading `www.`, cuts at
/// the first `/` and strips a trailing `:port`. Passes repeat until the value stops changing,
/// which makes the result idempotent for inputs like `www.www.example.com`.
pub fn normalize(raw: &str) -> String {
    let mut current = normalize_once(raw);
    loop {
        let next = normalize_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn normalize_once(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    let without_scheme = RE_SCHEME.replace(&lowered, "");
    let without_www = without_scheme.strip_prefix("www.").unwrap_or(&without_scheme[..]);
    let host = without_www.split('/').next().unwrap_or_default();
    RE_PORT.replace(host, "").trim().to_string()
}

/// Whether a normalized string passes the hostname grammar.
pub fn is_valid(normalized: &str) -> bool {
    normalized.len() >= MIN_DOMAIN_LEN && RE_HOSTNAME.is_match(normalized)
}

/// A normalized, validated domain. The only way to start an audit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AuditTarget(String);

impl AuditTarget {
    pub fn parse(raw: &str) -> Result<Self, AuditError> {
        let normalized = normalize(raw);
        if is_valid(&normalized) {
            Ok(Self(normalized))
        } else {
            Err(AuditError::InvalidDomain(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The top-level label, used to pick a WHOIS registry.
    pub fn tld(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for AuditTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_scheme_www_path_and_query() {
        assert_eq!(normalize("HTTPS://WWW.Example.com/path?x=1"), "example.com");
    }

    #[test]
    fn strips_port_and_whitespace() {
        assert_eq!(normalize("  http://shop.example.org:8443/cart "), "shop.example.org");
        assert_eq!(normalize("example.com:"), "example.com");
    }

    #[test]
    fn repeated_www_prefixes_are_stripped() {
        assert_eq!(normalize("www.www.example.com"), "example.com");
        assert_eq!(normalize("mywww.example.com"), "mywww.example.com");
    }

    #[test]
    fn normalization_is_idempotent() {
        let inputs = [
            "HTTPS://WWW.Example.com/path?x=1",
            "www.www.example.com",
            "http://http://example.com",
            "example.com:80:90",
            "  Sub.Example.Co.UK  ",
            "not a domain",
            "",
            "www.",
            "https://www.example.com:8080/a/b",
            " example.com :80 /x",
            "example.com:80 :90",
        ];
        for input in inputs {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "input: {input:?}");
        }
    }

    #[test]
    fn rejects_malformed_domains() {
        for bad in ["ex", "", "not a domain", "localhost", "example.c0m", "exa_mple.com"] {
            assert!(AuditTarget::parse(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn accepts_well_formed_domains() {
        for good in ["example.com", "sub.example.co.uk", "https://www.example.com/about"] {
            assert!(AuditTarget::parse(good).is_ok(), "rejected {good:?}");
        }
        let target = AuditTarget::parse("sub.example.co.uk").unwrap();
        assert_eq!(target.tld(), "uk");
    }
}
