// src/core/scanner/headers_scanner.rs

use reqwest::header::HeaderMap;
use tracing::{debug, warn};

use crate::core::models::{AnalysisFinding, Severity};

/// A security header the audit looks for, and the finding raised when it is absent.
struct SecurityHeader {
    /// Field name in the report.
    label: &'static str,
    /// Lowercase header name.
    name: &'static str,
    severity: Severity,
    code: &'static str,
}

static SECURITY_HEADERS: &[SecurityHeader] = &[
    SecurityHeader {
        label: "HSTS",
        name: "strict-transport-security",
        severity: Severity::Warning,
        code: "HEADERS_HSTS_MISSING",
    },
    SecurityHeader {
        label: "X-Frame-Options",
        name: "x-frame-options",
        severity: Severity::Warning,
        code: "HEADERS_X_FRAME_OPTIONS_MISSING",
    },
    SecurityHeader {
        label: "X-Content-Type-Options",
        name: "x-content-type-options",
        severity: Severity::Info,
        code: "HEADERS_X_CONTENT_TYPE_OPTIONS_MISSING",
    },
    SecurityHeader {
        label: "Content-Security-Policy",
        name: "content-security-policy",
        severity: Severity::Warning,
        code: "HEADERS_CSP_MISSING",
    },
    SecurityHeader {
        label: "Referrer-Policy",
        name: "referrer-policy",
        severity: Severity::Info,
        code: "HEADERS_REFERRER_POLICY_MISSING",
    },
];

const NOT_FOUND: &str = "Not Found";

/// Per-header status lines plus the findings for the missing ones.
#[derive(Debug, Default)]
pub struct HeadersResults {
    pub statuses: Vec<(&'static str, String)>,
    pub analysis: Vec<AnalysisFinding>,
}

/// Checks for the presence of a specific header. Non-UTF-8 values still count as present.
fn check_header(headers: &HeaderMap, name: &str) -> Option<String> {
    let value = headers.get(name)?;
    match value.to_str() {
        Ok(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Ok(_) => None,
        Err(_) => {
            warn!(header_name = name, "Header found but contained invalid UTF-8.");
            Some("[Invalid UTF-8]".to_string())
        }
    }
}

/// Reports each security header as `Present (value)` or `Not Found`.
pub fn audit_headers(headers: &HeaderMap) -> HeadersResults {
    let mut results = HeadersResults::default();
    for header in SECURITY_HEADERS {
        match check_header(headers, header.name) {
            Some(value) => results.statuses.push((header.label, format!("Present ({value})"))),
            None => {
                debug!(header_name = header.name, "Header missing.");
                results.statuses.push((header.label, NOT_FOUND.to_string()));
                results.analysis.push(AnalysisFinding::new(header.severity, header.code));
            }
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::knowledge_base::get_finding_detail;
    use reqwest::header::HeaderValue;

    #[test]
    fn present_and_missing_headers_are_reported() {
        let mut headers = HeaderMap::new();
        headers.insert("strict-transport-security", HeaderValue::from_static("max-age=31536000"));
        headers.insert("x-frame-options", HeaderValue::from_static("DENY"));

        let results = audit_headers(&headers);
        assert_eq!(results.statuses[0], ("HSTS", "Present (max-age=31536000)".to_string()));
        assert_eq!(results.statuses[1], ("X-Frame-Options", "Present (DENY)".to_string()));
        assert_eq!(results.statuses[3], ("Content-Security-Policy", NOT_FOUND.to_string()));

        let codes: Vec<&str> = results.analysis.iter().map(|f| f.code.as_str()).collect();
        assert_eq!(
            codes,
            vec![
                "HEADERS_X_CONTENT_TYPE_OPTIONS_MISSING",
                "HEADERS_CSP_MISSING",
                "HEADERS_REFERRER_POLICY_MISSING"
            ]
        );
    }

    #[test]
    fn every_missing_header_has_a_knowledge_base_entry() {
        for header in SECURITY_HEADERS {
            let detail = get_finding_detail(header.code).unwrap();
            assert_eq!(detail.severity, header.severity);
        }
    }
}
