//! Static, read-only data the audit reasons with.
//!
//! Two kinds of tables live here: the findings database (what a detected misconfiguration
//! means and how to fix it) and the provider signature tables used to label hosting and
//! email providers. Both are plain data so they can be extended without touching the probes.

use serde_json::{Value, json};
use std::fmt;

use crate::core::models::{AnalysisFinding, Severity};

// --- Findings ---

/// High-level grouping of findings, shown next to each issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FindingCategory {
    /// Email authentication records (SPF, DMARC, DKIM).
    Dns,
    /// Certificates and the TLS handshake.
    Ssl,
    /// HTTP security headers.
    Http,
}

impl fmt::Display for FindingCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FindingCategory::Dns => write!(f, "Email Authentication"),
            FindingCategory::Ssl => write!(f, "SSL/TLS Certificate"),
            FindingCategory::Http => write!(f, "HTTP Security Headers"),
        }
    }
}

/// Everything needed to present a finding to a reader.
pub struct FindingDetail {
    /// Machine-readable identifier (e.g. "DNS_DMARC_MISSING").
    pub code: &'static str,
    pub title: &'static str,
    pub category: FindingCategory,
    pub severity: Severity,
    /// One actionable fix.
    pub remediation: &'static str,
}

static FINDINGS: &[FindingDetail] = &[
    // --- Email authentication ---
    FindingDetail {
        code: "DNS_DMARC_MISSING",
        title: "DMARC Record Missing",
        category: FindingCategory::Dns,
        severity: Severity::Critical,
        remediation: "Publish a TXT record at _dmarc.<domain>, starting with 'v=DMARC1; p=none;' and tightening to quarantine or reject once reports look clean.",
    },
    FindingDetail {
        code: "DNS_DMARC_POLICY_NONE",
        title: "DMARC Policy is 'none'",
        category: FindingCategory::Dns,
        severity: Severity::Warning,
        remediation: "Move the DMARC policy to 'p=quarantine' or 'p=reject' after legitimate senders pass SPF and DKIM.",
    },
    FindingDetail {
        code: "DNS_SPF_MISSING",
        title: "SPF Record Missing",
        category: FindingCategory::Dns,
        severity: Severity::Warning,
        remediation: "Add a 'v=spf1 ...' TXT record listing every server allowed to send mail for the domain.",
    },
    FindingDetail {
        code: "DNS_SPF_POLICY_SOFTFAIL",
        title: "SPF Policy is 'Softfail'",
        category: FindingCategory::Dns,
        severity: Severity::Info,
        remediation: "Once the SPF record covers all senders, end it with '-all' instead of '~all'.",
    },
    FindingDetail {
        code: "DNS_SPF_POLICY_NEUTRAL",
        title: "SPF Policy is 'Neutral'",
        category: FindingCategory::Dns,
        severity: Severity::Info,
        remediation: "Replace '?all' with '~all' or, preferably, '-all'.",
    },
    FindingDetail {
        code: "DNS_DKIM_MISSING",
        title: "DKIM Record Missing",
        category: FindingCategory::Dns,
        severity: Severity::Info,
        remediation: "Enable DKIM signing with the mail provider and publish its public key under <selector>._domainkey.",
    },
    // --- TLS ---
    FindingDetail {
        code: "SSL_HANDSHAKE_FAILED",
        title: "TLS Handshake Failed",
        category: FindingCategory::Ssl,
        severity: Severity::Critical,
        remediation: "Serve a certificate for this hostname on port 443 and check the TLS configuration with an external tester.",
    },
    FindingDetail {
        code: "SSL_UNTRUSTED",
        title: "Certificate Not Trusted",
        category: FindingCategory::Ssl,
        severity: Severity::Critical,
        remediation: "Install a certificate issued by a public CA, including the full intermediate chain.",
    },
    FindingDetail {
        code: "SSL_EXPIRED",
        title: "SSL Certificate Expired",
        category: FindingCategory::Ssl,
        severity: Severity::Critical,
        remediation: "Renew the certificate now and automate renewals (e.g. ACME / Let's Encrypt).",
    },
    FindingDetail {
        code: "SSL_NOT_YET_VALID",
        title: "SSL Certificate Not Yet Valid",
        category: FindingCategory::Ssl,
        severity: Severity::Warning,
        remediation: "Check the server clock and the certificate's start date.",
    },
    FindingDetail {
        code: "SSL_EXPIRING_SOON",
        title: "SSL Certificate Expiring Soon",
        category: FindingCategory::Ssl,
        severity: Severity::Warning,
        remediation: "Renew within the next 30 days and verify that automated renewal is running.",
    },
    // --- HTTP headers ---
    FindingDetail {
        code: "HEADERS_HSTS_MISSING",
        title: "HSTS Header Missing",
        category: FindingCategory::Http,
        severity: Severity::Warning,
        remediation: "Send 'Strict-Transport-Security: max-age=31536000; includeSubDomains'.",
    },
    FindingDetail {
        code: "HEADERS_CSP_MISSING",
        title: "CSP Header Missing",
        category: FindingCategory::Http,
        severity: Severity::Warning,
        remediation: "Define a Content-Security-Policy that lists trusted script and style sources.",
    },
    FindingDetail {
        code: "HEADERS_X_FRAME_OPTIONS_MISSING",
        title: "X-Frame-Options Missing",
        category: FindingCategory::Http,
        severity: Severity::Warning,
        remediation: "Send 'X-Frame-Options: SAMEORIGIN' (or DENY) to block clickjacking.",
    },
    FindingDetail {
        code: "HEADERS_X_CONTENT_TYPE_OPTIONS_MISSING",
        title: "X-Content-Type-Options Missing",
        category: FindingCategory::Http,
        severity: Severity::Info,
        remediation: "Send 'X-Content-Type-Options: nosniff'.",
    },
    FindingDetail {
        code: "HEADERS_REFERRER_POLICY_MISSING",
        title: "Referrer-Policy Missing",
        category: FindingCategory::Http,
        severity: Severity::Info,
        remediation: "Send 'Referrer-Policy: strict-origin-when-cross-origin'.",
    },
];

pub fn get_finding_detail(code: &str) -> Option<&'static FindingDetail> {
    FINDINGS.iter().find(|f| f.code == code)
}

/// Renders findings as the `Issues` list of a report section.
///
/// Most severe first. Codes missing from the knowledge base are skipped.
pub fn describe(findings: &[AnalysisFinding]) -> Vec<Value> {
    let mut ordered: Vec<&AnalysisFinding> = findings.iter().collect();
    ordered.sort_by_key(|f| f.severity);
    ordered
        .into_iter()
        .filter_map(|finding| {
            let detail = get_finding_detail(&finding.code)?;
            Some(json!({
                "Title": detail.title,
                "Severity": detail.severity,
                "Category": detail.category.to_string(),
                "Remediation": detail.remediation,
            }))
        })
        .collect()
}

// --- Provider Signatures ---

/// Evidence that a site is served by a given hosting provider or CDN.
///
/// Markers are matched as lowercase substrings; IP prefixes as string prefixes.
#[derive(Debug, Clone, Copy)]
pub struct HostingSignature {
    pub provider: &'static str,
    pub server_markers: &'static [&'static str],
    pub ip_prefixes: &'static [&'static str],
    pub nameserver_markers: &'static [&'static str],
}

/// An MX host pattern and the mailbox provider it belongs to.
#[derive(Debug, Clone, Copy)]
pub struct EmailSignature {
    pub provider: &'static str,
    pub mx_markers: &'static [&'static str],
}

/// Generic hosts and plain web-server names are deliberately absent: `nginx` or `Apache`
/// says what serves the page, not who hosts it.
pub static HOSTING_SIGNATURES: &[HostingSignature] = &[
    HostingSignature {
        provider: "Cloudflare",
        server_markers: &["cloudflare"],
        ip_prefixes: &["104.16.", "104.17.", "104.18.", "104.19.", "104.20.", "104.21.", "172.64.", "172.66.", "172.67.", "188.114."],
        nameserver_markers: &["cloudflare.com"],
    },
    HostingSignature {
        provider: "Amazon Web Services",
        server_markers: &["awselb", "amazons3", "cloudfront"],
        ip_prefixes: &[],
        nameserver_markers: &["awsdns"],
    },
    HostingSignature {
        provider: "Google Cloud",
        server_markers: &["google frontend", "gws"],
        ip_prefixes: &[],
        nameserver_markers: &["googledomains.com", "ns-cloud"],
    },
    HostingSignature {
        provider: "Microsoft Azure",
        server_markers: &["azure"],
        ip_prefixes: &[],
        nameserver_markers: &["azure-dns"],
    },
    HostingSignature {
        provider: "Vercel",
        server_markers: &["vercel"],
        ip_prefixes: &["76.76.21."],
        nameserver_markers: &["vercel-dns.com"],
    },
    HostingSignature {
        provider: "Netlify",
        server_markers: &["netlify"],
        ip_prefixes: &["75.2.60."],
        nameserver_markers: &["netlifydns"],
    },
    HostingSignature {
        provider: "GitHub Pages",
        server_markers: &["github.com"],
        ip_prefixes: &["185.199.108.", "185.199.109.", "185.199.110.", "185.199.111."],
        nameserver_markers: &[],
    },
    HostingSignature {
        provider: "Akamai",
        server_markers: &["akamaighost", "akamainetstorage"],
        ip_prefixes: &[],
        nameserver_markers: &["akam.net"],
    },
    HostingSignature {
        provider: "Fastly",
        server_markers: &["fastly"],
        ip_prefixes: &["151.101."],
        nameserver_markers: &[],
    },
    HostingSignature {
        provider: "Wix",
        server_markers: &["pepyaka"],
        ip_prefixes: &[],
        nameserver_markers: &["wixdns.net"],
    },
    HostingSignature {
        provider: "Squarespace",
        server_markers: &["squarespace"],
        ip_prefixes: &[],
        nameserver_markers: &["squarespacedns.com"],
    },
    HostingSignature {
        provider: "WordPress.com",
        server_markers: &[],
        ip_prefixes: &["192.0.78."],
        nameserver_markers: &["wordpress.com"],
    },
    HostingSignature {
        provider: "DigitalOcean",
        server_markers: &[],
        ip_prefixes: &[],
        nameserver_markers: &["digitalocean.com"],
    },
    HostingSignature {
        provider: "Hetzner",
        server_markers: &[],
        ip_prefixes: &[],
        nameserver_markers: &["hetzner"],
    },
    HostingSignature {
        provider: "OVHcloud",
        server_markers: &[],
        ip_prefixes: &[],
        nameserver_markers: &["ovh.net"],
    },
    HostingSignature {
        provider: "GoDaddy",
        server_markers: &[],
        ip_prefixes: &[],
        nameserver_markers: &["domaincontrol.com"],
    },
    HostingSignature {
        provider: "Bluehost",
        server_markers: &[],
        ip_prefixes: &[],
        nameserver_markers: &["bluehost.com"],
    },
    HostingSignature {
        provider: "HostGator",
        server_markers: &[],
        ip_prefixes: &[],
        nameserver_markers: &["hostgator.com"],
    },
    HostingSignature {
        provider: "SiteGround",
        server_markers: &[],
        ip_prefixes: &[],
        nameserver_markers: &["siteground"],
    },
];

/// Checked in order; the first provider with a matching MX host wins.
pub static EMAIL_SIGNATURES: &[EmailSignature] = &[
    EmailSignature { provider: "Google Workspace", mx_markers: &["google.com", "googlemail.com"] },
    EmailSignature { provider: "Microsoft 365", mx_markers: &["outlook.com", "mail.protection"] },
    EmailSignature { provider: "Zoho Mail", mx_markers: &["zoho"] },
    EmailSignature { provider: "ProtonMail", mx_markers: &["protonmail", "proton.me", "pm.proton"] },
    EmailSignature { provider: "Yahoo Mail", mx_markers: &["yahoo"] },
    EmailSignature { provider: "Fastmail", mx_markers: &["fastmail", "messagingengine.com"] },
];

pub const HOSTING_FALLBACK: &str = "Independent Hosting";
pub const EMAIL_FALLBACK: &str = "Custom Email Provider";

/// The tables the assembler labels providers with. Swappable for tests or deployments
/// that know more providers than the built-in lists.
#[derive(Debug, Clone, Copy)]
pub struct SignatureTables {
    pub hosting: &'static [HostingSignature],
    pub email: &'static [EmailSignature],
    pub hosting_fallback: &'static str,
    pub email_fallback: &'static str,
}

impl Default for SignatureTables {
    fn default() -> Self {
        Self {
            hosting: HOSTING_SIGNATURES,
            email: EMAIL_SIGNATURES,
            hosting_fallback: HOSTING_FALLBACK,
            email_fallback: EMAIL_FALLBACK,
        }
    }
}
