// src/core/net/whois.rs

//! WHOIS lookups through `whois-rust`, plus parsing of the free-form answers.
//!
//! The first query goes to the registry for the domain's TLD (from our table, or IANA for
//! anything else). Referrals are followed one hop at a time so a failing registrar server
//! still leaves the registry's answer.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;
use tokio::time::{Instant, timeout};
use tracing::{debug, warn};
use whois_rust::{WhoIs, WhoIsError, WhoIsLookupOptions, WhoIsServerValue};

use crate::core::domain::AuditTarget;

const IANA_SERVER: &str = "whois.iana.org";
/// IANA, registry, registrar.
const MAX_QUERIES: usize = 3;

/// Registry servers for common TLDs. Anything else starts at IANA.
const REGISTRY_SERVERS: &[(&str, &str)] = &[
    ("com", "whois.verisign-grs.com"),
    ("net", "whois.verisign-grs.com"),
    ("org", "whois.pir.org"),
    ("info", "whois.nic.info"),
    ("io", "whois.nic.io"),
    ("ai", "whois.nic.ai"),
    ("co", "whois.nic.co"),
    ("me", "whois.nic.me"),
    ("dev", "whois.nic.google"),
    ("app", "whois.nic.google"),
    ("uk", "whois.nic.uk"),
    ("de", "whois.denic.de"),
    ("fr", "whois.nic.fr"),
    ("it", "whois.nic.it"),
    ("nl", "whois.domain-registry.nl"),
    ("eu", "whois.eu"),
    ("br", "whois.registro.br"),
    ("jp", "whois.jprs.jp"),
    ("au", "whois.auda.org.au"),
    ("ca", "whois.cira.ca"),
];

#[derive(Debug, Error)]
pub enum WhoisError {
    #[error("WHOIS query to {server} failed: {source}")]
    Lookup {
        server: String,
        #[source]
        source: WhoIsError,
    },

    #[error("WHOIS server table is invalid: {0}")]
    Table(#[source] WhoIsError),

    #[error("WHOIS server {server} timed out")]
    Timeout { server: String },

    #[error("WHOIS response for {0} contained no usable fields")]
    Empty(String),
}

/// The parsed fields of a WHOIS answer. Dates keep the server's raw text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhoisRecord {
    pub registrar: Option<String>,
    pub created: Option<String>,
    pub expiry: Option<String>,
    pub updated: Option<String>,
    pub nameservers: Vec<String>,
    pub status: Vec<String>,
    /// Next WHOIS server named in the answer (`refer:` or `Registrar WHOIS Server:`).
    pub referral: Option<String>,
}

impl WhoisRecord {
    pub fn is_empty(&self) -> bool {
        self.registrar.is_none()
            && self.created.is_none()
            && self.expiry.is_none()
            && self.updated.is_none()
            && self.nameservers.is_empty()
            && self.status.is_empty()
    }

    /// Fills fields missing from `self` with values from `other`.
    ///
    /// The registrar's answer is usually more detailed, but thin registries still carry
    /// the authoritative nameservers and status codes.
    fn merge(mut self, other: WhoisRecord) -> WhoisRecord {
        self.registrar = self.registrar.or(other.registrar);
        self.created = self.created.or(other.created);
        self.expiry = self.expiry.or(other.expiry);
        self.updated = self.updated.or(other.updated);
        if self.nameservers.is_empty() {
            self.nameservers = other.nameservers;
        }
        if self.status.is_empty() {
            self.status = other.status;
        }
        self
    }
}

/// The server table in the JSON shape `whois-rust` loads. The empty key is its fallback.
fn server_table() -> Value {
    let mut table: Map<String, Value> = REGISTRY_SERVERS
        .iter()
        .map(|(tld, server)| (tld.to_string(), Value::String(server.to_string())))
        .collect();
    table.insert(String::new(), Value::String(IANA_SERVER.to_string()));
    Value::Object(table)
}

pub struct WhoisClient {
    whois: WhoIs,
}

impl WhoisClient {
    pub fn new() -> Result<Self, WhoisError> {
        let whois = WhoIs::from_string(server_table().to_string()).map_err(WhoisError::Table)?;
        Ok(Self { whois })
    }

    /// Looks up `target`, spending at most `budget` across every query.
    pub async fn lookup(&self, target: &AuditTarget, budget: Duration) -> Result<WhoisRecord, WhoisError> {
        let deadline = Instant::now() + budget;
        let domain = target.as_str();

        let mut record = self.query(domain, None, deadline).await?;
        let mut visited = vec![first_server(target.tld()).to_string()];

        while visited.len() < MAX_QUERIES {
            let Some(next) = record.referral.take() else { break };
            if visited.iter().any(|s| s.eq_ignore_ascii_case(&next)) {
                break;
            }
            match self.query(domain, Some(&next), deadline).await {
                Ok(answer) => record = answer.merge(record),
                Err(e) => {
                    debug!(domain, server = %next, error = %e, "WHOIS referral failed; keeping earlier answer.");
                    break;
                }
            }
            visited.push(next);
        }

        if record.is_empty() {
            return Err(WhoisError::Empty(domain.to_string()));
        }
        Ok(record)
    }

    /// One query without the crate's own referral following. `server: None` uses the table.
    async fn query(&self, domain: &str, server: Option<&str>, deadline: Instant) -> Result<WhoisRecord, WhoisError> {
        let label = server.unwrap_or("registry").to_string();
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(WhoisError::Timeout { server: label });
        }
        let lookup_err = |source| WhoisError::Lookup { server: label.clone(), source };

        let mut options = WhoIsLookupOptions::from_string(domain).map_err(lookup_err)?;
        options.follow = 0;
        options.timeout = Some(remaining);
        if let Some(host) = server {
            options.server = Some(WhoIsServerValue::from_string(host).map_err(lookup_err)?);
        }

        debug!(domain, server = %label, "Querying WHOIS server.");
        let answer = timeout(remaining, self.whois.lookup_async(options))
            .await
            .map_err(|_| WhoisError::Timeout { server: label.clone() })?
            .map_err(lookup_err)?;
        Ok(parse_response(&answer))
    }
}

fn first_server(tld: &str) -> &'static str {
    REGISTRY_SERVERS
        .iter()
        .find(|(known, _)| *known == tld)
        .map_or(IANA_SERVER, |(_, server)| *server)
}

// --- Response Parsing ---

#[derive(Clone, Copy, PartialEq)]
enum Field {
    Registrar,
    Created,
    Expiry,
    Updated,
    NameServer,
    Status,
    Referral,
}

fn classify_key(key: &str) -> Option<Field> {
    let field = match key {
        "registrar" | "sponsoring registrar" | "registrar name" => Field::Registrar,
        "creation date" | "created" | "created on" | "registered on" | "registration time"
        | "domain registration date" | "registered" => Field::Created,
        "registry expiry date" | "registrar registration expiration date" | "expiry date"
        | "expiration date" | "expires" | "expires on" | "paid-till" | "expiration time"
        | "renewal date" => Field::Expiry,
        "updated date" | "last updated" | "last-update" | "last modified" | "changed" | "modified" => {
            Field::Updated
        }
        "name server" | "name servers" | "nameserver" | "nameservers" | "nserver" => Field::NameServer,
        "domain status" | "status" => Field::Status,
        "registrar whois server" | "whois server" | "refer" => Field::Referral,
        _ => return None,
    };
    Some(field)
}

fn clean_nameserver(raw: &str) -> Option<String> {
    let ns = raw
        .split_whitespace()
        .next()?
        .trim_end_matches('.')
        .to_ascii_lowercase();
    (!ns.is_empty() && ns.contains('.')).then_some(ns)
}

/// Extracts the fields we report from a free-form WHOIS answer.
pub fn parse_response(response: &str) -> WhoisRecord {
    let mut record = WhoisRecord::default();
    // Some registries (e.g. Nominet) list nameservers on indented lines under a bare header.
    let mut in_nameserver_block = false;

    for line in response.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            in_nameserver_block = false;
            continue;
        }
        if trimmed.starts_with('%') || trimmed.starts_with('#') || trimmed.starts_with(">>>") {
            continue;
        }

        let Some((key, value)) = trimmed.split_once(':') else {
            if in_nameserver_block {
                push_unique(&mut record.nameservers, clean_nameserver(trimmed));
            }
            continue;
        };
        let value = value.trim();
        let Some(field) = classify_key(&key.trim().to_ascii_lowercase()) else {
            continue;
        };
        in_nameserver_block = field == Field::NameServer && value.is_empty();
        if value.is_empty() {
            continue;
        }

        let text = Some(value.to_string());
        match field {
            Field::Registrar => record.registrar = record.registrar.take().or(text),
            Field::Created => record.created = record.created.take().or(text),
            Field::Expiry => record.expiry = record.expiry.take().or(text),
            Field::Updated => record.updated = record.updated.take().or(text),
            Field::NameServer => push_unique(&mut record.nameservers, clean_nameserver(value)),
            Field::Status => {
                let code = value.split_whitespace().next().map(str::to_string);
                push_unique(&mut record.status, code);
            }
            Field::Referral => {
                let server = value
                    .trim_start_matches("whois://")
                    .trim_end_matches('/')
                    .to_ascii_lowercase();
                if !server.is_empty() && record.referral.is_none() {
                    record.referral = Some(server);
                }
            }
        }
    }

    if record.is_empty() && !response.trim().is_empty() {
        warn!(bytes = response.len(), "WHOIS answer had no recognizable fields.");
    }
    record
}

fn push_unique(list: &mut Vec<String>, value: Option<String>) {
    if let Some(v) = value {
        if !list.contains(&v) {
            list.push(v);
        }
    }
}

// --- Dates ---

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.fZ",
    "%Y-%m-%dT%H:%M:%SZ",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y.%m.%d %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y.%m.%d", "%Y/%m/%d", "%d-%b-%Y", "%d.%m.%Y", "%d/%m/%Y", "%Y%m%d"];

/// Parses the date formats registries commonly use.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }
    if let Some(date) = DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
    {
        return Some(date.date());
    }
    // Trailing time zones and comments vary too much; the leading token is enough.
    let head = raw.split_whitespace().next()?;
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(head, fmt).ok())
}

/// Renders a WHOIS date as `YYYY-MM-DD`, or returns the raw text when unparseable.
pub fn format_date(raw: &str) -> String {
    parse_date(raw)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| raw.trim().to_string())
}

pub fn days_until(raw: &str, today: NaiveDate) -> Option<i64> {
    parse_date(raw).map(|d| (d - today).num_days())
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERISIGN_SAMPLE: &str = "\
   Domain Name: EXAMPLE.COM
   Registry Domain ID: 2336799_DOMAIN_COM-VRSN
   Registrar WHOIS Server: whois.example-registrar.com
   Updated Date: 2024-08-14T07:01:34Z
   Creation Date: 1995-08-14T04:00:00Z
   Registry Expiry Date: 2025-08-13T04:00:00Z
   Registrar: Example Registrar, Inc.
   Domain Status: clientDeleteProhibited https://icann.org/epp#clientDeleteProhibited
   Domain Status: clientTransferProhibited https://icann.org/epp#clientTransferProhibited
   Name Server: A.IANA-SERVERS.NET
   Name Server: B.IANA-SERVERS.NET
>>> Last update of whois database: 2024-09-01T10:00:00Z <<<
";

    const NOMINET_SAMPLE: &str = "\
    Domain name:
        example.co.uk

    Registrar:
        Example Registrar Ltd [Tag = EXAMPLE]

    Relevant dates:
        Registered on: 26-Aug-1996
        Expiry date:  26-Aug-2026
        Last updated:  12-Jul-2024

    Name servers:
        ns1.example.net
        ns2.example.net.

";

    #[test]
    fn parses_thin_registry_answer() {
        let record = parse_response(VERISIGN_SAMPLE);
        assert_eq!(record.registrar.as_deref(), Some("Example Registrar, Inc."));
        assert_eq!(record.nameservers, vec!["a.iana-servers.net", "b.iana-servers.net"]);
        assert_eq!(record.status, vec!["clientDeleteProhibited", "clientTransferProhibited"]);
        assert_eq!(record.referral.as_deref(), Some("whois.example-registrar.com"));
        assert_eq!(format_date(record.created.as_deref().unwrap()), "1995-08-14");
    }

    #[test]
    fn parses_indented_nameserver_block() {
        let record = parse_response(NOMINET_SAMPLE);
        assert_eq!(record.nameservers, vec!["ns1.example.net", "ns2.example.net"]);
        assert_eq!(format_date(record.expiry.as_deref().unwrap()), "2026-08-26");
        assert_eq!(format_date(record.created.as_deref().unwrap()), "1996-08-26");
    }

    #[test]
    fn empty_answer_yields_empty_record() {
        assert!(parse_response("No match for \"NOPE.COM\".\n").is_empty());
        assert!(parse_response("").is_empty());
    }

    #[test]
    fn iana_refer_line_is_a_referral() {
        let answer = "% IANA WHOIS server\n\ndomain:       XYZ\n\norganisation: Example\nrefer:        whois.nic.xyz\n";
        assert_eq!(parse_response(answer).referral.as_deref(), Some("whois.nic.xyz"));
        assert_eq!(parse_response("% nothing here").referral, None);
    }

    #[test]
    fn registrar_answer_takes_precedence_when_merged() {
        let registry = parse_response(VERISIGN_SAMPLE);
        let registrar = WhoisRecord {
            registrar: Some("Example Registrar".into()),
            ..WhoisRecord::default()
        };
        let merged = registrar.merge(registry);
        assert_eq!(merged.registrar.as_deref(), Some("Example Registrar"));
        assert_eq!(merged.nameservers.len(), 2);
    }

    #[test]
    fn dates_fall_back_to_raw_text() {
        assert_eq!(format_date("2024-01-02"), "2024-01-02");
        assert_eq!(format_date("2024.01.02 12:00:00"), "2024-01-02");
        assert_eq!(format_date("before 1996"), "before 1996");
    }

    #[test]
    fn days_until_counts_from_today() {
        let today = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert_eq!(days_until("2025-01-31T00:00:00Z", today), Some(30));
        assert_eq!(days_until("unknown", today), None);
    }

    #[test]
    fn known_tlds_skip_iana() {
        assert_eq!(first_server("com"), "whois.verisign-grs.com");
        assert_eq!(first_server("uk"), "whois.nic.uk");
        assert_eq!(first_server("zz"), IANA_SERVER);
    }

    #[test]
    fn server_table_loads_with_an_iana_fallback() {
        let table = server_table();
        assert_eq!(table[""], IANA_SERVER);
        assert_eq!(table["org"], "whois.pir.org");
        assert!(WhoisClient::new().is_ok());
    }

    #[tokio::test]
    async fn exhausted_budget_times_out_without_querying() {
        let client = WhoisClient::new().unwrap();
        let target = AuditTarget::parse("example.com").unwrap();
        let err = client.lookup(&target, Duration::ZERO).await.unwrap_err();
        assert!(matches!(err, WhoisError::Timeout { .. }));
    }
}
