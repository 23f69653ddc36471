// src/core/scanner/dns_scanner.rs

use async_trait::async_trait;
use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::AuditConfig;
use crate::core::domain::AuditTarget;
use crate::core::errors::ProbeError;
use crate::core::knowledge_base::describe;
use crate::core::models::{
    AnalysisFinding, ProbeContext, ProbeKind, ProbeResult, SectionBuilder, SectionData, Severity, fields,
};
use crate::core::net::dns::is_no_records;
use crate::core::probe::{Probe, ProbeEnv};
use crate::core::scanner::Budget;

/// Per-lookup ceiling; the probe's remaining budget caps it further.
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// A list of common DKIM selectors to check for when a specific one is not known.
const COMMON_DKIM_SELECTORS: &[&str] = &["google", "selector1", "selector2", "default", "dkim", "k1", "mail"];

/// TXT prefixes left behind by site-ownership verification, and who asked for them.
const VERIFICATION_PREFIXES: &[(&str, &str)] = &[
    ("google-site-verification=", "Google"),
    ("ms=", "Microsoft"),
    ("facebook-domain-verification=", "Facebook"),
    ("apple-domain-verification=", "Apple"),
    ("atlassian-domain-verification=", "Atlassian"),
    ("docusign=", "DocuSign"),
    ("adobe-idp-site-verification=", "Adobe"),
    ("stripe-verification=", "Stripe"),
    ("zoho-verification=", "Zoho"),
    ("yandex-verification:", "Yandex"),
    ("pinterest-site-verification=", "Pinterest"),
    ("_github-challenge", "GitHub"),
];

/// Result of a single record lookup: `Ok(None)` means the name has no such record.
type Lookup<T> = Result<Option<T>, ResolveError>;

// --- MX ---

/// Mail exchangers, ordered by preference. The provider label is added at assembly.
pub struct MxProbe;

#[async_trait]
impl Probe for MxProbe {
    fn kind(&self) -> ProbeKind {
        ProbeKind::Mx
    }

    fn deadline(&self, config: &AuditConfig) -> Duration {
        config.probes.dns()
    }

    async fn run(&self, target: &AuditTarget, _ctx: &ProbeContext, env: &ProbeEnv, budget: Duration) -> ProbeResult {
        let hosts = lookup_mx(&env.resolver, target.as_str(), Budget::new(budget)).await?;
        info!(target = %target, count = hosts.len(), "MX lookup finished.");
        Ok(SectionBuilder::new().list(fields::MX_RECORDS, hosts).build())
    }
}

async fn lookup_mx(resolver: &TokioAsyncResolver, target: &str, budget: Budget) -> Result<Vec<String>, ProbeError> {
    let answer = budget
        .within(LOOKUP_TIMEOUT, resolver.mx_lookup(target))
        .await
        .ok_or(ProbeError::Timeout("MX lookup"))?;
    match answer {
        Ok(answer) => {
            let mut records: Vec<(u16, String)> = answer
                .iter()
                .map(|mx| (mx.preference(), trim_dot(&mx.exchange().to_string())))
                .filter(|(_, host)| !host.is_empty())
                .collect();
            records.sort();
            Ok(records.into_iter().map(|(_, host)| host).collect())
        }
        Err(e) if is_no_records(&e) => {
            debug!(target, "Domain publishes no MX records.");
            Ok(Vec::new())
        }
        Err(e) => Err(e.into()),
    }
}

// --- TXT / email authentication ---

/// Raw TXT records plus an SPF, DMARC and DKIM review of them.
pub struct TxtProbe;

#[async_trait]
impl Probe for TxtProbe {
    fn kind(&self) -> ProbeKind {
        ProbeKind::Txt
    }

    fn deadline(&self, config: &AuditConfig) -> Duration {
        config.probes.dns()
    }

    async fn run(&self, target: &AuditTarget, _ctx: &ProbeContext, env: &ProbeEnv, budget: Duration) -> ProbeResult {
        let budget = Budget::new(budget);
        let domain = target.as_str();
        info!(target = %target, "Starting TXT record scan.");

        // The root TXT set is the only lookup whose failure fails the probe.
        let records = lookup_txt(&env.resolver, domain, budget).await?;
        let (dmarc, dkim) = tokio::join!(
            lookup_dmarc(&env.resolver, domain, budget),
            lookup_dkim(&env.resolver, domain, budget),
        );
        let results = MailAuthResults {
            spf: Ok(find_spf(&records)),
            dmarc,
            dkim,
        };
        let findings = analyze_dns_results(&results);
        info!(target = %target, findings = findings.len(), "TXT record scan finished.");

        Ok(txt_section(&records, &results, &findings))
    }
}

/// The email-authentication view of a domain's DNS.
struct MailAuthResults {
    spf: Lookup<String>,
    dmarc: Lookup<DmarcData>,
    dkim: Lookup<Vec<String>>,
}

struct DmarcData {
    record: String,
    policy: Option<String>,
}

fn txt_section(records: &[String], results: &MailAuthResults, findings: &[AnalysisFinding]) -> SectionData {
    let spf = results.spf.as_ref().ok().cloned().flatten();
    let dmarc = results.dmarc.as_ref().ok().and_then(Option::as_ref);
    let selectors = results.dkim.as_ref().ok().cloned().flatten().unwrap_or_default();

    SectionBuilder::new()
        .list("TXT Records", records.iter().cloned())
        .maybe_text("SPF Record", spf)
        .maybe_text("DMARC Record", dmarc.map(|d| d.record.clone()))
        .maybe_text("DMARC Policy", dmarc.and_then(|d| d.policy.clone()))
        .list("DKIM Selectors", selectors)
        .list("Verified Services", verified_services(records))
        .value(fields::ISSUES, Value::Array(describe(findings)))
        .build()
}

/// Analyzes the collected records and generates security findings.
///
/// Lookups that errored produce no finding; only a confirmed absence does.
fn analyze_dns_results(results: &MailAuthResults) -> Vec<AnalysisFinding> {
    let mut analyses = Vec::new();

    match &results.dmarc {
        Ok(Some(dmarc)) => {
            if dmarc.policy.as_deref() == Some("none") {
                debug!("DMARC analysis: Found policy 'none', adding Warning.");
                analyses.push(AnalysisFinding::new(Severity::Warning, "DNS_DMARC_POLICY_NONE"));
            }
        }
        Ok(None) => {
            debug!("DMARC analysis: No record found, adding Critical finding.");
            analyses.push(AnalysisFinding::new(Severity::Critical, "DNS_DMARC_MISSING"));
        }
        Err(_) => {}
    }

    match &results.spf {
        Ok(Some(spf)) => {
            // Softfail (~all) and Neutral (?all) are weaker than Hardfail (-all).
            if spf.ends_with("~all") {
                analyses.push(AnalysisFinding::new(Severity::Info, "DNS_SPF_POLICY_SOFTFAIL"));
            } else if spf.ends_with("?all") {
                analyses.push(AnalysisFinding::new(Severity::Info, "DNS_SPF_POLICY_NEUTRAL"));
            }
        }
        Ok(None) => {
            debug!("SPF analysis: No record found, adding Warning finding.");
            analyses.push(AnalysisFinding::new(Severity::Warning, "DNS_SPF_MISSING"));
        }
        Err(_) => {}
    }

    if let Ok(None) = &results.dkim {
        analyses.push(AnalysisFinding::new(Severity::Info, "DNS_DKIM_MISSING"));
    }

    analyses
}

async fn lookup_txt(resolver: &TokioAsyncResolver, target: &str, budget: Budget) -> Result<Vec<String>, ProbeError> {
    let answer = budget
        .within(LOOKUP_TIMEOUT, resolver.txt_lookup(target))
        .await
        .ok_or(ProbeError::Timeout("TXT lookup"))?;
    match answer {
        Ok(answer) => Ok(answer.iter().map(|txt| txt.to_string()).collect()),
        Err(e) if is_no_records(&e) => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

/// SPF records are stored in TXT records and start with "v=spf1".
fn find_spf(records: &[String]) -> Option<String> {
    records
        .iter()
        .find(|r| r.trim_start().to_ascii_lowercase().starts_with("v=spf1"))
        .cloned()
}

/// DMARC records are stored in a TXT record at the `_dmarc` subdomain.
async fn lookup_dmarc(resolver: &TokioAsyncResolver, target: &str, budget: Budget) -> Lookup<DmarcData> {
    let dmarc_target = format!("_dmarc.{target}");
    debug!(target = %dmarc_target, "Looking up DMARC record.");
    let answer = budget
        .within(LOOKUP_TIMEOUT, resolver.txt_lookup(dmarc_target.as_str()))
        .await
        .unwrap_or_else(|| Err(ResolveErrorKind::Timeout.into()));
    match answer {
        Ok(answer) => Ok(answer
            .iter()
            .map(|txt| txt.to_string())
            .find(|r| r.to_ascii_lowercase().starts_with("v=dmarc1"))
            .map(|record| DmarcData { policy: dmarc_policy(&record), record })),
        Err(e) if is_no_records(&e) => Ok(None),
        Err(e) => {
            warn!(target = %dmarc_target, error = %e, "DMARC lookup failed.");
            Err(e)
        }
    }
}

/// Parses the policy (`p=`) tag from a DMARC record.
fn dmarc_policy(record: &str) -> Option<String> {
    record
        .split(';')
        .filter_map(|tag| tag.trim().split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("p"))
        .map(|(_, value)| value.trim().to_ascii_lowercase())
        .filter(|p| !p.is_empty())
}

/// Checks the common selectors at `selector._domainkey.domain` and returns those that hold a
/// DKIM key. Stops early once the probe's budget is spent.
async fn lookup_dkim(resolver: &TokioAsyncResolver, target: &str, budget: Budget) -> Lookup<Vec<String>> {
    let mut found = Vec::new();
    for selector in COMMON_DKIM_SELECTORS {
        if budget.remaining().is_zero() {
            debug!(target, "DKIM scan stopped at the probe deadline.");
            break;
        }
        let dkim_target = format!("{selector}._domainkey.{target}");
        let Some(answer) = budget.within(LOOKUP_TIMEOUT, resolver.txt_lookup(dkim_target)).await else {
            break;
        };
        match answer {
            Ok(records) => {
                let has_key = records.iter().any(|txt| {
                    let record = txt.to_string();
                    record.contains("v=DKIM1") || record.contains("p=")
                });
                if has_key {
                    debug!(selector, "Found valid DKIM record.");
                    found.push(selector.to_string());
                }
            }
            // Most selectors do not exist; that is expected.
            Err(e) if is_no_records(&e) => {}
            Err(e) => debug!(selector, error = %e, "DKIM lookup for this selector failed."),
        }
    }

    if found.is_empty() { Ok(None) } else { Ok(Some(found)) }
}

fn verified_services(records: &[String]) -> Vec<String> {
    let mut services: Vec<String> = VERIFICATION_PREFIXES
        .iter()
        .filter(|(prefix, _)| records.iter().any(|r| r.to_ascii_lowercase().starts_with(prefix)))
        .map(|(_, service)| service.to_string())
        .collect();
    services.dedup();
    services
}

fn trim_dot(name: &str) -> String {
    name.trim_end_matches('.').to_ascii_lowercase()
}
