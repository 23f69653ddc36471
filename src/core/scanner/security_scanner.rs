// src/core/scanner/security_scanner.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::AuditConfig;
use crate::core::domain::AuditTarget;
use crate::core::errors::ProbeError;
use crate::core::knowledge_base::describe;
use crate::core::models::{ProbeContext, ProbeKind, ProbeResult, SectionBuilder, SectionData, fields};
use crate::core::probe::{Probe, ProbeEnv};
use crate::core::scanner::headers_scanner::{HeadersResults, audit_headers};
use crate::core::scanner::ssl_scanner::{SslData, analyze_ssl_results, inspect_certificate};
use crate::core::scanner::{Budget, root_headers};

const UNAVAILABLE: &str = "Unavailable";

/// Certificate and security-header review. The two halves run concurrently and the probe
/// only fails when both do.
pub struct SecurityProbe;

#[async_trait]
impl Probe for SecurityProbe {
    fn kind(&self) -> ProbeKind {
        ProbeKind::Security
    }

    fn deadline(&self, config: &AuditConfig) -> Duration {
        config.probes.http().max(config.probes.tls())
    }

    async fn run(&self, target: &AuditTarget, _ctx: &ProbeContext, env: &ProbeEnv, budget: Duration) -> ProbeResult {
        let budget = Budget::new(budget);
        let domain = target.as_str();
        info!(target = %target, "Starting security scan.");

        let (ssl, headers) = tokio::join!(
            inspect_certificate(domain, budget.limit(env.config.probes.tls())),
            root_headers(&env.http, domain, budget.limit(env.config.probes.http())),
        );

        let headers = match headers {
            Ok(map) => Some(audit_headers(&map)),
            Err(e) => {
                debug!(target = %target, error = %e, "Security headers unavailable.");
                if let Err(tls) = &ssl {
                    return Err(ProbeError::Empty(format!("TLS: {tls}; headers: {e}")));
                }
                None
            }
        };

        let section = security_section(&ssl, headers.as_ref(), Utc::now());
        info!(target = %target, tls = ssl.is_ok(), headers = headers.is_some(), "Security scan finished.");
        Ok(section)
    }
}

fn security_section(
    ssl: &Result<SslData, ProbeError>,
    headers: Option<&HeadersResults>,
    now: DateTime<Utc>,
) -> SectionData {
    let mut section = SectionBuilder::new();
    let mut findings = analyze_ssl_results(ssl, now);

    section = match ssl {
        Ok(data) => {
            let cert = &data.certificate;
            section
                .text("SSL Certificate", cert.status(now).label())
                .text("Trusted", if data.trusted { "Yes" } else { "No" })
                .text("Issuer", cert.issuer_name.clone())
                .text("Subject", cert.subject_name.clone())
                .text("SSL Expiry", cert.not_after.format("%Y-%m-%d").to_string())
                .value("Days Until Expiry", cert.days_until_expiry(now))
                .maybe_text("TLS Version", data.tls_version)
        }
        Err(_) => section.text("SSL Certificate", UNAVAILABLE),
    };

    if let Some(headers) = headers {
        for (label, status) in &headers.statuses {
            section = section.text(label, status.clone());
        }
        findings.extend(headers.analysis.iter().cloned());
    }

    section.value(fields::ISSUES, Value::Array(describe(&findings))).build()
}
