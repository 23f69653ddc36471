// src/core/scanner/whois_scanner.rs

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde_json::Value;
use std::time::Duration;
use tracing::info;

use crate::config::AuditConfig;
use crate::core::domain::AuditTarget;
use crate::core::models::{ProbeContext, ProbeKind, ProbeResult, SectionBuilder, SectionData, fields};
use crate::core::net::whois::{WhoisRecord, days_until, format_date};
use crate::core::probe::{Probe, ProbeEnv};

/// Registration data. Also the source of the nameservers Hosting uses for provider inference.
pub struct WhoisProbe;

#[async_trait]
impl Probe for WhoisProbe {
    fn kind(&self) -> ProbeKind {
        ProbeKind::Whois
    }

    fn deadline(&self, config: &AuditConfig) -> Duration {
        config.probes.whois()
    }

    fn provides_context(&self) -> bool {
        true
    }

    fn contribute(&self, data: &SectionData, ctx: &mut ProbeContext) {
        if let Some(list) = data.get(fields::NAME_SERVERS).and_then(Value::as_array) {
            ctx.nameservers = list.iter().filter_map(|v| v.as_str().map(String::from)).collect();
        }
    }

    async fn run(&self, target: &AuditTarget, _ctx: &ProbeContext, env: &ProbeEnv, budget: Duration) -> ProbeResult {
        info!(target = %target, "Starting WHOIS lookup.");
        let record = env.whois.lookup(target, budget).await?;
        info!(target = %target, nameservers = record.nameservers.len(), "WHOIS lookup finished.");
        Ok(whois_section(&record, Utc::now().date_naive()))
    }
}

fn whois_section(record: &WhoisRecord, today: NaiveDate) -> SectionData {
    let mut section = SectionBuilder::new()
        .maybe_text("Registrar", record.registrar.clone())
        .maybe_text("Created Date", record.created.as_deref().map(format_date))
        .maybe_text("Expiry Date", record.expiry.as_deref().map(format_date))
        .maybe_text("Updated Date", record.updated.as_deref().map(format_date))
        .list(fields::NAME_SERVERS, record.nameservers.iter().cloned())
        .list("Domain Status", record.status.iter().cloned());

    if let Some(days) = record.expiry.as_deref().and_then(|raw| days_until(raw, today)) {
        section = section.value("Days Until Expiry", days);
    }
    section.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::net::whois::parse_response;

    #[test]
    fn section_normalizes_dates_and_counts_days() {
        let record = parse_response(
            "Registrar: Example Registrar, Inc.\n\
             Creation Date: 1995-08-14T04:00:00Z\n\
             Registry Expiry Date: 2025-08-13T04:00:00Z\n\
             Name Server: NS1.EXAMPLE.NET\n\
             Domain Status: ok https://icann.org/epp#ok\n",
        );
        let today = NaiveDate::from_ymd_opt(2025, 8, 3).unwrap();
        let section = whois_section(&record, today);

        assert_eq!(section["Registrar"], "Example Registrar, Inc.");
        assert_eq!(section["Created Date"], "1995-08-14");
        assert_eq!(section["Expiry Date"], "2025-08-13");
        assert_eq!(section["Days Until Expiry"], 10);
        assert_eq!(section[fields::NAME_SERVERS][0], "ns1.example.net");
        assert_eq!(section["Domain Status"][0], "ok");
        assert!(!section.contains_key("Updated Date"));
    }

    #[test]
    fn contributes_nameservers_to_context() {
        let data = SectionBuilder::new()
            .list(fields::NAME_SERVERS, ["ns1.cloudflare.com", "ns2.cloudflare.com"])
            .build();
        let mut ctx = ProbeContext::default();
        WhoisProbe.contribute(&data, &mut ctx);
        assert_eq!(ctx.nameservers, vec!["ns1.cloudflare.com", "ns2.cloudflare.com"]);
    }
}
