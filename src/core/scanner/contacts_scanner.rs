// src/core/scanner/contacts_scanner.rs

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::AuditConfig;
use crate::core::classifier::contacts::{extract, select};
use crate::core::domain::AuditTarget;
use crate::core::models::{ProbeContext, ProbeKind, ProbeResult, SectionBuilder, SectionData};
use crate::core::net::http::FetchError;
use crate::core::probe::{Probe, ProbeEnv};

/// The only pages read for addresses.
const CONTACT_PATHS: [&str; 3] = ["/", "/contact", "/about"];

/// Public contact addresses found on the homepage and the usual contact pages.
pub struct ContactsProbe;

#[async_trait]
impl Probe for ContactsProbe {
    fn kind(&self) -> ProbeKind {
        ProbeKind::Contacts
    }

    fn deadline(&self, config: &AuditConfig) -> Duration {
        config.probes.http()
    }

    async fn run(&self, target: &AuditTarget, _ctx: &ProbeContext, env: &ProbeEnv, budget: Duration) -> ProbeResult {
        let domain = target.as_str();
        let (home, contact, about) = tokio::join!(
            env.http.fetch(domain, CONTACT_PATHS[0], budget),
            env.http.fetch(domain, CONTACT_PATHS[1], budget),
            env.http.fetch(domain, CONTACT_PATHS[2], budget),
        );

        let mut pages: Vec<(&str, String)> = Vec::new();
        let mut last_error: Option<FetchError> = None;
        for (path, fetched) in CONTACT_PATHS.into_iter().zip([home, contact, about]) {
            match fetched {
                Ok(page) => pages.push((path, page.body)),
                Err(e) => {
                    debug!(target = %target, path, error = %e, "Contact page unavailable.");
                    last_error = Some(e);
                }
            }
        }
        if pages.is_empty() {
            if let Some(e) = last_error {
                return Err(e.into());
            }
        }

        let section = contacts_section(&pages, domain, env.config.max_contact_emails);
        info!(target = %target, pages = pages.len(), "Contact scan finished.");
        Ok(section)
    }
}

fn contacts_section(pages: &[(&str, String)], domain: &str, cap: usize) -> SectionData {
    let mut addresses = BTreeSet::new();
    let mut sources = Vec::new();
    for (path, body) in pages {
        let found = extract(body);
        if !found.is_empty() {
            sources.push(path.to_string());
            addresses.extend(found);
        }
    }

    SectionBuilder::new()
        .list("Emails", select(addresses, domain, cap))
        .list("Sources", sources)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_pages_and_records_sources() {
        let pages = vec![
            ("/", "<p>no contact here</p>".to_string()),
            ("/contact", r#"<a href="mailto:hello@example.com">Mail</a> support@vendor.io"#.to_string()),
            ("/about", "Press: press@example.com".to_string()),
        ];
        let section = contacts_section(&pages, "example.com", 10);
        assert_eq!(section["Emails"], serde_json::json!(["hello@example.com", "press@example.com"]));
        assert_eq!(section["Sources"], serde_json::json!(["/contact", "/about"]));
    }

    #[test]
    fn cap_limits_the_list() {
        let body: String = (0..5).map(|i| format!("user{i}@example.com ")).collect();
        let section = contacts_section(&[("/", body)], "example.com", 2);
        assert_eq!(section["Emails"].as_array().unwrap().len(), 2);
    }
}
