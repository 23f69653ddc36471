// src/core/scanner/fingerprint_scanner.rs

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::AuditConfig;
use crate::core::classifier::technology::{detect, group_by_category};
use crate::core::domain::AuditTarget;
use crate::core::errors::ProbeError;
use crate::core::models::{ProbeContext, ProbeKind, ProbeResult, SectionData};
use crate::core::probe::{Probe, ProbeEnv};

/// Technology fingerprinting over the homepage's headers and markup.
pub struct TechnologyProbe;

#[async_trait]
impl Probe for TechnologyProbe {
    fn kind(&self) -> ProbeKind {
        ProbeKind::Technology
    }

    fn deadline(&self, config: &AuditConfig) -> Duration {
        config.probes.http()
    }

    async fn run(&self, target: &AuditTarget, _ctx: &ProbeContext, env: &ProbeEnv, budget: Duration) -> ProbeResult {
        info!(target = %target, "Starting technology fingerprint scan.");
        let page = env.http.fetch(target.as_str(), "/", budget).await?;
        debug!(url = %page.final_url, "Fetched homepage for fingerprinting.");

        let technologies = detect(&page.headers, &page.body);
        if technologies.is_empty() {
            return Err(ProbeError::Empty("no technologies recognized".into()));
        }
        info!(target = %target, count = technologies.len(), "Technology fingerprint scan finished.");
        Ok(tech_section(group_by_category(&technologies)))
    }
}

fn tech_section(groups: BTreeMap<String, Vec<String>>) -> SectionData {
    groups
        .into_iter()
        .map(|(category, names)| (category, names.into_iter().map(serde_json::Value::String).collect()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue};

    #[test]
    fn section_groups_technologies_by_category() {
        let mut headers = HeaderMap::new();
        headers.insert("server", HeaderValue::from_static("nginx/1.25.3"));
        let body = r#"<html><head><meta name="generator" content="WordPress 6.4.2"></head></html>"#;

        let section = tech_section(group_by_category(&detect(&headers, body)));
        assert_eq!(section["Web Server"][0], "Nginx 1.25.3");
        assert_eq!(section["CMS"][0], "WordPress 6.4.2");
    }
}
