// src/core/scanner/ads_scanner.rs

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::AuditConfig;
use crate::core::classifier::trackers::{TrackerFindings, classify};
use crate::core::domain::AuditTarget;
use crate::core::models::{ProbeContext, ProbeKind, ProbeResult, SectionBuilder, SectionData};
use crate::core::probe::{Probe, ProbeEnv};

/// Ad networks, analytics and social pixels referenced by the homepage.
pub struct AdsProbe;

#[async_trait]
impl Probe for AdsProbe {
    fn kind(&self) -> ProbeKind {
        ProbeKind::Advertising
    }

    fn deadline(&self, config: &AuditConfig) -> Duration {
        config.probes.http()
    }

    async fn run(&self, target: &AuditTarget, _ctx: &ProbeContext, env: &ProbeEnv, budget: Duration) -> ProbeResult {
        let page = env.http.fetch(target.as_str(), "/", budget).await?;
        let trackers = classify(&page.body);
        if trackers.is_empty() {
            debug!(target = %target, "No trackers referenced by the homepage.");
        }
        info!(target = %target, trackers = trackers.tracking_scripts().len(), "Tracker scan finished.");
        Ok(ads_section(&trackers))
    }
}

// Empty lists are pruned at assembly, so a clean page yields no section.
fn ads_section(trackers: &TrackerFindings) -> SectionData {
    SectionBuilder::new()
        .list("Ad Networks", trackers.ad_networks.iter().cloned())
        .list("Analytics Tools", trackers.analytics.iter().cloned())
        .list("Social Media Pixels", trackers.social_pixels.iter().cloned())
        .list("Tracking Scripts", trackers.tracking_scripts())
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_lists_each_category_and_the_union() {
        let html = r#"<html><head>
            <script async src="https://www.googletagmanager.com/gtag/js?id=G-XYZ"></script>
            <script src="https://pagead2.googlesyndication.com/pagead/js/adsbygoogle.js"></script>
        </head></html>"#;
        let section = ads_section(&classify(html));
        assert!(!section["Ad Networks"].as_array().unwrap().is_empty());
        assert!(!section["Analytics Tools"].as_array().unwrap().is_empty());
        let union = section["Tracking Scripts"].as_array().unwrap().len();
        assert_eq!(
            union,
            section["Ad Networks"].as_array().unwrap().len() + section["Analytics Tools"].as_array().unwrap().len()
        );
    }
}
