// src/core/scanner/performance_scanner.rs

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;

use crate::config::AuditConfig;
use crate::core::domain::AuditTarget;
use crate::core::models::{ProbeContext, ProbeKind, ProbeResult, SectionBuilder, SectionData};
use crate::core::net::http::FetchedPage;
use crate::core::probe::{Probe, ProbeEnv};

/// Wall-clock load of the homepage, including scheme and User-Agent fallbacks.
pub struct PerformanceProbe;

#[async_trait]
impl Probe for PerformanceProbe {
    fn kind(&self) -> ProbeKind {
        ProbeKind::Performance
    }

    fn deadline(&self, config: &AuditConfig) -> Duration {
        config.probes.performance()
    }

    async fn run(&self, target: &AuditTarget, _ctx: &ProbeContext, env: &ProbeEnv, budget: Duration) -> ProbeResult {
        let started = Instant::now();
        let page = env.http.fetch(target.as_str(), "/", budget).await?;
        let elapsed = started.elapsed();
        info!(target = %target, elapsed_ms = elapsed.as_millis() as u64, "Performance scan finished.");
        Ok(performance_section(&page, elapsed))
    }
}

fn score(load_secs: f64) -> &'static str {
    if load_secs < 1.0 {
        "Excellent"
    } else if load_secs < 2.5 {
        "Good"
    } else if load_secs < 4.0 {
        "Average"
    } else {
        "Poor"
    }
}

fn performance_section(page: &FetchedPage, elapsed: Duration) -> SectionData {
    let load_secs = elapsed.as_secs_f64();
    let size_kb = page.body.len() as f64 / 1024.0;
    SectionBuilder::new()
        .text("Load Time", format!("{load_secs:.2}s"))
        .text("Page Size", format!("{size_kb:.1} KB"))
        .text("Score", score(load_secs))
        .value("Status Code", page.status.as_u16())
        .text("Final URL", page.final_url.as_str())
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;
    use reqwest::header::HeaderMap;
    use url::Url;

    #[test]
    fn score_thresholds() {
        assert_eq!(score(0.4), "Excellent");
        assert_eq!(score(1.0), "Good");
        assert_eq!(score(2.49), "Good");
        assert_eq!(score(2.5), "Average");
        assert_eq!(score(4.0), "Poor");
    }

    #[test]
    fn section_formats_time_and_size() {
        let page = FetchedPage {
            body: "x".repeat(2048),
            final_url: Url::parse("https://example.com/").unwrap(),
            status: StatusCode::OK,
            headers: HeaderMap::new(),
        };
        let section = performance_section(&page, Duration::from_millis(1234));
        assert_eq!(section["Load Time"], "1.23s");
        assert_eq!(section["Page Size"], "2.0 KB");
        assert_eq!(section["Score"], "Good");
        assert_eq!(section["Status Code"], 200);
        assert_eq!(section["Final URL"], "https://example.com/");
    }
}
