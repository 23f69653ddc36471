// src/core/scanner/wordpress_scanner.rs

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::AuditConfig;
use crate::core::classifier::wordpress::{
    ENDPOINTS, MARKER_THRESHOLD, detect_plugins, detect_theme, detect_version, detection_signals,
};
use crate::core::domain::AuditTarget;
use crate::core::models::{ProbeContext, ProbeKind, ProbeResult, SectionBuilder, SectionData};
use crate::core::probe::{Probe, ProbeEnv};
use crate::core::scanner::Budget;

/// What a WordPress endpoint body must contain to count as a hit. Sites that answer every
/// path with the homepage would otherwise look like WordPress.
const ENDPOINT_EVIDENCE: [(&str, &[&str]); 3] = [
    ("/wp-json/", &["\"namespaces\"", "wp/v2"]),
    ("/wp-login.php", &["user_login", "wp-submit"]),
    ("/readme.html", &["WordPress"]),
];

/// CMS detection, WordPress only: version, theme and plugins.
pub struct WordPressProbe;

#[async_trait]
impl Probe for WordPressProbe {
    fn kind(&self) -> ProbeKind {
        ProbeKind::Cms
    }

    fn deadline(&self, config: &AuditConfig) -> Duration {
        config.probes.http()
    }

    async fn run(&self, target: &AuditTarget, _ctx: &ProbeContext, env: &ProbeEnv, budget: Duration) -> ProbeResult {
        let budget = Budget::new(budget);
        let domain = target.as_str();
        let home = env.http.fetch(domain, "/", budget.remaining()).await?;

        let mut signals: Vec<String> = detection_signals(&home.body).into_iter().map(String::from).collect();
        let mut readme: Option<String> = None;

        if signals.len() < MARKER_THRESHOLD {
            debug!(target = %target, score = signals.len(), "Homepage inconclusive, probing WordPress endpoints.");
            for path in ENDPOINTS {
                let Ok(page) = env.http.fetch(domain, path, budget.remaining()).await else {
                    continue;
                };
                if endpoint_hit(path, &page.body) {
                    signals.push(path.to_string());
                    if path == "/readme.html" {
                        readme = Some(page.body);
                    }
                    break;
                }
            }
        }

        let is_wordpress = signals.len() >= MARKER_THRESHOLD || signals.iter().any(|s| s.starts_with('/'));
        if is_wordpress && readme.is_none() {
            readme = env
                .http
                .fetch(domain, "/readme.html", budget.remaining())
                .await
                .ok()
                .map(|page| page.body)
                .filter(|body| endpoint_hit("/readme.html", body));
        }

        info!(target = %target, is_wordpress, signals = signals.len(), "WordPress scan finished.");
        Ok(wordpress_section(&home.body, readme.as_deref(), is_wordpress, signals))
    }
}

fn endpoint_hit(path: &str, body: &str) -> bool {
    ENDPOINT_EVIDENCE
        .iter()
        .find(|(p, _)| *p == path)
        .is_some_and(|(_, needles)| needles.iter().any(|n| body.contains(n)))
}

fn wordpress_section(home: &str, readme: Option<&str>, is_wordpress: bool, signals: Vec<String>) -> SectionData {
    let mut section = SectionBuilder::new()
        .text("Is WordPress", if is_wordpress { "Yes" } else { "No" })
        .list("Detection Signals", signals);

    if is_wordpress {
        let pages: Vec<&str> = std::iter::once(home).chain(readme).collect();
        section = section
            .maybe_text("Version", detect_version(home))
            .maybe_text("Theme", detect_theme(home))
            .list("Plugins", detect_plugins(&pages));
    }
    section.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    const WP_HOME: &str = r#"<html><head>
        <meta name="generator" content="WordPress 6.4.2" />
        <link rel="stylesheet" href="https://example.com/wp-content/themes/twentytwentyfour/style.css" />
        <script src="https://example.com/wp-includes/js/wp-embed.min.js?ver=6.4.2"></script>
        <script src="https://example.com/wp-content/plugins/contact-form-7/includes/js/index.js"></script>
    </head></html>"#;

    #[test]
    fn homepage_markers_fill_the_section() {
        let signals: Vec<String> = detection_signals(WP_HOME).into_iter().map(String::from).collect();
        assert!(signals.len() >= MARKER_THRESHOLD);

        let section = wordpress_section(WP_HOME, Some("<h1>WordPress</h1> yoast"), true, signals);
        assert_eq!(section["Is WordPress"], "Yes");
        assert_eq!(section["Version"], "6.4.2");
        assert_eq!(section["Theme"], "Twentytwentyfour");
        let plugins: Vec<&str> = section["Plugins"].as_array().unwrap().iter().filter_map(|v| v.as_str()).collect();
        assert!(plugins.contains(&"Contact Form 7"));
        assert!(plugins.contains(&"Yoast SEO"));
    }

    #[test]
    fn non_wordpress_sites_only_report_the_verdict() {
        let section = wordpress_section("<html>plain</html>", None, false, Vec::new());
        assert_eq!(section["Is WordPress"], "No");
        assert!(!section.contains_key("Version"));
        assert!(!section.contains_key("Plugins"));
    }

    #[test]
    fn endpoints_need_wordpress_content() {
        assert!(endpoint_hit("/wp-json/", r#"{"name":"Blog","namespaces":["oembed/1.0","wp/v2"]}"#));
        assert!(endpoint_hit("/wp-login.php", r#"<input name="log" id="user_login">"#));
        assert!(!endpoint_hit("/wp-login.php", "<html>Welcome to our homepage</html>"));
        assert!(!endpoint_hit("/unknown", "WordPress"));
    }
}
