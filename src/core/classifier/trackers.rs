// src/core/classifier/trackers.rs

//! Advertising, analytics and social-pixel detection.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::BTreeSet;

/// Inline script bodies are only scanned up to this many characters each.
pub const INLINE_SCRIPT_CAP: usize = 5000;

struct TrackerSignature {
    name: &'static str,
    pattern: Lazy<Regex>,
}

macro_rules! tracker {
    ($name:literal, $re:literal) => {
        TrackerSignature { name: $name, pattern: Lazy::new(|| Regex::new(concat!("(?i)", $re)).unwrap()) }
    };
}

static AD_NETWORKS: [TrackerSignature; 7] = [
    tracker!("Google Ads", r"googlesyndication\.com|doubleclick\.net|googleadservices\.com|adsbygoogle"),
    tracker!("Google AdSense", r"pagead2\.googlesyndication\.com|adsense\.google\.com"),
    tracker!("Amazon Associates", r"amazon-adsystem\.com|assoc-amazon\.com"),
    tracker!("Media.net", r"contextual\.media\.net|\bmedia\.net/"),
    tracker!("Propeller Ads", r"propellerads\.com"),
    tracker!("Adsterra", r"adsterra\.com"),
    tracker!("MonetizeMore", r"monetizemore\.com"),
];

static ANALYTICS: [TrackerSignature; 9] = [
    tracker!("Google Analytics", r"google-analytics\.com|\bga\(|gtag\(|gtag/js|analytics\.js"),
    tracker!("Google Tag Manager", r"googletagmanager\.com/gtm\.js|googletagmanager\.com/ns\.html"),
    tracker!("Facebook Pixel", r"connect\.facebook\.net|\bfbq\(|facebook\.com/tr\?"),
    tracker!("Microsoft Clarity", r"clarity\.ms"),
    tracker!("Hotjar", r"hotjar\.com"),
    tracker!("Mixpanel", r"mixpanel\.com"),
    tracker!("Amplitude", r"amplitude\.com"),
    tracker!("TikTok Pixel", r"tiktok\.com/i18n/pixel"),
    tracker!("LinkedIn Insight Tag", r"linkedin\.com/li\.js|snap\.licdn\.com"),
];

static SOCIAL_PIXELS: [TrackerSignature; 5] = [
    tracker!("Facebook Pixel", r"facebook\.com/tr|connect\.facebook\.net/.*/fbevents\.js"),
    tracker!("LinkedIn Insight Tag", r"linkedin\.com/li\.js|px\.ads\.linkedin\.com"),
    tracker!("Twitter Pixel", r"static\.ads-twitter\.com|t\.co/i/adsct|tpxl\.com"),
    tracker!("Pinterest Tag", r"ct\.pinterest\.com|s\.pinimg\.com/ct/"),
    tracker!("TikTok Pixel", r"tiktok\.com/i18n/pixel|analytics\.tiktok\.com"),
];

static SCRIPT: Lazy<Selector> = Lazy::new(|| Selector::parse("script").unwrap());
static EMBED_SRC: Lazy<Selector> = Lazy::new(|| Selector::parse("img[src], iframe[src]").unwrap());

#[derive(Debug, Default, Clone, PartialEq)]
pub struct TrackerFindings {
    pub ad_networks: Vec<String>,
    pub analytics: Vec<String>,
    pub social_pixels: Vec<String>,
}

impl TrackerFindings {
    /// Every distinct tracker name, sorted.
    pub fn tracking_scripts(&self) -> Vec<String> {
        let all: BTreeSet<&String> = self.ad_networks.iter().chain(&self.analytics).chain(&self.social_pixels).collect();
        all.into_iter().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.ad_networks.is_empty() && self.analytics.is_empty() && self.social_pixels.is_empty()
    }
}

/// Collects the places trackers hide: script `src`, inline script bodies, `img`/`iframe` `src`.
fn tracker_haystack(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut parts: Vec<String> = Vec::new();

    for script in document.select(&SCRIPT) {
        if let Some(src) = script.value().attr("src") {
            parts.push(src.to_string());
        }
        let inline: String = script.text().collect::<String>().chars().take(INLINE_SCRIPT_CAP).collect();
        if !inline.trim().is_empty() {
            parts.push(inline);
        }
    }
    for element in document.select(&EMBED_SRC) {
        if let Some(src) = element.value().attr("src") {
            parts.push(src.to_string());
        }
    }
    parts.join("\n")
}

/// Names whose pattern matches, sorted.
fn matching(table: &[TrackerSignature], haystack: &str) -> Vec<String> {
    let mut names: Vec<String> = table
        .iter()
        .filter(|sig| sig.pattern.is_match(haystack))
        .map(|sig| sig.name.to_string())
        .collect();
    names.sort();
    names
}

pub fn classify(html: &str) -> TrackerFindings {
    let haystack = tracker_haystack(html);
    TrackerFindings {
        ad_networks: matching(&AD_NETWORKS, &haystack),
        analytics: matching(&ANALYTICS, &haystack),
        social_pixels: matching(&SOCIAL_PIXELS, &haystack),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_ads_analytics_and_pixels() {
        let html = r#"<html><head>
            <script async src="https://pagead2.googlesyndication.com/pagead/js/adsbygoogle.js"></script>
            <script async src="https://www.googletagmanager.com/gtag/js?id=G-XXXX"></script>
            <script>window.dataLayer = []; function gtag(){dataLayer.push(arguments);} gtag('js', new Date());</script>
        </head><body>
            <img height="1" width="1" src="https://www.facebook.com/tr?id=123&ev=PageView&noscript=1"/>
        </body></html>"#;
        let found = classify(html);
        assert!(found.ad_networks.contains(&"Google Ads".to_string()));
        assert!(found.ad_networks.contains(&"Google AdSense".to_string()));
        assert!(found.analytics.contains(&"Google Analytics".to_string()));
        assert!(found.analytics.contains(&"Facebook Pixel".to_string()));
        assert_eq!(found.social_pixels, vec!["Facebook Pixel"]);
    }

    #[test]
    fn union_has_no_duplicates() {
        let found = TrackerFindings {
            ad_networks: vec!["Google Ads".into()],
            analytics: vec!["Facebook Pixel".into()],
            social_pixels: vec!["Facebook Pixel".into()],
        };
        assert_eq!(found.tracking_scripts(), vec!["Facebook Pixel", "Google Ads"]);
    }

    #[test]
    fn visible_text_is_not_scanned() {
        let html = "<html><body><p>We do not use googlesyndication.com or hotjar.com.</p></body></html>";
        assert!(classify(html).is_empty());
    }

    #[test]
    fn inline_scripts_are_capped() {
        let padding = "x".repeat(INLINE_SCRIPT_CAP);
        let html = format!("<script>{padding} hotjar.com</script>");
        assert!(classify(&html).is_empty());
    }
}
