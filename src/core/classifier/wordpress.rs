// src/core/classifier/wordpress.rs

//! WordPress fingerprints: marker scoring, version, theme and plugin tables.

use once_cell::sync::Lazy;
use regex::Regex;

/// Score at which the homepage alone proves WordPress.
pub const MARKER_THRESHOLD: usize = 2;
/// Probed in order when the homepage markers are inconclusive.
pub const ENDPOINTS: [&str; 3] = ["/wp-json/", "/wp-login.php", "/readme.html"];
pub const MAX_PLUGINS: usize = 15;

struct Marker {
    signal: &'static str,
    pattern: &'static Lazy<Regex>,
}

static RE_WP_CONTENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)wp-content").unwrap());
static RE_WP_INCLUDES: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)wp-includes").unwrap());
static RE_WP_JSON: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(?i)/wp-json/|"wp/v2"#).unwrap());
static RE_WP_ADMIN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)/wp-admin").unwrap());
static RE_XMLRPC: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)xmlrpc\.php").unwrap());
static RE_GENERATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)<meta\s+name=["']generator["']\s+content=["']WordPress\s*([0-9.]+)?"#).unwrap());
static RE_EMBED_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)wp-embed(?:\.min)?\.js\?ver=([0-9][0-9.]*)").unwrap());
static RE_THEME: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(?i)/wp-content/themes/([^/"'?#\s]+)/"#).unwrap());

static MARKERS: &[Marker] = &[
    Marker { signal: "wp-content", pattern: &RE_WP_CONTENT },
    Marker { signal: "wp-includes", pattern: &RE_WP_INCLUDES },
    Marker { signal: "wp-json", pattern: &RE_WP_JSON },
    Marker { signal: "wp-admin", pattern: &RE_WP_ADMIN },
    Marker { signal: "xmlrpc", pattern: &RE_XMLRPC },
    Marker { signal: "generator", pattern: &RE_GENERATOR },
];

struct PluginSignature {
    name: &'static str,
    pattern: Lazy<Regex>,
}

macro_rules! plugin {
    ($name:expr, $re:expr) => {
        PluginSignature { name: $name, pattern: Lazy::new(|| Regex::new($re).unwrap()) }
    };
}

static PLUGINS: [PluginSignature; 12] = [
    plugin!("Yoast SEO", r"(?i)yoast|wpseo"),
    plugin!("WooCommerce", r"(?i)woocommerce|/wc-blocks"),
    plugin!("Elementor", r"(?i)elementor"),
    plugin!("Contact Form 7", r"(?i)contact-form-7|wpcf7"),
    plugin!("Akismet", r"(?i)akismet"),
    plugin!("Jetpack", r"(?i)jetpack"),
    plugin!("Wordfence", r"(?i)wordfence"),
    plugin!("All in One SEO", r"(?i)aioseo"),
    plugin!("WP Rocket", r"(?i)wp-rocket"),
    plugin!("Rank Math", r"(?i)rank-math"),
    plugin!("WPForms", r"(?i)wpforms"),
    plugin!("Slider Revolution", r"(?i)revslider"),
];

/// Homepage markers that were found, in table order. Their count is the marker score.
pub fn detection_signals(html: &str) -> Vec<&'static str> {
    MARKERS
        .iter()
        .filter(|m| m.pattern.is_match(html))
        .map(|m| m.signal)
        .collect()
}

pub fn detect_version(html: &str) -> Option<String> {
    [&RE_GENERATOR, &RE_EMBED_VERSION].into_iter().find_map(|re| {
        re.captures(html)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim_end_matches('.').to_string())
            .filter(|v| !v.is_empty())
    })
}

/// The active theme slug, title-cased (`twentytwentyfour` → `Twentytwentyfour`).
pub fn detect_theme(html: &str) -> Option<String> {
    let slug = RE_THEME.captures(html)?.get(1)?.as_str();
    Some(title_case(slug))
}

/// Plugins whose signature appears in any of `pages`, deduplicated and capped.
pub fn detect_plugins(pages: &[&str]) -> Vec<String> {
    PLUGINS
        .iter()
        .filter(|plugin| pages.iter().any(|page| plugin.pattern.is_match(page)))
        .map(|plugin| plugin.name.to_string())
        .take(MAX_PLUGINS)
        .collect()
}

fn title_case(slug: &str) -> String {
    let mut out = String::with_capacity(slug.len());
    let mut at_word_start = true;
    for c in slug.chars() {
        if c.is_alphanumeric() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOMEPAGE: &str = r#"<html><head>
        <meta name="generator" content="WordPress 6.5.2" />
        <link rel="stylesheet" href="https://example.com/wp-content/themes/twentytwentyfour/style.css?ver=1.1" />
        <link rel="stylesheet" href="https://example.com/wp-content/plugins/contact-form-7/includes/css/styles.css" />
        <script src="https://example.com/wp-includes/js/wp-embed.min.js?ver=6.5.2"></script>
        <link rel="https://api.w.org/" href="https://example.com/wp-json/" />
    </head></html>"#;

    #[test]
    fn scores_homepage_markers() {
        let signals = detection_signals(HOMEPAGE);
        assert!(signals.len() >= MARKER_THRESHOLD);
        assert!(signals.contains(&"generator"));
        assert!(signals.contains(&"wp-json"));
    }

    #[test]
    fn plain_page_scores_zero() {
        assert!(detection_signals("<html><body>Just a page</body></html>").is_empty());
    }

    #[test]
    fn version_prefers_generator_then_embed_script() {
        assert_eq!(detect_version(HOMEPAGE).as_deref(), Some("6.5.2"));
        let embed_only = r#"<script src="/wp-includes/js/wp-embed.min.js?ver=5.9.3"></script>"#;
        assert_eq!(detect_version(embed_only).as_deref(), Some("5.9.3"));
        assert_eq!(detect_version("<html></html>"), None);
    }

    #[test]
    fn theme_slug_is_title_cased() {
        assert_eq!(detect_theme(HOMEPAGE).as_deref(), Some("Twentytwentyfour"));
        assert_eq!(title_case("hello-elementor"), "Hello-Elementor");
        assert_eq!(detect_theme("<html></html>"), None);
    }

    #[test]
    fn plugins_are_found_across_pages() {
        let readme = "Powered by Akismet anti-spam";
        let plugins = detect_plugins(&[HOMEPAGE, readme]);
        assert_eq!(plugins, vec!["Contact Form 7", "Akismet"]);
    }
}
