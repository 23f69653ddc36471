// src/core/classifier/technology.rs

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{HeaderMap, SET_COOKIE};
use scraper::{Html, Selector};
use std::collections::BTreeMap;

use crate::core::models::Technology;

/// Where a rule looks for its pattern.
enum Check {
    /// A named response header.
    Header(&'static str, &'static Lazy<Regex>),
    /// The `content` of `<meta name=...>`.
    MetaTag(&'static str, &'static Lazy<Regex>),
    /// The raw HTML.
    Body(&'static Lazy<Regex>),
    ScriptSrc(&'static Lazy<Regex>),
    LinkHref(&'static Lazy<Regex>),
    /// All `set-cookie` headers, joined.
    Cookie(&'static Lazy<Regex>),
}

struct FingerprintRule {
    tech_name: &'static str,
    category: &'static str,
    check: Check,
}

// Capture group 1, when present, is the version.
static RE_NGINX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)nginx(?:/([\d.]+))?").unwrap());
static RE_NGINX_ERROR: Lazy<Regex> = Lazy::new(|| Regex::new(r"<hr><center>nginx</center>").unwrap());
static RE_APACHE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Apache(?:/([\d.]+))?").unwrap());
static RE_APACHE_ERROR: Lazy<Regex> = Lazy::new(|| Regex::new(r"Apache Server at").unwrap());
static RE_IIS: Lazy<Regex> = Lazy::new(|| Regex::new(r"Microsoft-IIS(?:/([\d.]+))?").unwrap());
static RE_LITESPEED: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)litespeed").unwrap());
static RE_CADDY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^caddy").unwrap());
static RE_CLOUDFLARE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)cloudflare").unwrap());
static RE_ANY: Lazy<Regex> = Lazy::new(|| Regex::new(r".").unwrap());
static RE_VARNISH: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)varnish").unwrap());
static RE_WORDPRESS: Lazy<Regex> = Lazy::new(|| Regex::new(r"WordPress ?([\d.]+)?").unwrap());
static RE_WP_PATHS: Lazy<Regex> = Lazy::new(|| Regex::new(r"/wp-content/|/wp-includes/").unwrap());
static RE_JOOMLA: Lazy<Regex> = Lazy::new(|| Regex::new(r"Joomla!?(?: ([\d.]+))?").unwrap());
static RE_DRUPAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"Drupal ?([\d.]+)?").unwrap());
static RE_GHOST: Lazy<Regex> = Lazy::new(|| Regex::new(r"Ghost ?([\d.]+)?").unwrap());
static RE_WIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)wix\.com").unwrap());
static RE_SQUARESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)static1\.squarespace\.com").unwrap());
static RE_WEBFLOW: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)webflow").unwrap());
static RE_HUGO: Lazy<Regex> = Lazy::new(|| Regex::new(r"Hugo ?([\d.]+)?").unwrap());
static RE_SHOPIFY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)cdn\.shopify\.com").unwrap());
static RE_MAGENTO: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)mage-cache|magento").unwrap());
static RE_WOOCOMMERCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)woocommerce").unwrap());
static RE_PHP: Lazy<Regex> = Lazy::new(|| Regex::new(r"PHP(?:/([\d.]+))?").unwrap());
static RE_PHPSESSID: Lazy<Regex> = Lazy::new(|| Regex::new(r"PHPSESSID").unwrap());
static RE_ASPNET: Lazy<Regex> = Lazy::new(|| Regex::new(r"ASP\.NET").unwrap());
static RE_ASPNET_VERSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"([\d.]+)").unwrap());
static RE_JSESSIONID: Lazy<Regex> = Lazy::new(|| Regex::new(r"JSESSIONID").unwrap());
static RE_DJANGO_CSRF: Lazy<Regex> = Lazy::new(|| Regex::new(r"csrftoken").unwrap());
static RE_LARAVEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"laravel_session").unwrap());
static RE_RAILS: Lazy<Regex> = Lazy::new(|| Regex::new(r"_rails_session|_session_id").unwrap());
static RE_EXPRESS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^Express$").unwrap());
static RE_NEXTJS: Lazy<Regex> = Lazy::new(|| Regex::new(r"Next\.js ?([\d.]+)?").unwrap());
static RE_NEXTJS_SCRIPT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/_next/static/").unwrap());
static RE_NUXTJS: Lazy<Regex> = Lazy::new(|| Regex::new(r"__NUXT__|/_nuxt/").unwrap());
static RE_ANGULAR: Lazy<Regex> = Lazy::new(|| Regex::new(r#"ng-version="([\d.]+)""#).unwrap());
static RE_SVELTE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"class=["'][^"']*svelte-"#).unwrap());
static RE_GATSBY: Lazy<Regex> = Lazy::new(|| Regex::new(r#"id=["']___gatsby["']"#).unwrap());
static RE_ASTRO: Lazy<Regex> = Lazy::new(|| Regex::new(r"Astro v?([\d.]+)").unwrap());
static RE_REACT: Lazy<Regex> = Lazy::new(|| Regex::new(r"react-dom|data-reactroot|react\.production").unwrap());
static RE_VUE: Lazy<Regex> = Lazy::new(|| Regex::new(r"data-v-app|__VUE_|vue(?:\.min)?\.js").unwrap());
static RE_JQUERY: Lazy<Regex> = Lazy::new(|| Regex::new(r"jquery(?:[.-]min)?(?:[.-]|\.js\?ver=|/)([\d]+\.[\d.]+)").unwrap());
static RE_JQUERY_ANY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)jquery").unwrap());
static RE_BOOTSTRAP: Lazy<Regex> = Lazy::new(|| Regex::new(r"bootstrap(?:\.min)?\.css").unwrap());
static RE_TAILWIND: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)tailwind").unwrap());
static RE_FONT_AWESOME: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)font-?awesome").unwrap());
static RE_GOOGLE_FONTS: Lazy<Regex> = Lazy::new(|| Regex::new(r"fonts\.googleapis\.com").unwrap());
static RE_GTM: Lazy<Regex> = Lazy::new(|| Regex::new(r"googletagmanager\.com/gtm\.js").unwrap());
static RE_GOOGLE_ANALYTICS: Lazy<Regex> = Lazy::new(|| Regex::new(r"google-analytics\.com/|googletagmanager\.com/gtag").unwrap());
static RE_RECAPTCHA: Lazy<Regex> = Lazy::new(|| Regex::new(r"google\.com/recaptcha|recaptcha/api\.js").unwrap());

static RULES: &[FingerprintRule] = &[
    FingerprintRule { tech_name: "Nginx", category: "Web Server", check: Check::Header("server", &RE_NGINX) },
    FingerprintRule { tech_name: "Nginx", category: "Web Server", check: Check::Body(&RE_NGINX_ERROR) },
    FingerprintRule { tech_name: "Apache", category: "Web Server", check: Check::Header("server", &RE_APACHE) },
    FingerprintRule { tech_name: "Apache", category: "Web Server", check: Check::Body(&RE_APACHE_ERROR) },
    FingerprintRule { tech_name: "IIS", category: "Web Server", check: Check::Header("server", &RE_IIS) },
    FingerprintRule { tech_name: "LiteSpeed", category: "Web Server", check: Check::Header("server", &RE_LITESPEED) },
    FingerprintRule { tech_name: "Caddy", category: "Web Server", check: Check::Header("server", &RE_CADDY) },
    FingerprintRule { tech_name: "Cloudflare", category: "CDN / WAF", check: Check::Header("server", &RE_CLOUDFLARE) },
    FingerprintRule { tech_name: "Cloudflare", category: "CDN / WAF", check: Check::Header("cf-ray", &RE_ANY) },
    FingerprintRule { tech_name: "Varnish", category: "Cache", check: Check::Header("via", &RE_VARNISH) },
    FingerprintRule { tech_name: "WordPress", category: "CMS", check: Check::MetaTag("generator", &RE_WORDPRESS) },
    FingerprintRule { tech_name: "WordPress", category: "CMS", check: Check::Body(&RE_WP_PATHS) },
    FingerprintRule { tech_name: "Joomla", category: "CMS", check: Check::MetaTag("generator", &RE_JOOMLA) },
    FingerprintRule { tech_name: "Drupal", category: "CMS", check: Check::MetaTag("generator", &RE_DRUPAL) },
    FingerprintRule { tech_name: "Drupal", category: "CMS", check: Check::Header("x-generator", &RE_DRUPAL) },
    FingerprintRule { tech_name: "Ghost", category: "CMS", check: Check::MetaTag("generator", &RE_GHOST) },
    FingerprintRule { tech_name: "Wix", category: "Site Builder", check: Check::MetaTag("generator", &RE_WIX) },
    FingerprintRule { tech_name: "Squarespace", category: "Site Builder", check: Check::Body(&RE_SQUARESPACE) },
    FingerprintRule { tech_name: "Webflow", category: "Site Builder", check: Check::MetaTag("generator", &RE_WEBFLOW) },
    FingerprintRule { tech_name: "Hugo", category: "Static Site Generator", check: Check::MetaTag("generator", &RE_HUGO) },
    FingerprintRule { tech_name: "Shopify", category: "E-commerce", check: Check::Header("x-shopid", &RE_ANY) },
    FingerprintRule { tech_name: "Shopify", category: "E-commerce", check: Check::ScriptSrc(&RE_SHOPIFY) },
    FingerprintRule { tech_name: "Magento", category: "E-commerce", check: Check::Cookie(&RE_MAGENTO) },
    FingerprintRule { tech_name: "WooCommerce", category: "E-commerce", check: Check::LinkHref(&RE_WOOCOMMERCE) },
    FingerprintRule { tech_name: "PHP", category: "Language", check: Check::Header("x-powered-by", &RE_PHP) },
    FingerprintRule { tech_name: "PHP", category: "Language", check: Check::Cookie(&RE_PHPSESSID) },
    FingerprintRule { tech_name: "ASP.NET", category: "Framework", check: Check::Header("x-powered-by", &RE_ASPNET) },
    FingerprintRule { tech_name: "ASP.NET", category: "Framework", check: Check::Header("x-aspnet-version", &RE_ASPNET_VERSION) },
    FingerprintRule { tech_name: "Java", category: "Language", check: Check::Cookie(&RE_JSESSIONID) },
    FingerprintRule { tech_name: "Django", category: "Framework", check: Check::Cookie(&RE_DJANGO_CSRF) },
    FingerprintRule { tech_name: "Laravel", category: "Framework", check: Check::Cookie(&RE_LARAVEL) },
    FingerprintRule { tech_name: "Ruby on Rails", category: "Framework", check: Check::Cookie(&RE_RAILS) },
    FingerprintRule { tech_name: "Express", category: "Framework", check: Check::Header("x-powered-by", &RE_EXPRESS) },
    FingerprintRule { tech_name: "Next.js", category: "JS Framework", check: Check::Header("x-powered-by", &RE_NEXTJS) },
    FingerprintRule { tech_name: "Next.js", category: "JS Framework", check: Check::ScriptSrc(&RE_NEXTJS_SCRIPT) },
    FingerprintRule { tech_name: "Nuxt.js", category: "JS Framework", check: Check::Body(&RE_NUXTJS) },
    FingerprintRule { tech_name: "Angular", category: "JS Framework", check: Check::Body(&RE_ANGULAR) },
    FingerprintRule { tech_name: "Svelte", category: "JS Framework", check: Check::Body(&RE_SVELTE) },
    FingerprintRule { tech_name: "Gatsby", category: "JS Framework", check: Check::Body(&RE_GATSBY) },
    FingerprintRule { tech_name: "Astro", category: "JS Framework", check: Check::MetaTag("generator", &RE_ASTRO) },
    FingerprintRule { tech_name: "React", category: "JS Library", check: Check::Body(&RE_REACT) },
    FingerprintRule { tech_name: "Vue.js", category: "JS Library", check: Check::Body(&RE_VUE) },
    FingerprintRule { tech_name: "jQuery", category: "JS Library", check: Check::ScriptSrc(&RE_JQUERY) },
    FingerprintRule { tech_name: "jQuery", category: "JS Library", check: Check::ScriptSrc(&RE_JQUERY_ANY) },
    FingerprintRule { tech_name: "Bootstrap", category: "UI Framework", check: Check::LinkHref(&RE_BOOTSTRAP) },
    FingerprintRule { tech_name: "Tailwind CSS", category: "UI Framework", check: Check::LinkHref(&RE_TAILWIND) },
    FingerprintRule { tech_name: "Font Awesome", category: "Font Script", check: Check::LinkHref(&RE_FONT_AWESOME) },
    FingerprintRule { tech_name: "Google Fonts", category: "Font Script", check: Check::LinkHref(&RE_GOOGLE_FONTS) },
    FingerprintRule { tech_name: "Google Tag Manager", category: "Tag Manager", check: Check::Body(&RE_GTM) },
    FingerprintRule { tech_name: "Google Analytics", category: "Analytics", check: Check::ScriptSrc(&RE_GOOGLE_ANALYTICS) },
    FingerprintRule { tech_name: "reCAPTCHA", category: "Security", check: Check::ScriptSrc(&RE_RECAPTCHA) },
];

static SCRIPT_SRC: Lazy<Selector> = Lazy::new(|| Selector::parse("script[src]").unwrap());
static LINK_HREF: Lazy<Selector> = Lazy::new(|| Selector::parse("link[href]").unwrap());

/// Applies every fingerprint rule to a fetched page.
///
/// Several rules may name the same technology; the first match wins, and a later match
/// only fills in a version the earlier one could not capture.
pub fn detect(headers: &HeaderMap, body: &str) -> Vec<Technology> {
    let document = Html::parse_document(body);
    let cookies = headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect::<Vec<_>>()
        .join("; ");

    let mut found: Vec<Technology> = Vec::new();
    for rule in RULES {
        let version = match &rule.check {
            Check::Header(name, re) => check_with_regex(headers.get(*name).and_then(|v| v.to_str().ok()), re),
            Check::MetaTag(name, re) => check_meta_tag(&document, name, re),
            Check::Body(re) => check_with_regex(Some(body), re),
            Check::ScriptSrc(re) => check_attribute(&document, &SCRIPT_SRC, "src", re),
            Check::LinkHref(re) => check_attribute(&document, &LINK_HREF, "href", re),
            Check::Cookie(re) => check_with_regex(Some(&cookies), re),
        };
        let Some(version) = version else { continue };

        match found.iter_mut().find(|t| t.name == rule.tech_name) {
            Some(existing) => {
                if existing.version.is_none() {
                    existing.version = version;
                }
            }
            None => found.push(Technology {
                name: rule.tech_name.to_string(),
                category: rule.category.to_string(),
                version,
            }),
        }
    }
    found
}

/// Groups detections as `{category: ["Name version", ...]}`.
pub fn group_by_category(technologies: &[Technology]) -> BTreeMap<String, Vec<String>> {
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for tech in technologies {
        grouped.entry(tech.category.clone()).or_default().push(tech.to_string());
    }
    grouped
}

/// `None` when the pattern does not match; `Some(version)` otherwise.
fn check_with_regex(text: Option<&str>, re: &Regex) -> Option<Option<String>> {
    let caps = re.captures(text?)?;
    Some(
        caps.get(1)
            .map(|m| m.as_str().trim_end_matches('.').to_string())
            .filter(|s| !s.is_empty()),
    )
}

fn check_meta_tag(doc: &Html, name: &str, re: &Regex) -> Option<Option<String>> {
    let selector = Selector::parse(&format!("meta[name='{name}']")).ok()?;
    doc.select(&selector)
        .filter_map(|el| el.value().attr("content"))
        .find_map(|content| check_with_regex(Some(content), re))
}

fn check_attribute(doc: &Html, selector: &Selector, attr: &str, re: &Regex) -> Option<Option<String>> {
    doc.select(selector)
        .filter_map(|el| el.value().attr(attr))
        .find_map(|value| check_with_regex(Some(value), re))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn names(techs: &[Technology]) -> Vec<&str> {
        techs.iter().map(|t| t.name.as_str()).collect()
    }

    #[test]
    fn detects_server_and_language_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("server", HeaderValue::from_static("nginx/1.25.3"));
        headers.insert("x-powered-by", HeaderValue::from_static("PHP/8.2.1"));
        let techs = detect(&headers, "<html><body>hi</body></html>");

        let nginx = techs.iter().find(|t| t.name == "Nginx").unwrap();
        assert_eq!(nginx.version.as_deref(), Some("1.25.3"));
        assert_eq!(nginx.to_string(), "Nginx 1.25.3");
        assert!(names(&techs).contains(&"PHP"));
    }

    #[test]
    fn detects_wordpress_and_jquery_from_markup() {
        let html = r#"<html><head>
            <meta name="generator" content="WordPress 6.4.2">
            <script src="/wp-includes/js/jquery/jquery.min.js?ver=3.7.1"></script>
            <link rel="stylesheet" href="/wp-content/themes/astra/style.css">
        </head><body></body></html>"#;
        let techs = detect(&HeaderMap::new(), html);
        let wp = techs.iter().find(|t| t.name == "WordPress").unwrap();
        assert_eq!(wp.version.as_deref(), Some("6.4.2"));
        assert!(names(&techs).contains(&"jQuery"));
    }

    #[test]
    fn duplicate_rules_collapse_to_one_entry() {
        let html = "<hr><center>nginx</center>";
        let mut headers = HeaderMap::new();
        headers.insert("server", HeaderValue::from_static("nginx"));
        let techs = detect(&headers, html);
        assert_eq!(names(&techs).iter().filter(|n| **n == "Nginx").count(), 1);
    }

    #[test]
    fn groups_by_category() {
        let techs = vec![
            Technology { name: "Nginx".into(), category: "Web Server".into(), version: Some("1.25.3".into()) },
            Technology { name: "WordPress".into(), category: "CMS".into(), version: None },
        ];
        let grouped = group_by_category(&techs);
        assert_eq!(grouped["Web Server"], vec!["Nginx 1.25.3"]);
        assert_eq!(grouped["CMS"], vec!["WordPress"]);
    }

    #[test]
    fn plain_page_detects_nothing() {
        assert!(detect(&HeaderMap::new(), "<html><body><p>hello</p></body></html>").is_empty());
    }
}
