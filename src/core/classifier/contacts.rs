// src/core/classifier/contacts.rs

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::BTreeSet;

static RE_EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap());
static MAILTO: Lazy<Selector> = Lazy::new(|| Selector::parse(r#"a[href^="mailto:"]"#).unwrap());

/// Asset names like `logo@2x.png` look like addresses to the pattern above.
const IMAGE_SUFFIXES: &[&str] = &[".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp"];

fn is_image_like(candidate: &str) -> bool {
    IMAGE_SUFFIXES.iter().any(|ext| candidate.ends_with(ext))
}

/// Every address on a page: text matches plus `mailto:` link targets. Lowercased.
pub fn extract(html: &str) -> BTreeSet<String> {
    let mut found: BTreeSet<String> = RE_EMAIL
        .find_iter(html)
        .map(|m| m.as_str().to_ascii_lowercase())
        .filter(|m| !is_image_like(m))
        .collect();

    let document = Html::parse_document(html);
    for link in document.select(&MAILTO) {
        let Some(href) = link.value().attr("href") else { continue };
        let Some((_, target)) = href.split_once(':') else { continue };
        let address = target.split('?').next().unwrap_or_default().trim().to_ascii_lowercase();
        if RE_EMAIL.is_match(&address) && !is_image_like(&address) {
            found.insert(address);
        }
    }
    found
}

/// Prefers addresses on `domain` (or its subdomains) and caps the result.
pub fn select(addresses: BTreeSet<String>, domain: &str, cap: usize) -> Vec<String> {
    let suffix = format!(".{domain}");
    let (own, other): (Vec<String>, Vec<String>) = addresses.into_iter().partition(|address| {
        address
            .rsplit_once('@')
            .map(|(_, host)| host == domain || host.ends_with(&suffix))
            .unwrap_or(false)
    });
    let chosen = if own.is_empty() { other } else { own };
    chosen.into_iter().take(cap).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_text_and_mailto_addresses() {
        let html = r#"<html><body>
            <p>Write to Info@Example.com for details.</p>
            <a href="mailto:sales@example.com?subject=Hi">Sales</a>
            <img src="/img/logo@2x.png">
        </body></html>"#;
        let found = extract(html);
        assert!(found.contains("info@example.com"));
        assert!(found.contains("sales@example.com"));
        assert!(!found.iter().any(|e| e.ends_with(".png")));
    }

    #[test]
    fn prefers_addresses_on_the_audited_domain() {
        let addresses: BTreeSet<String> = ["a@example.com", "b@gmail.com", "c@mail.example.com"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(select(addresses, "example.com", 10), vec!["a@example.com", "c@mail.example.com"]);
    }

    #[test]
    fn falls_back_to_foreign_addresses_and_caps() {
        let addresses: BTreeSet<String> = (0..20).map(|i| format!("user{i:02}@gmail.com")).collect();
        let chosen = select(addresses, "example.com", 10);
        assert_eq!(chosen.len(), 10);
        assert_eq!(chosen[0], "user00@gmail.com");
    }
}
