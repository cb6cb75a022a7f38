//! Link and image harvesting.

use scraper::{Html, Selector};
use url::Url;

/// Absolute, deduped, sorted, http(s)-only links from the document.
pub fn collect_links(html: &str, base_url: &str) -> Vec<String> {
    collect_attr(html, base_url, "a[href]", "href")
}

/// Absolute, deduped, sorted, http(s)-only image sources.
pub fn collect_images(html: &str, base_url: &str) -> Vec<String> {
    collect_attr(html, base_url, "img[src]", "src")
}

fn collect_attr(html: &str, base_url: &str, css: &str, attr: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse(css) else {
        return Vec::new();
    };
    let base = Url::parse(base_url).ok();

    let mut found: Vec<String> = document
        .select(&selector)
        .filter_map(|el| el.value().attr(attr))
        .filter_map(|raw| resolve(raw, base.as_ref()))
        .collect();
    found.sort();
    found.dedup();
    found
}

/// Resolve against the base and keep only http(s) results. Everything else
/// (javascript:, mailto:, data:, file:) is discarded.
fn resolve(raw: &str, base: Option<&Url>) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with('#') {
        return None;
    }
    let absolute = match Url::parse(raw) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => base?.join(raw).ok()?,
        Err(_) => return None,
    };
    match absolute.scheme() {
        "http" | "https" => Some(absolute.to_string()),
        _ => None,
    }
}

/// Bare URL extraction for plain-text bodies.
pub fn extract_urls_from_text(text: &str) -> Vec<String> {
    let mut found: Vec<String> = text
        .split_whitespace()
        .filter(|token| token.starts_with("http://") || token.starts_with("https://"))
        .filter_map(|token| {
            let trimmed = token.trim_end_matches(['.', ',', ')', ']', '>', ';', '"', '\'']);
            Url::parse(trimmed).ok().map(|u| u.to_string())
        })
        .collect();
    found.sort();
    found.dedup();
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn links_are_absolute_sorted_deduped_http_only() {
        let html = r##"<html><body>
            <a href="/relative">r</a>
            <a href="https://example.com/z">z</a>
            <a href="https://example.com/a">a</a>
            <a href="https://example.com/a">dup</a>
            <a href="mailto:someone@example.com">mail</a>
            <a href="javascript:alert(1)">js</a>
            <a href="#frag">frag</a>
        </body></html>"##;
        let links = collect_links(html, "https://example.com/page");
        assert_eq!(
            links,
            vec![
                "https://example.com/a",
                "https://example.com/relative",
                "https://example.com/z",
            ]
        );
    }

    #[test]
    fn images_resolved_against_base() {
        let html = r#"<html><body><img src="/img/a.png"><img src="data:image/png;base64,xx"></body></html>"#;
        let images = collect_images(html, "https://cdn.example.com/post");
        assert_eq!(images, vec!["https://cdn.example.com/img/a.png"]);
    }

    #[test]
    fn text_url_extraction_trims_punctuation() {
        let urls =
            extract_urls_from_text("See https://example.com/a, and (https://example.com/b).");
        assert_eq!(
            urls,
            vec!["https://example.com/a", "https://example.com/b"]
        );
    }
}
