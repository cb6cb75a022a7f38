//! Page metadata: meta tags, bylines, JSON-LD, derived reading stats.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub published: Option<String>,
    pub canonical: Option<String>,
    pub image: Option<String>,
    pub site_name: Option<String>,
    pub language: Option<String>,
    pub word_count: usize,
    /// Minutes, never zero: `max(1, ceil(words / 200))`.
    pub reading_time_mins: usize,
    /// First two complete sentences of the article body.
    pub excerpt: Option<String>,
}

static BYLINE_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*by[:\s]+").expect("static regex"));
static SENTENCE_END_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?](?:\s|$)").expect("static regex"));

fn meta_content(document: &Html, css: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    document
        .select(&selector)
        .next()?
        .value()
        .attr("content")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn first_meta(document: &Html, selectors: &[&str]) -> Option<String> {
    selectors
        .iter()
        .find_map(|css| meta_content(document, css))
}

fn element_text(document: &Html, css: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    let text: String = document.select(&selector).next()?.text().collect();
    let trimmed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!trimmed.is_empty()).then_some(trimmed)
}

fn extract_title(document: &Html) -> Option<String> {
    first_meta(
        document,
        &[
            "meta[property='og:title']",
            "meta[name='twitter:title']",
        ],
    )
    .or_else(|| element_text(document, "title"))
    .or_else(|| element_text(document, "h1"))
}

fn extract_author(document: &Html) -> Option<String> {
    let from_meta = first_meta(
        document,
        &[
            "meta[name='author']",
            "meta[property='article:author']",
            "meta[name='twitter:creator']",
        ],
    );
    let author = from_meta
        .or_else(|| jsonld_author(document))
        .or_else(|| {
            [
                "[rel='author']",
                "[itemprop='author']",
                ".author-name",
                ".byline",
                ".post-author",
                ".author",
            ]
            .iter()
            .find_map(|css| element_text(document, css))
        })?;
    let cleaned = BYLINE_PREFIX_RE.replace(&author, "").trim().to_string();
    (!cleaned.is_empty()).then_some(cleaned)
}

fn extract_published(document: &Html) -> Option<String> {
    if let Some(published) = first_meta(
        document,
        &[
            "meta[property='article:published_time']",
            "meta[name='date']",
            "meta[name='publish-date']",
        ],
    ) {
        return Some(published);
    }
    let selector = Selector::parse("time[datetime]").ok()?;
    document
        .select(&selector)
        .next()?
        .value()
        .attr("datetime")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn extract_canonical(document: &Html) -> Option<String> {
    let selector = Selector::parse("link[rel='canonical']").ok()?;
    document
        .select(&selector)
        .next()?
        .value()
        .attr("href")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn extract_language(document: &Html) -> Option<String> {
    let selector = Selector::parse("html").ok()?;
    document
        .select(&selector)
        .next()?
        .value()
        .attr("lang")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| meta_content(document, "meta[http-equiv='content-language']"))
}

fn jsonld_author(document: &Html) -> Option<String> {
    let selector = Selector::parse("script[type='application/ld+json']").ok()?;
    for script in document.select(&selector) {
        let raw: String = script.text().collect();
        let Ok(value) = serde_json::from_str::<serde_json::Value>(&raw) else {
            continue;
        };
        let author = value
            .pointer("/author/name")
            .or_else(|| value.pointer("/author/0/name"))
            .and_then(|v| v.as_str());
        if let Some(author) = author {
            let trimmed = author.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    None
}

/// First two complete sentences, or the whole text when shorter.
pub fn excerpt_of(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let mut found = 0;
    for m in SENTENCE_END_RE.find_iter(trimmed) {
        found += 1;
        if found == 2 {
            return Some(trimmed[..m.start() + 1].trim().to_string());
        }
    }
    Some(trimmed.chars().take(300).collect::<String>().trim().to_string())
}

/// Harvest metadata from a parsed page plus its extracted body text.
pub fn extract_metadata(html: &str, body_text: &str) -> PageMetadata {
    let document = Html::parse_document(html);
    let word_count = body_text.split_whitespace().count();
    let reading_time_mins = word_count.div_ceil(200).max(1);

    PageMetadata {
        title: extract_title(&document),
        description: first_meta(
            &document,
            &[
                "meta[property='og:description']",
                "meta[name='twitter:description']",
                "meta[name='description']",
            ],
        ),
        author: extract_author(&document),
        published: extract_published(&document),
        canonical: extract_canonical(&document),
        image: first_meta(
            &document,
            &["meta[property='og:image']", "meta[name='twitter:image']"],
        ),
        site_name: meta_content(&document, "meta[property='og:site_name']"),
        language: extract_language(&document),
        word_count,
        reading_time_mins,
        excerpt: excerpt_of(body_text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html lang="en"><head>
        <title>Fallback Title</title>
        <meta property="og:title" content="The Real Title">
        <meta property="og:description" content="What the page is about.">
        <meta property="og:image" content="https://cdn.example.com/hero.jpg">
        <meta property="og:site_name" content="Example News">
        <meta property="article:published_time" content="2024-05-01T09:00:00Z">
        <link rel="canonical" href="https://example.com/the-real-title">
        <script type="application/ld+json">{"@type":"Article","author":{"name":"Jordan Reyes"}}</script>
        </head><body><h1>Heading</h1></body></html>"#;

    #[test]
    fn og_fields_win() {
        let meta = extract_metadata(PAGE, "Body text here. More of it follows. And a third.");
        assert_eq!(meta.title.as_deref(), Some("The Real Title"));
        assert_eq!(meta.description.as_deref(), Some("What the page is about."));
        assert_eq!(meta.image.as_deref(), Some("https://cdn.example.com/hero.jpg"));
        assert_eq!(meta.site_name.as_deref(), Some("Example News"));
        assert_eq!(meta.canonical.as_deref(), Some("https://example.com/the-real-title"));
        assert_eq!(meta.published.as_deref(), Some("2024-05-01T09:00:00Z"));
        assert_eq!(meta.language.as_deref(), Some("en"));
    }

    #[test]
    fn jsonld_author_found() {
        let meta = extract_metadata(PAGE, "text");
        assert_eq!(meta.author.as_deref(), Some("Jordan Reyes"));
    }

    #[test]
    fn byline_prefix_is_stripped() {
        let html = r#"<html><body><div class="byline">By Casey Lin</div><p>x</p></body></html>"#;
        let meta = extract_metadata(html, "x");
        assert_eq!(meta.author.as_deref(), Some("Casey Lin"));
    }

    #[test]
    fn reading_time_never_zero_and_rounds_up() {
        let meta = extract_metadata("<html></html>", "just a few words");
        assert_eq!(meta.word_count, 4);
        assert_eq!(meta.reading_time_mins, 1);

        let many = "word ".repeat(1000);
        let meta = extract_metadata("<html></html>", &many);
        assert_eq!(meta.reading_time_mins, 5);

        // A partial minute counts as a whole one: 250 words is 2 min.
        let partial = "word ".repeat(250);
        let meta = extract_metadata("<html></html>", &partial);
        assert_eq!(meta.reading_time_mins, 2);
    }

    #[test]
    fn excerpt_is_two_sentences() {
        let text = "First sentence here. Second one follows! Third is ignored.";
        assert_eq!(
            excerpt_of(text).as_deref(),
            Some("First sentence here. Second one follows!")
        );
        assert_eq!(excerpt_of("No terminator at all").as_deref(), Some("No terminator at all"));
        assert!(excerpt_of("   ").is_none());
    }

    #[test]
    fn time_element_datetime_fallback() {
        let html = r#"<html><body><time datetime="2023-11-11">Nov 11</time></body></html>"#;
        let meta = extract_metadata(html, "x");
        assert_eq!(meta.published.as_deref(), Some("2023-11-11"));
    }
}
