//! Conversion facade: filters, JSON-LD preference, format selection, caps.

use crate::jsonld::extract_jsonld;
use crate::links::{collect_images, collect_links};
use crate::markdown::html_to_text;
use crate::metadata::{extract_metadata, PageMetadata};
use crate::quality::quality_score;
use crate::readability::extract_article;
use crate::{MAX_HTML_BYTES, MAX_MARKDOWN_BYTES};
use peel_types::{OutputFormat, PeelError, Result};
use scraper::{Html, Selector};
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    pub format: OutputFormat,
    pub base_url: String,
    pub selector: Option<String>,
    pub exclude: Vec<String>,
    pub include_tags: Vec<String>,
    pub exclude_tags: Vec<String>,
    pub collect_images: bool,
}

#[derive(Debug, Clone)]
pub struct Converted {
    pub content: String,
    /// Plain text of the article regardless of the output format; feeds
    /// metadata, BM25 and the zero-token safety net.
    pub text: String,
    pub metadata: PageMetadata,
    pub links: Vec<String>,
    pub images: Vec<String>,
    pub quality: f64,
    pub used_jsonld: bool,
}

/// Reduce the document per include/exclude tag filters and the CSS
/// selector, re-serializing from the parsed tree so later passes see a
/// consistent document.
fn apply_dom_filters(html: &str, options: &ConvertOptions) -> String {
    let mut current = html.to_string();

    if !options.include_tags.is_empty() {
        let css = options.include_tags.join(", ");
        if let Ok(selector) = Selector::parse(&css) {
            let document = Html::parse_document(&current);
            let kept: Vec<String> = document.select(&selector).map(|el| el.html()).collect();
            if !kept.is_empty() {
                current = kept.join("\n");
            }
        };
    }

    if let Some(css) = options.selector.as_deref() {
        if let Ok(selector) = Selector::parse(css) {
            let document = Html::parse_document(&current);
            let matched: Vec<String> = document.select(&selector).map(|el| el.html()).collect();
            if matched.is_empty() {
                debug!(selector = css, "selector matched nothing, using full document");
            } else {
                current = matched.join("\n");
            }
        }
    }

    let mut excludes: Vec<String> = options.exclude.clone();
    excludes.extend(options.exclude_tags.iter().cloned());
    if !excludes.is_empty() {
        // Re-serialize first so removed fragments match the serialized form
        // byte-for-byte.
        let document = Html::parse_document(&current);
        let mut serialized = document.root_element().html();
        for css in &excludes {
            if let Ok(selector) = Selector::parse(css) {
                let reparsed = Html::parse_document(&serialized);
                let fragments: Vec<String> =
                    reparsed.select(&selector).map(|el| el.html()).collect();
                for fragment in fragments {
                    serialized = serialized.replace(&fragment, "");
                }
            }
        }
        current = serialized;
    }

    current
}

fn cap_output(mut content: String) -> String {
    if content.len() > MAX_MARKDOWN_BYTES {
        let mut cut = MAX_MARKDOWN_BYTES;
        while cut > 0 && !content.is_char_boundary(cut) {
            cut -= 1;
        }
        content.truncate(cut);
    }
    content
}

/// Convert an HTML body into the requested output format.
pub fn convert_html(html: &str, options: &ConvertOptions) -> Result<Converted> {
    if html.len() > MAX_HTML_BYTES {
        return Err(PeelError::validation(format!(
            "html body of {} bytes exceeds the {} byte cap",
            html.len(),
            MAX_HTML_BYTES
        )));
    }

    let filtered = apply_dom_filters(html, options);
    let article = extract_article(&filtered);
    let metadata = extract_metadata(html, &article.text);
    let links = collect_links(html, &options.base_url);
    let images = if options.collect_images {
        collect_images(html, &options.base_url)
    } else {
        Vec::new()
    };

    // Structured data beats scraping when it renders complete.
    let jsonld = match options.format {
        OutputFormat::Markdown => extract_jsonld(html),
        _ => None,
    };
    let used_jsonld = jsonld.is_some();

    let content = match options.format {
        OutputFormat::Markdown => jsonld.unwrap_or_else(|| article.markdown.clone()),
        OutputFormat::Text => html_to_text(&filtered),
        OutputFormat::Html => filtered.clone(),
    };
    let content = cap_output(content);

    let quality = match options.format {
        OutputFormat::Html => quality_score(&article.markdown, html),
        _ => quality_score(&content, html),
    };

    Ok(Converted {
        content,
        text: article.text,
        metadata,
        links,
        images,
        quality,
        used_jsonld,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> ConvertOptions {
        ConvertOptions {
            base_url: "https://example.com/post".to_string(),
            ..Default::default()
        }
    }

    fn article_html() -> String {
        let paragraphs: String = (0..5)
            .map(|i| {
                format!(
                    "<p>Paragraph {i} of the article body, written with enough length \
                     that extraction has real prose to work with.</p>"
                )
            })
            .collect();
        format!(
            "<html><head><title>Post</title>\
             <meta property=\"og:title\" content=\"Post Title\"></head>\
             <body><nav>menu</nav><article><h1>Post Title</h1>{paragraphs}\
             <a href=\"/next\">next post</a></article><footer>foot</footer></body></html>"
        )
    }

    #[test]
    fn markdown_conversion_end_to_end() {
        let converted = convert_html(&article_html(), &options()).unwrap();
        assert!(converted.content.contains("# Post Title"));
        assert!(converted.content.contains("Paragraph 4"));
        assert!(!converted.content.contains("menu"));
        assert_eq!(converted.metadata.title.as_deref(), Some("Post Title"));
        assert!(converted.links.contains(&"https://example.com/next".to_string()));
        assert!(!converted.used_jsonld);
        assert!(converted.quality > 0.0);
    }

    #[test]
    fn selector_reduces_scope_and_falls_back() {
        let html = "<html><body><article><p>Wanted content of decent length here, \
                    repeated to pass minimums. Wanted content of decent length here.</p>\
                    </article><div id=\"other\"><p>Unwanted text</p></div></body></html>";

        let mut opts = options();
        opts.selector = Some("article".to_string());
        let converted = convert_html(html, &opts).unwrap();
        assert!(converted.content.contains("Wanted"));
        assert!(!converted.content.contains("Unwanted"));

        // Unmatched selector falls back to the full document rather than
        // converting an empty reduction.
        opts.selector = Some("#does-not-exist".to_string());
        let converted = convert_html(html, &opts).unwrap();
        assert!(converted.content.contains("Wanted content"));
    }

    #[test]
    fn exclude_removes_matches() {
        let mut opts = options();
        opts.exclude = vec![".spoiler".to_string()];
        let html = "<html><body><article>\
                    <p>Kept paragraph with plenty of text to satisfy extraction minimums \
                    and then some extra words.</p>\
                    <div class=\"spoiler\"><p>The butler did it</p></div></article></body></html>";
        let converted = convert_html(html, &opts).unwrap();
        assert!(converted.content.contains("Kept paragraph"));
        assert!(!converted.content.contains("butler"));
    }

    #[test]
    fn oversized_input_rejected() {
        let huge = format!("<html><body>{}</body></html>", "x".repeat(MAX_HTML_BYTES));
        assert!(matches!(
            convert_html(&huge, &options()),
            Err(PeelError::Validation { .. })
        ));
    }

    #[test]
    fn jsonld_preferred_for_markdown() {
        let html = r#"<html><head><script type="application/ld+json">
            {"@type":"Recipe","name":"Soup","recipeIngredient":["water","salt"],
             "recipeInstructions":["Boil."]}</script></head>
            <body><article><p>Scraped body text that would otherwise be returned by the
            readability path of the converter.</p></article></body></html>"#;
        let converted = convert_html(html, &options()).unwrap();
        assert!(converted.used_jsonld);
        assert!(converted.content.contains("# Soup"));

        let mut text_opts = options();
        text_opts.format = OutputFormat::Text;
        let converted = convert_html(html, &text_opts).unwrap();
        assert!(!converted.used_jsonld);
        assert!(converted.content.contains("Scraped body text"));
    }

    #[test]
    fn text_format_double_newline_blocks() {
        let mut opts = options();
        opts.format = OutputFormat::Text;
        let converted = convert_html(&article_html(), &opts).unwrap();
        assert!(converted.content.contains("Post Title\n\nParagraph 0"));
        assert!(!converted.content.contains('#'));
    }
}
