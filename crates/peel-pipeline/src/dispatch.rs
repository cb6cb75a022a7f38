//! Content-type dispatch.
//!
//! Routes a `FetchOutcome` to the right extractor and returns a uniform
//! handoff for result assembly. HTML goes through the readability/markdown
//! pipeline; JSON, XML feeds, PDF, DOCX and plain text have dedicated
//! paths. YouTube URLs never reach this module (the pipeline branches
//! first).

use crate::feed::{feed_to_markdown, parse_feed};
use peel_docs::{docx_to_html, pdf::PdfContent};
use peel_extraction::{
    convert_html, extract_urls_from_text, html_to_markdown, html_to_text, ConvertOptions,
};
use peel_types::{ContentKind, FetchOutcome, OutputFormat, PeelError, PeelRequest, Result};
use serde_json::json;
use std::collections::HashMap;
use tracing::{debug, instrument, warn};

/// Uniform dispatch product consumed by result assembly.
#[derive(Debug, Clone)]
pub struct Dispatched {
    pub content: String,
    /// Plain text for metadata/search/safety-net purposes.
    pub text: String,
    pub content_type: ContentKind,
    pub title: Option<String>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub links: Vec<String>,
    pub images: Vec<String>,
    pub quality: f64,
}

fn wants_docx(content_type: &str, url: &str) -> bool {
    content_type
        .starts_with("application/vnd.openxmlformats-officedocument.wordprocessingml.document")
        || url.split('?').next().unwrap_or(url).ends_with(".docx")
}

fn wants_pdf(content_type: &str, url: &str) -> bool {
    content_type.starts_with("application/pdf")
        || url.split('?').next().unwrap_or(url).ends_with(".pdf")
}

fn wants_feed(content_type: &str) -> bool {
    content_type.starts_with("application/rss+xml")
        || content_type.starts_with("application/atom+xml")
        || content_type.starts_with("text/xml")
        || content_type.starts_with("application/xml")
}

/// Route one fetch outcome by its content type.
#[instrument(skip(outcome, request), fields(content_type = %outcome.content_type))]
pub fn dispatch_outcome(outcome: &FetchOutcome, request: &PeelRequest) -> Result<Dispatched> {
    let content_type = outcome.content_type.to_lowercase();
    let url = &outcome.final_url;

    if wants_pdf(&content_type, url) {
        return dispatch_pdf(outcome);
    }
    if wants_docx(&content_type, url) {
        return dispatch_docx(outcome, request);
    }
    if content_type.starts_with("application/json") {
        return dispatch_json(outcome);
    }
    if wants_feed(&content_type) {
        return dispatch_feed(outcome);
    }
    if content_type.starts_with("text/html") || content_type.starts_with("application/xhtml") {
        return dispatch_html(outcome, request);
    }
    if content_type.starts_with("text/") || content_type.starts_with("application/javascript") {
        return dispatch_plain(outcome);
    }

    // Unknown binary types degrade to HTML handling when the body is text,
    // plain passthrough otherwise.
    match outcome.html() {
        Some(_) => dispatch_html(outcome, request),
        None => dispatch_plain(outcome),
    }
}

fn dispatch_html(outcome: &FetchOutcome, request: &PeelRequest) -> Result<Dispatched> {
    let html = match outcome.html() {
        Some(html) => html.to_string(),
        None => String::from_utf8_lossy(outcome.body.as_bytes()).into_owned(),
    };

    let options = ConvertOptions {
        format: request.format,
        base_url: outcome.final_url.clone(),
        selector: request.selector.clone(),
        exclude: request.exclude.clone(),
        include_tags: request.include_tags.clone(),
        exclude_tags: request.exclude_tags.clone(),
        collect_images: true,
    };

    let converted = match convert_html(&html, &options) {
        Ok(converted) => converted,
        Err(PeelError::Validation { .. }) => return Err(PeelError::validation("html too large")),
        Err(error) => {
            // Parse trouble falls back to a raw conversion of the whole
            // body rather than failing the request.
            warn!(error = %error, "structured conversion failed, falling back to raw markdown");
            return Ok(Dispatched {
                content: html_to_markdown(&html),
                text: html_to_text(&html),
                content_type: ContentKind::Html,
                title: None,
                metadata: HashMap::new(),
                links: Vec::new(),
                images: Vec::new(),
                quality: 0.2,
            });
        }
    };

    let mut metadata = HashMap::new();
    let meta = &converted.metadata;
    insert_str(&mut metadata, "title", meta.title.clone());
    insert_str(&mut metadata, "description", meta.description.clone());
    insert_str(&mut metadata, "author", meta.author.clone());
    insert_str(&mut metadata, "published", meta.published.clone());
    insert_str(&mut metadata, "canonical", meta.canonical.clone());
    insert_str(&mut metadata, "image", meta.image.clone());
    insert_str(&mut metadata, "siteName", meta.site_name.clone());
    insert_str(&mut metadata, "language", meta.language.clone());
    insert_str(&mut metadata, "excerpt", meta.excerpt.clone());
    metadata.insert("wordCount".into(), json!(meta.word_count));
    metadata.insert(
        "readingTime".into(),
        json!(format!("{} min read", meta.reading_time_mins)),
    );
    if converted.used_jsonld {
        metadata.insert("source".into(), json!("json-ld"));
    }

    Ok(Dispatched {
        title: meta.title.clone(),
        text: converted.text,
        content: converted.content,
        content_type: ContentKind::Html,
        metadata,
        links: converted.links,
        images: converted.images,
        quality: converted.quality,
    })
}

fn dispatch_json(outcome: &FetchOutcome) -> Result<Dispatched> {
    let raw = String::from_utf8_lossy(outcome.body.as_bytes());
    let parsed: serde_json::Value = serde_json::from_str(&raw)
        .map_err(|e| PeelError::parse(format!("invalid json body: {e}")))?;
    let pretty = serde_json::to_string_pretty(&parsed)?;
    let links = extract_urls_from_text(&raw);
    debug!(links = links.len(), "json dispatched");

    Ok(Dispatched {
        text: pretty.clone(),
        content: pretty,
        content_type: ContentKind::Json,
        title: None,
        metadata: HashMap::new(),
        links,
        images: Vec::new(),
        quality: 1.0,
    })
}

fn dispatch_feed(outcome: &FetchOutcome) -> Result<Dispatched> {
    let raw = String::from_utf8_lossy(outcome.body.as_bytes());
    let feed = parse_feed(&raw);
    if feed.items.is_empty() {
        // Generic XML without feed items: keep the raw document.
        return Ok(Dispatched {
            content: raw.clone().into_owned(),
            text: raw.into_owned(),
            content_type: ContentKind::Xml,
            title: None,
            metadata: HashMap::new(),
            links: Vec::new(),
            images: Vec::new(),
            quality: 0.5,
        });
    }

    let markdown = feed_to_markdown(&feed);
    let links = feed.items.iter().filter_map(|i| i.link.clone()).collect();
    let mut metadata = HashMap::new();
    metadata.insert("itemCount".into(), json!(feed.items.len()));

    Ok(Dispatched {
        text: markdown.clone(),
        content: markdown,
        content_type: ContentKind::Xml,
        title: feed.title,
        metadata,
        links,
        images: Vec::new(),
        quality: 0.9,
    })
}

fn dispatch_pdf(outcome: &FetchOutcome) -> Result<Dispatched> {
    let parsed = PdfContent::from_bytes(outcome.body.as_bytes())?;
    let mut metadata = HashMap::new();
    metadata.insert("pageCount".into(), json!(parsed.metadata.page_count));
    metadata.insert("wordCount".into(), json!(parsed.word_count));
    insert_str(&mut metadata, "title", parsed.metadata.title.clone());
    insert_str(&mut metadata, "author", parsed.metadata.author.clone());
    insert_str(&mut metadata, "producer", parsed.metadata.producer.clone());

    Ok(Dispatched {
        content: parsed.text.clone(),
        text: parsed.text,
        content_type: ContentKind::Document,
        title: parsed.metadata.title,
        metadata,
        links: Vec::new(),
        images: Vec::new(),
        quality: 0.8,
    })
}

fn dispatch_docx(outcome: &FetchOutcome, request: &PeelRequest) -> Result<Dispatched> {
    let parsed = docx_to_html(outcome.body.as_bytes())?;
    let content = match request.format {
        OutputFormat::Html => parsed.html.clone(),
        OutputFormat::Text => parsed.text.clone(),
        OutputFormat::Markdown => html_to_markdown(&parsed.html),
    };
    let mut metadata = HashMap::new();
    metadata.insert("wordCount".into(), json!(parsed.word_count));

    Ok(Dispatched {
        content,
        text: parsed.text,
        content_type: ContentKind::Document,
        title: None,
        metadata,
        links: Vec::new(),
        images: Vec::new(),
        quality: 0.8,
    })
}

fn dispatch_plain(outcome: &FetchOutcome) -> Result<Dispatched> {
    let raw = String::from_utf8_lossy(outcome.body.as_bytes()).into_owned();
    let links = extract_urls_from_text(&raw);
    Ok(Dispatched {
        text: raw.clone(),
        content: raw,
        content_type: ContentKind::Text,
        title: None,
        metadata: HashMap::new(),
        links,
        images: Vec::new(),
        quality: 0.6,
    })
}

fn insert_str(
    metadata: &mut HashMap<String, serde_json::Value>,
    key: &str,
    value: Option<String>,
) {
    if let Some(value) = value {
        metadata.insert(key.to_string(), json!(value));
    }
}
