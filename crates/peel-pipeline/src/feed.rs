//! RSS/Atom feed rendering.
//!
//! Feed items become level-2 markdown sections: title, link, and the first
//! 200 characters of the description/summary/content, in document order.

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use tracing::debug;

const SNIPPET_CHARS: usize = 200;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedItem {
    pub title: Option<String>,
    pub link: Option<String>,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Feed {
    pub title: Option<String>,
    pub items: Vec<FeedItem>,
}

/// Streaming parse tolerant of both RSS (`<item>`) and Atom (`<entry>`)
/// shapes. Malformed XML yields whatever items were complete before the
/// error.
pub fn parse_feed(xml: &str) -> Feed {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut feed = Feed::default();
    let mut current: Option<FeedItem> = None;
    let mut path: Vec<String> = Vec::new();
    let mut text_buf = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                let name = String::from_utf8_lossy(start.name().as_ref()).to_lowercase();
                if name == "item" || name == "entry" {
                    current = Some(FeedItem::default());
                }
                // Atom links carry the target in an attribute.
                if name == "link" {
                    if let Some(item) = current.as_mut() {
                        if item.link.is_none() {
                            if let Some(href) = attr_value(&start, b"href") {
                                item.link = Some(href);
                            }
                        }
                    }
                }
                path.push(name);
                text_buf.clear();
            }
            Ok(Event::Empty(start)) => {
                let name = String::from_utf8_lossy(start.name().as_ref()).to_lowercase();
                if name == "link" {
                    if let Some(item) = current.as_mut() {
                        if item.link.is_none() {
                            if let Some(href) = attr_value(&start, b"href") {
                                item.link = Some(href);
                            }
                        }
                    }
                }
            }
            Ok(Event::Text(text)) => {
                if let Ok(unescaped) = text.unescape() {
                    text_buf.push_str(&unescaped);
                }
            }
            Ok(Event::CData(cdata)) => {
                text_buf.push_str(&String::from_utf8_lossy(&cdata.into_inner()));
            }
            Ok(Event::End(_)) => {
                let ended = path.pop().unwrap_or_default();
                let value = text_buf.trim().to_string();
                text_buf.clear();

                if ended == "item" || ended == "entry" {
                    if let Some(done) = current.take() {
                        feed.items.push(done);
                    }
                } else if let Some(item) = current.as_mut() {
                    match ended.as_str() {
                        "title" if !value.is_empty() => item.title = Some(value),
                        "link" if !value.is_empty() && item.link.is_none() => {
                            item.link = Some(value)
                        }
                        "description" | "summary" | "content" | "content:encoded"
                            if !value.is_empty() && item.summary.is_none() =>
                        {
                            item.summary = Some(value)
                        }
                        _ => {}
                    }
                } else if ended == "title" && feed.title.is_none() && !value.is_empty() {
                    feed.title = Some(value);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(error = %e, "feed parse stopped early");
                break;
            }
        }
    }
    feed
}

fn attr_value(start: &quick_xml::events::BytesStart<'_>, key: &[u8]) -> Option<String> {
    start
        .attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .and_then(|a| a.unescape_value().ok().map(|v| v.to_string()))
}

/// Render a feed as markdown, one level-2 section per item.
pub fn feed_to_markdown(feed: &Feed) -> String {
    let mut out = String::new();
    if let Some(title) = &feed.title {
        out.push_str(&format!("# {title}\n\n"));
    }
    for item in &feed.items {
        let title = item.title.as_deref().unwrap_or("(untitled)");
        out.push_str(&format!("## {title}\n\n"));
        if let Some(link) = &item.link {
            out.push_str(&format!("{link}\n\n"));
        }
        if let Some(summary) = &item.summary {
            let snippet: String = summary.chars().take(SNIPPET_CHARS).collect();
            let suffix = if summary.chars().count() > SNIPPET_CHARS {
                "…"
            } else {
                ""
            };
            out.push_str(&format!("{snippet}{suffix}\n\n"));
        }
    }
    out.trim().to_string()
}
