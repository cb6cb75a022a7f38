//! Caption-document parsing: legacy XML and JSON3 payloads.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptSegment {
    /// Seconds from video start.
    pub start: f64,
    /// Seconds.
    pub duration: f64,
    pub text: String,
}

static XML_TEXT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<text\s+start="([\d.]+)"\s+dur="([\d.]+)"[^>]*>(.*?)</text>"#)
        .expect("static regex")
});
static INLINE_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"</?[a-zA-Z][^>]*>").expect("static regex"));
static NUMERIC_ENTITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&#(x?[0-9a-fA-F]+);").expect("static regex"));

/// Decode the HTML entities caption documents actually contain.
pub fn decode_entities(text: &str) -> String {
    let text = NUMERIC_ENTITY_RE.replace_all(text, |caps: &regex::Captures| {
        let body = &caps[1];
        let code = if let Some(hexpart) = body.strip_prefix('x').or_else(|| body.strip_prefix('X')) {
            u32::from_str_radix(hexpart, 16).ok()
        } else {
            body.parse::<u32>().ok()
        };
        code.and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_default()
    });
    text.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&nbsp;", " ")
}

fn clean_segment_text(raw: &str) -> String {
    let decoded = decode_entities(raw);
    let stripped = INLINE_TAG_RE.replace_all(&decoded, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse either caption format. JSON3 is tried first (payload starts with a
/// JSON object carrying `events`); everything else goes through the XML
/// scanner. Empty or whitespace-only segments are dropped.
pub fn parse_timedtext_payload(payload: &str) -> Vec<TranscriptSegment> {
    let trimmed = payload.trim_start();
    if trimmed.starts_with('{') {
        if let Some(segments) = parse_json3(trimmed) {
            return segments;
        }
    }
    parse_xml(payload)
}

fn parse_xml(payload: &str) -> Vec<TranscriptSegment> {
    XML_TEXT_RE
        .captures_iter(payload)
        .filter_map(|caps| {
            let start = caps[1].parse::<f64>().ok()?;
            let duration = caps[2].parse::<f64>().ok()?;
            let text = clean_segment_text(&caps[3]);
            (!text.is_empty()).then_some(TranscriptSegment {
                start,
                duration,
                text,
            })
        })
        .collect()
}

#[derive(Deserialize)]
struct Json3Payload {
    #[serde(default)]
    events: Vec<Json3Event>,
}

#[derive(Deserialize)]
struct Json3Event {
    #[serde(default, rename = "tStartMs")]
    t_start_ms: Option<f64>,
    #[serde(default, rename = "dDurationMs")]
    d_duration_ms: Option<f64>,
    #[serde(default)]
    segs: Vec<Json3Seg>,
}

#[derive(Deserialize)]
struct Json3Seg {
    #[serde(default)]
    utf8: String,
}

fn parse_json3(payload: &str) -> Option<Vec<TranscriptSegment>> {
    let parsed: Json3Payload = serde_json::from_str(payload).ok()?;
    let segments: Vec<TranscriptSegment> = parsed
        .events
        .into_iter()
        .filter_map(|event| {
            let text = event
                .segs
                .iter()
                .map(|s| s.utf8.as_str())
                .collect::<String>();
            let text = clean_segment_text(&text);
            if text.is_empty() {
                return None;
            }
            Some(TranscriptSegment {
                start: event.t_start_ms.unwrap_or(0.0) / 1000.0,
                duration: event.d_duration_ms.unwrap_or(0.0) / 1000.0,
                text,
            })
        })
        .collect();
    Some(segments)
}
