//! Derived transcript fields: chapters, key points, summary.

use crate::captions::TranscriptSegment;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    pub start_secs: u64,
    pub title: String,
}

static CHAPTER_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(\d+):(\d{2})(?::(\d{2}))?\s+(.+)$").expect("static regex"));

/// Chapter markers from a video description. Descriptions qualify only when
/// they carry at least two timestamped lines.
pub fn derive_chapters(description: &str) -> Vec<Chapter> {
    let chapters: Vec<Chapter> = CHAPTER_LINE_RE
        .captures_iter(description)
        .filter_map(|caps| {
            let first = caps[1].parse::<u64>().ok()?;
            let second = caps[2].parse::<u64>().ok()?;
            let third = caps.get(3).and_then(|m| m.as_str().parse::<u64>().ok());
            let start_secs = match third {
                Some(secs) => first * 3600 + second * 60 + secs,
                None => first * 60 + second,
            };
            let title = caps[4].trim().to_string();
            (!title.is_empty()).then_some(Chapter { start_secs, title })
        })
        .collect();

    if chapters.len() >= 2 {
        chapters
    } else {
        Vec::new()
    }
}

/// First substantive sentence (>= 5 words) per chapter, or per 2-minute
/// block when no chapters exist.
pub fn derive_key_points(segments: &[TranscriptSegment], chapters: &[Chapter]) -> Vec<String> {
    if segments.is_empty() {
        return Vec::new();
    }

    let boundaries: Vec<(f64, f64)> = if chapters.is_empty() {
        let last_end = segments
            .last()
            .map(|s| s.start + s.duration)
            .unwrap_or(0.0);
        let mut blocks = Vec::new();
        let mut at = 0.0;
        while at < last_end {
            blocks.push((at, at + 120.0));
            at += 120.0;
        }
        blocks
    } else {
        chapters
            .iter()
            .enumerate()
            .map(|(i, chapter)| {
                let start = chapter.start_secs as f64;
                let end = chapters
                    .get(i + 1)
                    .map(|next| next.start_secs as f64)
                    .unwrap_or(f64::MAX);
                (start, end)
            })
            .collect()
    };

    boundaries
        .iter()
        .filter_map(|&(start, end)| {
            let window: String = segments
                .iter()
                .filter(|s| s.start >= start && s.start < end)
                .map(|s| s.text.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            first_substantive_sentence(&window)
        })
        .collect()
}

fn first_substantive_sentence(text: &str) -> Option<String> {
    for raw in text.split(['.', '!', '?']) {
        let sentence = raw.trim();
        if sentence.split_whitespace().count() >= 5 {
            return Some(format!("{sentence}."));
        }
    }
    None
}

/// Roughly the first 200 words of the transcript.
pub fn derive_summary(full_text: &str) -> Option<String> {
    let words: Vec<&str> = full_text.split_whitespace().collect();
    if words.is_empty() {
        return None;
    }
    let take = words.len().min(200);
    let mut summary = words[..take].join(" ");
    if take < words.len() {
        summary.push('…');
    }
    Some(summary)
}
