//! Cheap-path transcript fetch: watch page, player response, caption doc.

use crate::captions::{parse_timedtext_payload, TranscriptSegment};
use crate::derive::{derive_chapters, derive_key_points, derive_summary, Chapter};
use crate::player::{caption_tracks, extract_player_response, select_caption_track, video_details};
use crate::urls::parse_video_id;
use peel_types::{CancellationSignal, PeelError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

const WATCH_BASE: &str = "https://www.youtube.com";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transcript {
    pub video_id: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub language: Option<String>,
    pub segments: Vec<TranscriptSegment>,
    /// Joined segments with whitespace normalised.
    pub full_text: String,
    pub chapters: Vec<Chapter>,
    pub key_points: Vec<String>,
    pub summary: Option<String>,
}

/// Fetch a transcript for a YouTube URL via the watch page.
#[instrument(skip(client, cancel), fields(url = %url))]
pub async fn fetch_transcript(
    client: &reqwest::Client,
    url: &str,
    language: &str,
    cancel: &CancellationSignal,
) -> Result<Transcript> {
    fetch_transcript_from(client, WATCH_BASE, url, language, cancel).await
}

/// Same as [`fetch_transcript`] with an overridable watch-page origin, so
/// tests can point at a fixture server.
pub async fn fetch_transcript_from(
    client: &reqwest::Client,
    base: &str,
    url: &str,
    language: &str,
    cancel: &CancellationSignal,
) -> Result<Transcript> {
    let video_id = parse_video_id(url)
        .ok_or_else(|| PeelError::validation(format!("not a youtube video url: {url}")))?;

    cancel.check()?;
    let watch_url = format!("{base}/watch?v={video_id}");
    let watch_html = client
        .get(&watch_url)
        .send()
        .await
        .map_err(|e| PeelError::network(format!("watch page fetch failed: {e}")))?
        .text()
        .await
        .map_err(|e| PeelError::network(format!("watch page body failed: {e}")))?;

    let player_response = extract_player_response(&watch_html)?;
    let details = video_details(&player_response);
    let tracks = caption_tracks(&player_response);
    debug!(video_id = %video_id, tracks = tracks.len(), "caption tracks found");

    let description = details.short_description.clone();
    let chapters = description
        .as_deref()
        .map(derive_chapters)
        .unwrap_or_default();

    let Some(track) = select_caption_track(&tracks, language) else {
        return fallback_to_description(video_id, details, chapters);
    };

    cancel.check()?;
    let payload = client
        .get(&track.base_url)
        .send()
        .await
        .map_err(|e| PeelError::network(format!("caption fetch failed: {e}")))?
        .text()
        .await
        .map_err(|e| PeelError::network(format!("caption body failed: {e}")))?;

    let segments = parse_timedtext_payload(&payload);
    if segments.is_empty() {
        return fallback_to_description(video_id, details, chapters);
    }

    let language = Some(track.language_code.clone());
    Ok(assemble(video_id, details, language, segments, chapters))
}

/// Build a transcript from already-captured segments (the browser
/// interception path feeds this).
pub fn from_captured_segments(
    video_id: String,
    details: crate::player::VideoDetails,
    segments: Vec<TranscriptSegment>,
) -> Result<Transcript> {
    if segments.is_empty() {
        return Err(PeelError::parse("No captions available"));
    }
    let chapters = details
        .short_description
        .as_deref()
        .map(derive_chapters)
        .unwrap_or_default();
    Ok(assemble(video_id, details, None, segments, chapters))
}

fn fallback_to_description(
    video_id: String,
    details: crate::player::VideoDetails,
    chapters: Vec<Chapter>,
) -> Result<Transcript> {
    let description = details
        .short_description
        .clone()
        .filter(|d| !d.trim().is_empty());
    let Some(description) = description else {
        return Err(PeelError::parse("No captions available"));
    };
    let summary = derive_summary(&description);
    Ok(Transcript {
        video_id,
        title: details.title,
        author: details.author,
        description: Some(description.clone()),
        language: None,
        segments: Vec::new(),
        full_text: description,
        chapters,
        key_points: Vec::new(),
        summary,
    })
}

fn assemble(
    video_id: String,
    details: crate::player::VideoDetails,
    language: Option<String>,
    segments: Vec<TranscriptSegment>,
    chapters: Vec<Chapter>,
) -> Transcript {
    let full_text = segments
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let key_points = derive_key_points(&segments, &chapters);
    let summary = derive_summary(&full_text);

    Transcript {
        video_id,
        title: details.title,
        author: details.author,
        description: details.short_description,
        language,
        segments,
        full_text,
        chapters,
        key_points,
        summary,
    }
}
