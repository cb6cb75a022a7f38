//! Player-response parsing and caption-track selection.

use peel_types::{PeelError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionTrack {
    pub base_url: String,
    pub language_code: String,
    /// `"asr"` marks auto-generated tracks.
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub name: Option<serde_json::Value>,
}

impl CaptionTrack {
    pub fn is_auto_generated(&self) -> bool {
        self.kind.as_deref() == Some("asr")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDetails {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub short_description: Option<String>,
    #[serde(default)]
    pub length_seconds: Option<String>,
}

/// Locate `ytInitialPlayerResponse = {...}` in the watch page and parse the
/// object. The brace walker tolerates partial matches earlier in the page
/// (the marker can appear inside unrelated script text) by trying each
/// occurrence until one parses.
pub fn extract_player_response(watch_html: &str) -> Result<serde_json::Value> {
    const MARKER: &str = "ytInitialPlayerResponse";

    let mut search_from = 0;
    while let Some(found) = watch_html[search_from..].find(MARKER) {
        let marker_at = search_from + found;
        search_from = marker_at + MARKER.len();

        let after = &watch_html[marker_at + MARKER.len()..];
        let Some(brace_offset) = after.find('{') else {
            continue;
        };
        // Only accept `= {` shapes; skip mentions in strings or comments
        // where something other than an assignment follows.
        let between = &after[..brace_offset];
        if !between.trim_start().starts_with('=') {
            continue;
        }

        let object_src = &after[brace_offset..];
        if let Some(json) = walk_braces(object_src) {
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(json) {
                if value.is_object() {
                    return Ok(value);
                }
            }
        }
    }

    Err(PeelError::parse("ytInitialPlayerResponse not found"))
}

/// Return the balanced `{...}` prefix of `src`, honouring strings and
/// escapes.
fn walk_braces(src: &str) -> Option<&str> {
    let bytes = src.as_bytes();
    if bytes.first() != Some(&b'{') {
        return None;
    }
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&src[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Caption tracks out of a parsed player response.
pub fn caption_tracks(player_response: &serde_json::Value) -> Vec<CaptionTrack> {
    player_response
        .pointer("/captions/playerCaptionsTracklistRenderer/captionTracks")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default()
}

/// Video details out of a parsed player response.
pub fn video_details(player_response: &serde_json::Value) -> VideoDetails {
    player_response
        .get("videoDetails")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default()
}

/// Track priority: manual in the requested language, then auto-generated in
/// the requested language, then any manual track, then whatever is first.
pub fn select_caption_track<'a>(
    tracks: &'a [CaptionTrack],
    language: &str,
) -> Option<&'a CaptionTrack> {
    let lang_matches =
        |track: &CaptionTrack| track.language_code.split('-').next() == language.split('-').next();

    tracks
        .iter()
        .find(|t| !t.is_auto_generated() && lang_matches(t))
        .or_else(|| tracks.iter().find(|t| t.is_auto_generated() && lang_matches(t)))
        .or_else(|| tracks.iter().find(|t| !t.is_auto_generated()))
        .or_else(|| tracks.first())
}
