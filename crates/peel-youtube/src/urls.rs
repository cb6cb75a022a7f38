//! Video-id extraction from the URL forms YouTube serves.

use once_cell::sync::Lazy;
use regex::Regex;

static VIDEO_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("static regex"));

fn is_youtube_host(host: &str) -> bool {
    let host = host.to_ascii_lowercase();
    host == "youtube.com"
        || host == "youtu.be"
        || host.ends_with(".youtube.com")
}

fn valid_id(candidate: &str) -> Option<String> {
    let candidate = candidate.trim();
    VIDEO_ID_RE
        .is_match(candidate)
        .then(|| candidate.to_string())
}

/// Recognise `watch?v=ID`, `youtu.be/ID`, `/embed/ID`, `/v/ID` and
/// `/shorts/ID`. Anything else (including malformed ids) returns `None`.
pub fn parse_video_id(raw: &str) -> Option<String> {
    let parsed = url::Url::parse(raw).ok()?;
    let host = parsed.host_str()?;
    if !is_youtube_host(host) {
        return None;
    }

    if host.eq_ignore_ascii_case("youtu.be") {
        let first = parsed.path_segments()?.next()?;
        return valid_id(first);
    }

    if parsed.path() == "/watch" {
        let v = parsed
            .query_pairs()
            .find(|(k, _)| k == "v")
            .map(|(_, v)| v.to_string())?;
        return valid_id(&v);
    }

    let mut segments = parsed.path_segments()?;
    let first = segments.next()?;
    if matches!(first, "embed" | "v" | "shorts") {
        return valid_id(segments.next()?);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_link() {
        assert_eq!(
            parse_video_id("https://youtu.be/dQw4w9WgXcQ").as_deref(),
            Some("dQw4w9WgXcQ")
        );
    }

    #[test]
    fn watch_link() {
        assert_eq!(
            parse_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42").as_deref(),
            Some("dQw4w9WgXcQ")
        );
    }

    #[test]
    fn embed_v_and_shorts() {
        assert_eq!(
            parse_video_id("https://www.youtube.com/embed/dQw4w9WgXcQ").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            parse_video_id("https://youtube.com/v/dQw4w9WgXcQ").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            parse_video_id("https://m.youtube.com/shorts/dQw4w9WgXcQ").as_deref(),
            Some("dQw4w9WgXcQ")
        );
    }

    #[test]
    fn non_youtube_hosts_rejected() {
        assert_eq!(parse_video_id("https://vimeo.com/12345"), None);
        assert_eq!(parse_video_id("https://notyoutube.com/watch?v=dQw4w9WgXcQ"), None);
    }

    #[test]
    fn malformed_ids_rejected() {
        assert_eq!(parse_video_id("https://www.youtube.com/watch?v=short"), None);
        assert_eq!(
            parse_video_id("https://www.youtube.com/watch?v=waytoolongforanid"),
            None
        );
        assert_eq!(parse_video_id("https://youtu.be/"), None);
    }
}
