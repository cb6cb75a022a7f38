//! The orchestrator: one `peel` call per request.

use crate::dispatch::{dispatch_outcome, Dispatched};
use crate::services::PeelServices;
use base64::Engine;
use peel_cache::ResultCache;
use peel_extraction::{estimate_tokens, hard_truncate, smart_distill};
use peel_search::{filter_blocks, quick_answer};
use peel_types::{
    content_fingerprint, CancellationSignal, ContentKind, FetchMethod, PeelError, PeelRequest,
    PeelResult, Result,
};
use peel_youtube::{fetch_transcript, parse_video_id, Transcript};
use scraper::{Html, Selector};
use serde_json::json;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};

pub use crate::services::PipelineConfig;

/// Execute the full pipeline for one request.
pub async fn peel(services: &PeelServices, request: &PeelRequest) -> Result<PeelResult> {
    let timeout = Duration::from_millis(
        request
            .timeout_ms
            .unwrap_or(services.config.default_timeout_ms),
    );
    let cancel = CancellationSignal::with_timeout(timeout);
    peel_with_signal(services, request, &cancel).await
}

/// Execute the pipeline under an externally owned cancellation signal.
#[instrument(skip(services, request, cancel), fields(url = %request.url))]
pub async fn peel_with_signal(
    services: &PeelServices,
    request: &PeelRequest,
    cancel: &CancellationSignal,
) -> Result<PeelResult> {
    let started = Instant::now();
    request.validate()?;

    let cache_key = ResultCache::key_for(request);
    if !request.no_cache {
        if let Some(hit) = services.cache.get(&cache_key) {
            debug!(key = %cache_key, "cache hit");
            return Ok(hit);
        }
    }

    let mut result = if let Some(video_id) = parse_video_id(&request.url) {
        peel_youtube_url(services, request, &video_id, cancel, started).await?
    } else {
        let outcome = services.fetcher.fetch(request, cancel).await?;
        cancel.check()?;
        let dispatched = dispatch_outcome(&outcome, request)?;

        let extracted = request
            .extract
            .as_ref()
            .filter(|e| !e.css.is_empty())
            .and_then(|e| outcome.html().map(|html| extract_css_fields(html, &e.css)))
            .filter(|fields| !fields.is_empty());

        let mut assembled = assemble(
            &outcome.final_url,
            outcome.status,
            dispatched,
            outcome.method,
            outcome.screenshot.as_deref(),
            outcome.body.len(),
            started,
        );
        assembled.extracted = extracted;
        assembled
    };

    cancel.check()?;
    post_process(services, request, &mut result)?;
    result.elapsed_ms = started.elapsed().as_millis() as u64;
    result.refresh_fingerprint();

    if !request.no_cache {
        services.cache.put(cache_key, result.clone());
    }
    info!(tokens = result.tokens, method = %result.method, "peel complete");
    Ok(result)
}

#[allow(clippy::too_many_arguments)]
fn assemble(
    final_url: &str,
    status: u16,
    dispatched: Dispatched,
    method: FetchMethod,
    screenshot: Option<&[u8]>,
    body_len: usize,
    started: Instant,
) -> PeelResult {
    let mut content = dispatched.content;

    // Zero-token safety net: a 200 with a non-empty body never yields an
    // empty success.
    if content.trim().is_empty() && status == 200 && body_len > 0 {
        content = dispatched
            .metadata
            .get("description")
            .and_then(|v| v.as_str())
            .map(String::from)
            .unwrap_or_else(|| dispatched.text.chars().take(500).collect());
    }

    let tokens = estimate_tokens(&content);
    let fingerprint = content_fingerprint(&content);
    PeelResult {
        url: final_url.to_string(),
        title: dispatched.title,
        content,
        content_type: dispatched.content_type,
        metadata: dispatched.metadata,
        links: dispatched.links,
        images: dispatched.images,
        tokens,
        method,
        elapsed_ms: started.elapsed().as_millis() as u64,
        quality: dispatched.quality,
        fingerprint,
        screenshot: screenshot
            .map(|bytes| base64::engine::general_purpose::STANDARD.encode(bytes)),
        extracted: None,
        summary: None,
        change_tracking: None,
    }
}

/// Post-fetch stages: query focus, then distillation, then the final token
/// recount.
fn post_process(
    services: &PeelServices,
    request: &PeelRequest,
    result: &mut PeelResult,
) -> Result<()> {
    if let Some(question) = request.question.as_deref().filter(|q| !q.trim().is_empty()) {
        // Answer over the full content before filtering narrows it.
        let answer = quick_answer(&result.content, question, services.config.answer_passages);
        if let Some(text) = &answer.answer {
            result.set_meta("answer", json!(text));
            result.set_meta("answerConfidence", json!(answer.confidence));
            result.set_meta("questionType", json!(answer.question_type));
        }

        let filtered = filter_blocks(&result.content, question);
        debug!(
            kept = filtered.kept,
            total = filtered.total,
            "question filter applied"
        );
        result.content = filtered.content;
        result.set_meta("filterKept", json!(filtered.kept));
        result.set_meta("filterTotal", json!(filtered.total));
    }

    // Agent mode defaults to a distillation budget so tool-calling models
    // get token-bounded output without asking for it.
    let budget = request
        .budget
        .or_else(|| request.agent_mode.then_some(AGENT_MODE_BUDGET));
    if let Some(budget) = budget {
        result.content = smart_distill(&result.content, budget);
    }
    if let Some(max_tokens) = request.max_tokens {
        result.content = hard_truncate(&result.content, max_tokens);
    }

    result.tokens = estimate_tokens(&result.content);
    Ok(())
}

const AGENT_MODE_BUDGET: usize = 8_000;

/// Apply a declarative CSS extraction config against raw HTML.
pub fn extract_css_fields(
    html: &str,
    css: &HashMap<String, String>,
) -> HashMap<String, serde_json::Value> {
    let document = Html::parse_document(html);
    let mut out = HashMap::new();
    for (field, selector_src) in css {
        let Ok(selector) = Selector::parse(selector_src) else {
            continue;
        };
        let values: Vec<String> = document
            .select(&selector)
            .map(|el| {
                el.text()
                    .collect::<String>()
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .filter(|s| !s.is_empty())
            .collect();
        match values.len() {
            0 => {}
            1 => {
                out.insert(field.clone(), json!(values[0]));
            }
            _ => {
                out.insert(field.clone(), json!(values));
            }
        }
    }
    out
}

async fn peel_youtube_url(
    services: &PeelServices,
    request: &PeelRequest,
    video_id: &str,
    cancel: &CancellationSignal,
    started: Instant,
) -> Result<PeelResult> {
    let transcript = match fetch_transcript(
        &services.http,
        &request.url,
        &services.config.language,
        cancel,
    )
    .await
    {
        Ok(transcript) => transcript,
        Err(PeelError::Aborted) => return Err(PeelError::Aborted),
        Err(error) => {
            // Session-scoped caption URLs defeat the cheap path; a rendered
            // watch page carries a fresh player response to retry from.
            debug!(error = %error, "cheap transcript path failed, trying rendered page");
            rendered_transcript_fallback(services, request, cancel).await?
        }
    };

    let content = transcript_markdown(&transcript);
    let tokens = estimate_tokens(&content);
    let fingerprint = content_fingerprint(&content);

    let mut metadata = HashMap::new();
    metadata.insert("videoId".into(), json!(video_id));
    if let Some(author) = &transcript.author {
        metadata.insert("author".into(), json!(author));
    }
    if let Some(language) = &transcript.language {
        metadata.insert("language".into(), json!(language));
    }
    metadata.insert("segmentCount".into(), json!(transcript.segments.len()));
    if !transcript.chapters.is_empty() {
        metadata.insert(
            "chapters".into(),
            json!(transcript
                .chapters
                .iter()
                .map(|c| json!({"startSecs": c.start_secs, "title": c.title}))
                .collect::<Vec<_>>()),
        );
    }

    Ok(PeelResult {
        url: request.url.clone(),
        title: transcript.title.clone(),
        content,
        content_type: ContentKind::Text,
        metadata,
        links: Vec::new(),
        images: Vec::new(),
        tokens,
        method: FetchMethod::Simple,
        elapsed_ms: started.elapsed().as_millis() as u64,
        quality: if transcript.segments.is_empty() { 0.5 } else { 0.9 },
        fingerprint,
        screenshot: None,
        extracted: None,
        summary: transcript.summary.clone(),
        change_tracking: None,
    })
}

/// Browser-path fallback: render the watch page (fresh, session-scoped
/// player response), then re-run track selection and the caption fetch.
async fn rendered_transcript_fallback(
    services: &PeelServices,
    request: &PeelRequest,
    cancel: &CancellationSignal,
) -> Result<Transcript> {
    let mut render_request = request.clone();
    render_request.render = true;

    let outcome = services.fetcher.fetch(&render_request, cancel).await?;
    let html = outcome
        .html()
        .ok_or_else(|| PeelError::parse("rendered watch page was not html"))?;

    let player = peel_youtube::extract_player_response(html)?;
    let tracks = peel_youtube::player::caption_tracks(&player);
    let details = peel_youtube::player::video_details(&player);
    let video_id = parse_video_id(&request.url)
        .ok_or_else(|| PeelError::validation("not a youtube url"))?;

    let Some(track) = peel_youtube::select_caption_track(&tracks, &services.config.language)
    else {
        return Err(PeelError::parse("No captions available"));
    };

    cancel.check()?;
    let payload = services
        .http
        .get(&track.base_url)
        .send()
        .await
        .map_err(|e| PeelError::network(format!("caption fetch failed: {e}")))?
        .text()
        .await
        .map_err(|e| PeelError::network(format!("caption body failed: {e}")))?;

    let segments = peel_youtube::parse_timedtext_payload(&payload);
    peel_youtube::transcript::from_captured_segments(video_id, details, segments)
}

fn transcript_markdown(transcript: &Transcript) -> String {
    let mut out = String::new();
    if let Some(title) = &transcript.title {
        out.push_str(&format!("# {title}\n\n"));
    }
    if let Some(author) = &transcript.author {
        out.push_str(&format!("**Channel:** {author}\n\n"));
    }
    if !transcript.chapters.is_empty() {
        out.push_str("## Chapters\n\n");
        for chapter in &transcript.chapters {
            let mins = chapter.start_secs / 60;
            let secs = chapter.start_secs % 60;
            out.push_str(&format!("- {mins}:{secs:02} {}\n", chapter.title));
        }
        out.push('\n');
    }
    if !transcript.key_points.is_empty() {
        out.push_str("## Key points\n\n");
        for point in &transcript.key_points {
            out.push_str(&format!("- {point}\n"));
        }
        out.push('\n');
    }
    out.push_str("## Transcript\n\n");
    out.push_str(&transcript.full_text);
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn css_extraction_single_and_multi() {
        let html = "<html><body><h1 id=\"t\">Title</h1>\
                    <li class=\"tag\">a</li><li class=\"tag\">b</li></body></html>";
        let mut css = HashMap::new();
        css.insert("title".to_string(), "#t".to_string());
        css.insert("tags".to_string(), ".tag".to_string());
        css.insert("missing".to_string(), ".nope".to_string());

        let extracted = extract_css_fields(html, &css);
        assert_eq!(extracted.get("title"), Some(&json!("Title")));
        assert_eq!(extracted.get("tags"), Some(&json!(["a", "b"])));
        assert!(!extracted.contains_key("missing"));
    }

    #[test]
    fn transcript_markdown_shape() {
        let transcript = Transcript {
            video_id: "dQw4w9WgXcQ".into(),
            title: Some("A Video".into()),
            author: Some("A Channel".into()),
            description: None,
            language: Some("en".into()),
            segments: vec![],
            full_text: "all the words spoken".into(),
            chapters: vec![peel_youtube::Chapter {
                start_secs: 95,
                title: "Middle".into(),
            }],
            key_points: vec!["a key point".into()],
            summary: None,
        };
        let md = transcript_markdown(&transcript);
        assert!(md.starts_with("# A Video"));
        assert!(md.contains("**Channel:** A Channel"));
        assert!(md.contains("- 1:35 Middle"));
        assert!(md.contains("## Transcript\n\nall the words spoken"));
    }
}
