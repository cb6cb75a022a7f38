//! Endpoint handlers.

use crate::errors::ApiError;
use crate::state::{AppState, JobStatus};
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use peel_pipeline::peel;
use peel_types::{ExtractConfig, PeelRequest, PeelResult};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};
use url::Url;

fn request_id_from(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(String::from)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

fn ok_json<T: Serialize>(body: &T, request_id: &str) -> Response {
    let mut response = Json(serde_json::to_value(body).unwrap_or_default()).into_response();
    if let Ok(value) = axum::http::HeaderValue::from_str(request_id) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

/// `POST /v1/fetch` — the primary endpoint: PeelRequest in, PeelResult out.
pub async fn fetch(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<PeelRequest>,
) -> Result<Response, ApiError> {
    let request_id = request_id_from(&headers);
    info!(request_id = %request_id, url = %request.url, "fetch request");

    let result = peel(&state.services, &request)
        .await
        .map_err(|e| ApiError::from_peel(e, request_id.clone()))?;
    Ok(ok_json(&result, &request_id))
}

#[derive(Debug, Deserialize)]
pub struct SearchBody {
    pub query: String,
    #[serde(default)]
    pub count: Option<usize>,
}

/// `POST /v1/search`
pub async fn search(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<SearchBody>,
) -> Result<Response, ApiError> {
    let request_id = request_id_from(&headers);
    let hits = state
        .search
        .search(&body.query, body.count.unwrap_or(10))
        .await
        .map_err(|e| ApiError::from_peel(e, request_id.clone()))?;
    Ok(ok_json(&hits, &request_id))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlBody {
    pub url: String,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// `POST /v1/crawl` — start an async crawl job over same-host links.
pub async fn crawl_start(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CrawlBody>,
) -> Result<Response, ApiError> {
    let request_id = request_id_from(&headers);
    peel_types::request::validate_url(&body.url)
        .map_err(|e| ApiError::from_peel(e, request_id.clone()))?;

    let id = state.jobs.create();
    let limit = body.limit.unwrap_or(10).min(50);
    let job_state = state.clone();
    let job_id = id.clone();
    let seed = body.url.clone();

    tokio::spawn(async move {
        run_crawl_job(job_state, job_id, seed, limit).await;
    });

    Ok(ok_json(&json!({"success": true, "id": id, "url": body.url}), &request_id))
}

async fn run_crawl_job(state: AppState, id: String, seed: String, limit: usize) {
    state.jobs.update(&id, |job| job.status = JobStatus::Scraping);

    let seed_result = match peel(&state.services, &PeelRequest::new(&seed)).await {
        Ok(result) => result,
        Err(e) => {
            error!(job = %id, error = %e, "crawl seed failed");
            state.jobs.update(&id, |job| {
                job.status = JobStatus::Failed;
                job.error = Some(e.to_string());
            });
            return;
        }
    };

    let seed_host = Url::parse(&seed).ok().and_then(|u| u.host_str().map(String::from));
    let targets: Vec<String> = seed_result
        .links
        .iter()
        .filter(|link| {
            seed_host.as_deref().is_some_and(|host| {
                Url::parse(link)
                    .ok()
                    .and_then(|u| u.host_str().map(|h| h == host))
                    .unwrap_or(false)
            })
        })
        .take(limit.saturating_sub(1))
        .cloned()
        .collect();

    let total = 1 + targets.len();
    state.jobs.update(&id, |job| {
        job.total = total;
        job.completed = 1;
        job.results.push(seed_result);
    });

    for target in targets {
        match peel(&state.services, &PeelRequest::new(&target)).await {
            Ok(result) => state.jobs.update(&id, |job| {
                job.completed += 1;
                job.results.push(result);
            }),
            Err(e) => {
                error!(job = %id, url = %target, error = %e, "crawl page failed");
                state.jobs.update(&id, |job| job.completed += 1);
            }
        }
    }
    state.jobs.update(&id, |job| job.status = JobStatus::Completed);
    info!(job = %id, total, "crawl job complete");
}

/// `GET /v1/crawl/:id` and `GET /v1/jobs/:id`
pub async fn job_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let request_id = request_id_from(&headers);
    let job = state
        .jobs
        .get(&id)
        .ok_or_else(|| ApiError::not_found(request_id.clone(), "job"))?;

    // Firecrawl-compatible superset: status plus a `data` array once done.
    let data: Vec<&PeelResult> = job.results.iter().collect();
    let body = json!({
        "success": job.status != JobStatus::Failed,
        "id": job.id,
        "status": job.status,
        "total": job.total,
        "completed": job.completed,
        "data": if job.status == JobStatus::Completed { json!(data) } else { json!([]) },
        "error": job.error,
    });
    Ok(ok_json(&body, &request_id))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapBody {
    pub url: String,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// `POST /v1/map` — discover same-host URLs for a domain.
pub async fn map_urls(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<MapBody>,
) -> Result<Response, ApiError> {
    let request_id = request_id_from(&headers);
    let result = peel(&state.services, &PeelRequest::new(&body.url))
        .await
        .map_err(|e| ApiError::from_peel(e, request_id.clone()))?;

    let host = Url::parse(&body.url)
        .ok()
        .and_then(|u| u.host_str().map(String::from));
    let links: Vec<String> = result
        .links
        .into_iter()
        .filter(|link| {
            host.as_deref().is_some_and(|h| {
                Url::parse(link)
                    .ok()
                    .and_then(|u| u.host_str().map(|lh| lh == h))
                    .unwrap_or(false)
            })
        })
        .take(body.limit.unwrap_or(100))
        .collect();

    Ok(ok_json(&json!({"success": true, "links": links}), &request_id))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerBody {
    pub url: String,
    pub question: String,
}

/// `POST /v1/answer` — quick-answer over a page.
pub async fn answer(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<AnswerBody>,
) -> Result<Response, ApiError> {
    let request_id = request_id_from(&headers);
    let mut request = PeelRequest::new(&body.url);
    request.question = Some(body.question);

    let result = peel(&state.services, &request)
        .await
        .map_err(|e| ApiError::from_peel(e, request_id.clone()))?;

    let body = json!({
        "answer": result.metadata.get("answer"),
        "confidence": result.metadata.get("answerConfidence"),
        "questionType": result.metadata.get("questionType"),
        "url": result.url,
        "fingerprint": result.fingerprint,
    });
    Ok(ok_json(&body, &request_id))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractBody {
    pub url: String,
    pub extract: ExtractConfig,
}

/// `POST /v1/extract` — declarative field extraction.
pub async fn extract(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ExtractBody>,
) -> Result<Response, ApiError> {
    let request_id = request_id_from(&headers);
    let mut request = PeelRequest::new(&body.url);
    request.extract = Some(body.extract);

    let result = peel(&state.services, &request)
        .await
        .map_err(|e| ApiError::from_peel(e, request_id.clone()))?;
    let body = json!({
        "url": result.url,
        "extracted": result.extracted,
        "fingerprint": result.fingerprint,
    });
    Ok(ok_json(&body, &request_id))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeepFetchBody {
    pub url: String,
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub budget: Option<usize>,
}

/// `POST /v1/deep-fetch` — force the browser rung and agent defaults for
/// pages the simple path cannot see.
pub async fn deep_fetch(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<DeepFetchBody>,
) -> Result<Response, ApiError> {
    let request_id = request_id_from(&headers);
    let mut request = PeelRequest::new(&body.url);
    request.render = true;
    request.agent_mode = true;
    request.question = body.question;
    request.budget = body.budget;

    let result = peel(&state.services, &request)
        .await
        .map_err(|e| ApiError::from_peel(e, request_id.clone()))?;
    Ok(ok_json(&result, &request_id))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchBody {
    pub url: String,
}

/// `POST /v1/watch` — re-peel a URL and report whether its content changed
/// since the last watch call.
pub async fn watch(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<WatchBody>,
) -> Result<Response, ApiError> {
    let request_id = request_id_from(&headers);
    let mut request = PeelRequest::new(&body.url);
    request.no_cache = true;

    let mut result = peel(&state.services, &request)
        .await
        .map_err(|e| ApiError::from_peel(e, request_id.clone()))?;

    let previous = state
        .watch_fingerprints
        .insert(body.url.clone(), result.fingerprint.clone());
    let changed = previous
        .as_deref()
        .map(|prev| prev != result.fingerprint)
        .unwrap_or(false);
    result.change_tracking = Some(peel_types::result::ChangeTracking {
        previous_fingerprint: previous,
        changed,
    });
    Ok(ok_json(&result, &request_id))
}

/// Firecrawl-compatible `POST /v1/scrape`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeBody {
    pub url: String,
    #[serde(default)]
    pub formats: Vec<String>,
    #[serde(default)]
    pub only_main_content: Option<bool>,
    #[serde(default)]
    pub wait_for: Option<u64>,
}

pub async fn scrape(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ScrapeBody>,
) -> Result<Response, ApiError> {
    let request_id = request_id_from(&headers);
    let mut request = PeelRequest::new(&body.url);
    request.wait_ms = body.wait_for;
    if body.formats.iter().any(|f| f == "html") {
        request.format = peel_types::OutputFormat::Html;
    }

    match peel(&state.services, &request).await {
        Ok(result) => {
            let data = json!({
                "markdown": result.content,
                "metadata": {
                    "title": result.title,
                    "sourceURL": result.url,
                    "statusCode": 200,
                },
                "links": result.links,
            });
            Ok(ok_json(&json!({"success": true, "data": data}), &request_id))
        }
        Err(error) => {
            let api_error = ApiError::from_peel(error, request_id.clone());
            Ok(ok_json(
                &json!({"success": false, "error": api_error.message}),
                &request_id,
            ))
        }
    }
}

/// `GET /health`
pub async fn health() -> Response {
    Json(json!({"status": "ok"})).into_response()
}
