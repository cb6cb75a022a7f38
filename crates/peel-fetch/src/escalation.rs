//! The escalation ladder.
//!
//! Fetching is a state machine over rungs {Simple, Browser, Stealth}: each
//! rung retries transient failures with bounded backoff, walks the caller's
//! proxy chain on blocked outcomes, and hands the URL to the next rung when
//! it cannot produce real content. The rung that produced the returned
//! bytes is recorded on the outcome; cancellation aborts the whole ladder
//! without escalating.

use crate::client::{build_client, simple_get, ClientConfig, SimpleResponse};
use crate::dns::PreResolver;
use crate::governor::HostGovernor;
use async_trait::async_trait;
use peel_stealth::{detect_challenge, ChallengeKind, UserAgentRotator};
use peel_types::{
    Body, CancellationSignal, FetchMethod, FetchOutcome, PageAction, PeelError, PeelRequest,
    Result,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// What the fetcher asks of a browser rung. The concrete controller lives
/// behind this contract so the fetch crate never links a browser engine.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub url: String,
    pub wait_ms: Option<u64>,
    pub actions: Vec<PageAction>,
    pub stealth: bool,
    pub user_agent: Option<String>,
    pub headers: Vec<(String, String)>,
    pub proxy: Option<String>,
    pub profile_dir: Option<String>,
    pub screenshot: bool,
    pub screenshot_full_page: bool,
}

#[derive(Debug)]
pub struct RenderedPage {
    pub final_url: String,
    pub html: String,
    pub status: u16,
    pub screenshot: Option<Vec<u8>>,
}

#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(
        &self,
        request: &RenderRequest,
        cancel: &CancellationSignal,
    ) -> Result<RenderedPage>;
}

#[derive(Debug, Clone)]
pub struct EscalationConfig {
    pub max_attempts_per_rung: u32,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
    /// Declared-HTML bodies shorter than this escalate.
    pub min_html_bytes: usize,
    pub client: ClientConfig,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            max_attempts_per_rung: 3,
            backoff_base: Duration::from_millis(500),
            backoff_cap: Duration::from_secs(2),
            min_html_bytes: 512,
            client: ClientConfig::default(),
        }
    }
}

/// Outcome of one attempt, before rung policy is applied.
enum AttemptVerdict {
    Success(FetchOutcome),
    /// Retry on the same rung (transient failure).
    Retry(PeelError, Option<Duration>),
    /// Advance proxy, then rung (blocked or unusable content).
    Blocked(PeelError),
    /// Abort the whole ladder (plain 4xx, validation, cancellation).
    Fatal(PeelError),
}

/// Rung failure with the escalation decision attached.
enum RungError {
    Escalate(PeelError),
    Fatal(PeelError),
}

pub struct EscalationFetcher {
    config: EscalationConfig,
    governor: Arc<HostGovernor>,
    resolver: Option<Arc<PreResolver>>,
    rotator: Arc<UserAgentRotator>,
    renderer: Option<Arc<dyn PageRenderer>>,
}

impl EscalationFetcher {
    pub fn new(
        config: EscalationConfig,
        governor: Arc<HostGovernor>,
        resolver: Option<Arc<PreResolver>>,
        rotator: Arc<UserAgentRotator>,
        renderer: Option<Arc<dyn PageRenderer>>,
    ) -> Self {
        Self {
            config,
            governor,
            resolver,
            rotator,
            renderer,
        }
    }

    /// Walk the ladder until a rung produces content.
    #[instrument(skip(self, request, cancel), fields(url = %request.url))]
    pub async fn fetch(
        &self,
        request: &PeelRequest,
        cancel: &CancellationSignal,
    ) -> Result<FetchOutcome> {
        let started = Instant::now();
        let host = url::Url::parse(&request.url)?
            .host_str()
            .ok_or_else(|| PeelError::validation("url has no host"))?
            .to_string();

        let mut rung = if request.stealth {
            FetchMethod::Stealth
        } else if request.render {
            FetchMethod::Browser
        } else {
            FetchMethod::Simple
        };

        let mut attempted: Vec<FetchMethod> = Vec::new();
        let mut last_error = PeelError::internal("escalation ladder exhausted");

        loop {
            cancel.check()?;
            attempted.push(rung);

            match self
                .run_rung(rung, &host, request, &attempted, started, cancel)
                .await
            {
                Ok(outcome) => return Ok(outcome),
                Err(RungError::Fatal(error)) => return Err(error),
                Err(RungError::Escalate(error)) => {
                    warn!(rung = %rung, error = %error, "rung failed");
                    last_error = error;
                }
            }

            rung = match rung {
                FetchMethod::Simple => FetchMethod::Browser,
                FetchMethod::Browser => FetchMethod::Stealth,
                FetchMethod::Stealth | FetchMethod::Cached => return Err(last_error),
            };
            if self.renderer.is_none() {
                debug!("no browser renderer configured, cannot escalate further");
                return Err(last_error);
            }
        }
    }

    /// One rung: proxy chain outside, bounded retries inside.
    async fn run_rung(
        &self,
        rung: FetchMethod,
        host: &str,
        request: &PeelRequest,
        attempted: &[FetchMethod],
        started: Instant,
        cancel: &CancellationSignal,
    ) -> std::result::Result<FetchOutcome, RungError> {
        let proxies: Vec<Option<String>> = if request.proxies.is_empty() {
            vec![None]
        } else {
            request.proxies.iter().cloned().map(Some).collect()
        };

        let mut last_error = RungError::Escalate(PeelError::internal("no attempt ran"));
        for proxy in proxies {
            match self
                .attempt_with_retries(rung, host, request, proxy.as_deref(), attempted, started, cancel)
                .await
            {
                Ok(outcome) => return Ok(outcome),
                Err(fatal @ RungError::Fatal(_)) => return Err(fatal),
                Err(error) => {
                    if proxy.is_some() {
                        debug!(proxy = ?proxy, "proxy exhausted, advancing");
                    }
                    last_error = error;
                }
            }
        }
        Err(last_error)
    }

    #[allow(clippy::too_many_arguments)]
    async fn attempt_with_retries(
        &self,
        rung: FetchMethod,
        host: &str,
        request: &PeelRequest,
        proxy: Option<&str>,
        attempted: &[FetchMethod],
        started: Instant,
        cancel: &CancellationSignal,
    ) -> std::result::Result<FetchOutcome, RungError> {
        let mut last_error = PeelError::internal("no attempt ran");

        for attempt in 0..self.config.max_attempts_per_rung {
            if let Err(e) = cancel.check() {
                return Err(RungError::Fatal(e));
            }
            if let Err(e) = self.governor.acquire(host, cancel).await {
                return Err(RungError::Fatal(e));
            }

            let verdict = match rung {
                FetchMethod::Simple => {
                    self.simple_attempt(request, proxy, attempted, started, cancel)
                        .await
                }
                FetchMethod::Browser | FetchMethod::Stealth => {
                    self.render_attempt(rung, request, proxy, attempted, started, cancel)
                        .await
                }
                FetchMethod::Cached => {
                    return Err(RungError::Fatal(PeelError::internal(
                        "cached is not a fetch rung",
                    )))
                }
            };

            match verdict {
                AttemptVerdict::Success(outcome) => {
                    if attempt > 0 {
                        debug!(attempt = attempt + 1, "succeeded after retry");
                    }
                    return Ok(outcome);
                }
                AttemptVerdict::Retry(error, retry_after) => {
                    if matches!(error, PeelError::Aborted) {
                        return Err(RungError::Fatal(PeelError::Aborted));
                    }
                    last_error = error;
                    if attempt + 1 < self.config.max_attempts_per_rung {
                        let delay = retry_after.unwrap_or_else(|| self.backoff_delay(attempt));
                        debug!(attempt = attempt + 1, delay_ms = delay.as_millis() as u64, "retrying");
                        tokio::time::sleep(delay.min(self.config.backoff_cap)).await;
                    }
                }
                AttemptVerdict::Blocked(error) => return Err(RungError::Escalate(error)),
                AttemptVerdict::Fatal(error) => return Err(RungError::Fatal(error)),
            }
        }
        Err(RungError::Escalate(last_error))
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = self.config.backoff_base.as_millis() as u64 * (1u64 << attempt);
        Duration::from_millis(exp).min(self.config.backoff_cap)
    }

    async fn simple_attempt(
        &self,
        request: &PeelRequest,
        proxy: Option<&str>,
        attempted: &[FetchMethod],
        started: Instant,
        cancel: &CancellationSignal,
    ) -> AttemptVerdict {
        let client = match build_client(&self.config.client, proxy, self.resolver.clone()) {
            Ok(client) => client,
            Err(error) => return AttemptVerdict::Blocked(error),
        };
        let user_agent = request
            .user_agent
            .clone()
            .unwrap_or_else(|| self.rotator.next().to_string());
        let headers: Vec<(String, String)> = request
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let response = match simple_get(
            &client,
            &request.url,
            &user_agent,
            &headers,
            &request.cookies,
            cancel,
        )
        .await
        {
            Ok(response) => response,
            Err(PeelError::Aborted) => return AttemptVerdict::Fatal(PeelError::Aborted),
            Err(error) => return AttemptVerdict::Retry(error, None),
        };

        self.classify_simple(response, request, attempted, started)
    }

    fn classify_simple(
        &self,
        response: SimpleResponse,
        request: &PeelRequest,
        attempted: &[FetchMethod],
        started: Instant,
    ) -> AttemptVerdict {
        let status = response.status;
        let is_html = response.content_type.starts_with("text/html")
            || response.content_type.starts_with("application/xhtml");

        // Non-HTML payloads never carry challenges worth escalating over.
        if status == 200 && !is_html {
            return AttemptVerdict::Success(FetchOutcome {
                final_url: response.final_url,
                status,
                content_type: response.content_type,
                elapsed_ms: started.elapsed().as_millis() as u64,
                body: Body::Binary(response.body),
                method: FetchMethod::Simple,
                screenshot: None,
                attempted_strategies: attempted.to_vec(),
            });
        }

        let html = String::from_utf8_lossy(&response.body).into_owned();
        let verdict = detect_challenge(&html, status);

        match status {
            200 => {
                if verdict.is_challenge {
                    let kind = verdict
                        .kind
                        .map(|k| k.to_string())
                        .unwrap_or_else(|| "unknown".to_string());
                    if verdict.kind == Some(ChallengeKind::EmptyShell) {
                        debug!("empty shell detected, escalating to browser");
                    }
                    return AttemptVerdict::Blocked(PeelError::blocked(kind, true));
                }
                if html.len() < self.config.min_html_bytes {
                    return AttemptVerdict::Blocked(PeelError::blocked(
                        "thin-html".to_string(),
                        true,
                    ));
                }
                AttemptVerdict::Success(FetchOutcome {
                    final_url: response.final_url,
                    status,
                    content_type: response.content_type,
                    elapsed_ms: started.elapsed().as_millis() as u64,
                    body: Body::Html(html),
                    method: FetchMethod::Simple,
                    screenshot: None,
                    attempted_strategies: attempted.to_vec(),
                })
            }
            403 | 503 if verdict.is_challenge && verdict.confidence >= 0.7 => {
                let kind = verdict
                    .kind
                    .map(|k| k.to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                AttemptVerdict::Blocked(PeelError::blocked(kind, true))
            }
            429 => AttemptVerdict::Retry(PeelError::Http { status }, response.retry_after),
            s if s >= 500 => AttemptVerdict::Retry(PeelError::Http { status }, None),
            s if s >= 400 => {
                // Plain client errors are final; the page does not exist or
                // rejects us for non-bot reasons, and no rung changes that.
                AttemptVerdict::Fatal(PeelError::Http { status })
            }
            _ => {
                // 1xx/3xx residue after redirects resolved: treat the body
                // as-is when present, otherwise retry.
                if request.render || html.is_empty() {
                    AttemptVerdict::Retry(PeelError::Http { status }, None)
                } else {
                    AttemptVerdict::Success(FetchOutcome {
                        final_url: response.final_url,
                        status,
                        content_type: response.content_type,
                        elapsed_ms: started.elapsed().as_millis() as u64,
                        body: Body::Html(html),
                        method: FetchMethod::Simple,
                        screenshot: None,
                        attempted_strategies: attempted.to_vec(),
                    })
                }
            }
        }
    }

    async fn render_attempt(
        &self,
        rung: FetchMethod,
        request: &PeelRequest,
        proxy: Option<&str>,
        attempted: &[FetchMethod],
        started: Instant,
        cancel: &CancellationSignal,
    ) -> AttemptVerdict {
        let Some(renderer) = self.renderer.as_ref() else {
            return AttemptVerdict::Blocked(PeelError::blocked("no-renderer", false));
        };

        let render_request = RenderRequest {
            url: request.url.clone(),
            wait_ms: request.wait_ms,
            actions: request.actions.clone(),
            stealth: rung == FetchMethod::Stealth,
            user_agent: request
                .user_agent
                .clone()
                .or_else(|| Some(self.rotator.next().to_string())),
            headers: request
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            proxy: proxy.map(String::from),
            profile_dir: request.profile_dir.clone(),
            screenshot: request.screenshot,
            screenshot_full_page: request.screenshot_full_page,
        };

        let page = match renderer.render(&render_request, cancel).await {
            Ok(page) => page,
            Err(PeelError::Aborted) => return AttemptVerdict::Fatal(PeelError::Aborted),
            Err(error @ (PeelError::Timeout { .. } | PeelError::Network { .. })) => {
                return AttemptVerdict::Retry(error, None)
            }
            Err(error) => return AttemptVerdict::Blocked(error),
        };

        let verdict = detect_challenge(&page.html, page.status);
        if verdict.is_challenge && verdict.kind != Some(ChallengeKind::EmptyShell) {
            let kind = verdict
                .kind
                .map(|k| k.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            // A challenge that survived the stealth rung is final.
            let retryable = rung != FetchMethod::Stealth;
            return AttemptVerdict::Blocked(PeelError::blocked(kind, retryable));
        }

        info!(rung = %rung, "render succeeded");
        AttemptVerdict::Success(FetchOutcome {
            final_url: page.final_url,
            status: page.status,
            content_type: "text/html".to_string(),
            elapsed_ms: started.elapsed().as_millis() as u64,
            body: Body::Html(page.html),
            method: rung,
            screenshot: page.screenshot,
            attempted_strategies: attempted.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peel_stealth::RotationStrategy;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(renderer: Option<Arc<dyn PageRenderer>>) -> EscalationFetcher {
        let mut config = EscalationConfig::default();
        config.backoff_base = Duration::from_millis(10);
        config.backoff_cap = Duration::from_millis(20);
        config.min_html_bytes = 64;
        EscalationFetcher::new(
            config,
            Arc::new(HostGovernor::new(crate::governor::GovernorConfig {
                rate_per_sec: 1000.0,
                burst: 1000.0,
                overrides: Default::default(),
            })),
            None,
            Arc::new(UserAgentRotator::new(RotationStrategy::Sticky)),
            renderer,
        )
    }

    struct FakeRenderer {
        html: String,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PageRenderer for FakeRenderer {
        async fn render(
            &self,
            request: &RenderRequest,
            _cancel: &CancellationSignal,
        ) -> Result<RenderedPage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(RenderedPage {
                final_url: request.url.clone(),
                html: self.html.clone(),
                status: 200,
                screenshot: None,
            })
        }
    }

    fn article_body() -> String {
        format!(
            "<html><body><article><p>{}</p></article></body></html>",
            "Real article text with plenty of substance to clear the minimum. ".repeat(4)
        )
    }

    #[tokio::test]
    async fn simple_rung_succeeds_on_plain_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/article"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html; charset=utf-8")
                    .set_body_string(article_body()),
            )
            .mount(&server)
            .await;

        let fetcher = fetcher(None);
        let request = PeelRequest::new(format!("{}/article", server.uri()));
        let cancel = CancellationSignal::unbounded();
        let outcome = fetcher.fetch(&request, &cancel).await.unwrap();

        assert_eq!(outcome.method, FetchMethod::Simple);
        assert_eq!(outcome.status, 200);
        assert_eq!(outcome.attempted_strategies, vec![FetchMethod::Simple]);
        assert!(outcome.html().unwrap().contains("Real article text"));
    }

    #[tokio::test]
    async fn challenge_page_escalates_to_browser() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(503)
                    .insert_header("content-type", "text/html")
                    .set_body_string(
                        "<html><head><title>Just a moment...</title></head>\
                         <body><div class=\"cf-browser-verification\">Checking your \
                         browser</div></body></html>",
                    ),
            )
            .mount(&server)
            .await;

        let renderer = Arc::new(FakeRenderer {
            html: article_body(),
            calls: AtomicUsize::new(0),
        });
        let fetcher = fetcher(Some(renderer.clone()));
        let request = PeelRequest::new(server.uri());
        let cancel = CancellationSignal::unbounded();
        let outcome = fetcher.fetch(&request, &cancel).await.unwrap();

        assert_eq!(outcome.method, FetchMethod::Browser);
        assert_eq!(
            outcome.attempted_strategies,
            vec![FetchMethod::Simple, FetchMethod::Browser]
        );
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn thin_html_escalates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string("<html></html>"),
            )
            .mount(&server)
            .await;

        let renderer = Arc::new(FakeRenderer {
            html: article_body(),
            calls: AtomicUsize::new(0),
        });
        let fetcher = fetcher(Some(renderer));
        let request = PeelRequest::new(server.uri());
        let cancel = CancellationSignal::unbounded();
        let outcome = fetcher.fetch(&request, &cancel).await.unwrap();
        assert_eq!(outcome.method, FetchMethod::Browser);
    }

    #[tokio::test]
    async fn four_oh_four_is_final_without_renderer_calls() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(404)
                    .insert_header("content-type", "text/html")
                    .set_body_string("<html><head><title>Not Found</title></head></html>"),
            )
            .mount(&server)
            .await;

        let renderer = Arc::new(FakeRenderer {
            html: article_body(),
            calls: AtomicUsize::new(0),
        });
        let fetcher = fetcher(Some(renderer.clone()));
        let request = PeelRequest::new(server.uri());
        let cancel = CancellationSignal::unbounded();
        let err = fetcher.fetch(&request, &cancel).await.expect_err("404");
        assert!(matches!(err, PeelError::Http { status: 404 }));
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 0);
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn forced_render_skips_simple() {
        let renderer = Arc::new(FakeRenderer {
            html: article_body(),
            calls: AtomicUsize::new(0),
        });
        let fetcher = fetcher(Some(renderer.clone()));
        let mut request = PeelRequest::new("https://example.com/page");
        request.render = true;
        let cancel = CancellationSignal::unbounded();
        let outcome = fetcher.fetch(&request, &cancel).await.unwrap();
        assert_eq!(outcome.method, FetchMethod::Browser);
        assert_eq!(outcome.attempted_strategies, vec![FetchMethod::Browser]);
    }

    #[tokio::test]
    async fn forced_stealth_goes_straight_to_top_rung() {
        let renderer = Arc::new(FakeRenderer {
            html: article_body(),
            calls: AtomicUsize::new(0),
        });
        let fetcher = fetcher(Some(renderer));
        let mut request = PeelRequest::new("https://example.com/page");
        request.stealth = true;
        let cancel = CancellationSignal::unbounded();
        let outcome = fetcher.fetch(&request, &cancel).await.unwrap();
        assert_eq!(outcome.method, FetchMethod::Stealth);
    }

    #[tokio::test]
    async fn five_hundreds_retry_then_escalate() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502).insert_header("content-type", "text/html"))
            .mount(&server)
            .await;

        let fetcher = fetcher(None);
        let request = PeelRequest::new(server.uri());
        let cancel = CancellationSignal::unbounded();
        let err = fetcher.fetch(&request, &cancel).await.expect_err("502");
        assert!(matches!(err, PeelError::Http { status: 502 }));
        // three attempts on the simple rung, no renderer to escalate to
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn cancellation_propagates_without_escalation() {
        let renderer = Arc::new(FakeRenderer {
            html: article_body(),
            calls: AtomicUsize::new(0),
        });
        let fetcher = fetcher(Some(renderer.clone()));
        let request = PeelRequest::new("https://example.com/page");
        let cancel = CancellationSignal::unbounded();
        cancel.cancel();
        let err = fetcher.fetch(&request, &cancel).await.expect_err("abort");
        assert!(matches!(err, PeelError::Aborted));
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn binary_content_passes_through_untouched() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/pdf")
                    .set_body_bytes(b"%PDF-1.7 tiny".to_vec()),
            )
            .mount(&server)
            .await;

        let fetcher = fetcher(None);
        let request = PeelRequest::new(server.uri());
        let cancel = CancellationSignal::unbounded();
        let outcome = fetcher.fetch(&request, &cancel).await.unwrap();
        assert_eq!(outcome.content_type, "application/pdf");
        assert!(matches!(outcome.body, Body::Binary(_)));
    }
}
