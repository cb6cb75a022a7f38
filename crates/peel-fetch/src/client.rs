//! HTTP client construction and the simple-rung fetch.

use crate::dns::PreResolver;
use peel_types::{CancellationSignal, PeelError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub connect_timeout_secs: u64,
    pub timeout_secs: u64,
    pub accept_invalid_certs: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 5,
            timeout_secs: 30,
            accept_invalid_certs: false,
        }
    }
}

/// Build a reqwest client, optionally behind a proxy and the pre-resolver.
pub fn build_client(
    config: &ClientConfig,
    proxy: Option<&str>,
    resolver: Option<Arc<PreResolver>>,
) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .gzip(true)
        .brotli(true)
        .cookie_store(true)
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .timeout(Duration::from_secs(config.timeout_secs))
        .redirect(reqwest::redirect::Policy::limited(10));

    if config.accept_invalid_certs {
        builder = builder.danger_accept_invalid_certs(true);
    }
    if let Some(proxy_url) = proxy {
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|e| PeelError::validation(format!("invalid proxy {proxy_url:?}: {e}")))?;
        builder = builder.proxy(proxy);
    }
    if let Some(resolver) = resolver {
        builder = builder.dns_resolver(resolver);
    }

    builder
        .build()
        .map_err(|e| PeelError::internal(format!("http client build failed: {e}")))
}

/// Raw response off the simple rung, before challenge analysis.
#[derive(Debug)]
pub struct SimpleResponse {
    pub final_url: String,
    pub status: u16,
    pub content_type: String,
    pub body: bytes::Bytes,
    pub retry_after: Option<Duration>,
}

/// One plain GET with browser-like headers. Transport failures map to the
/// typed taxonomy; HTTP statuses are returned for the caller to classify.
#[instrument(skip(client, headers, cookies, cancel), fields(url = %url))]
pub async fn simple_get(
    client: &reqwest::Client,
    url: &str,
    user_agent: &str,
    headers: &[(String, String)],
    cookies: &[String],
    cancel: &CancellationSignal,
) -> Result<SimpleResponse> {
    cancel.check()?;

    let mut request = client
        .get(url)
        .header(reqwest::header::USER_AGENT, user_agent);
    for (name, value) in peel_stealth::realistic_headers(user_agent) {
        request = request.header(name, value);
    }
    for (name, value) in headers {
        request = request.header(name.as_str(), value.as_str());
    }
    if !cookies.is_empty() {
        request = request.header(reqwest::header::COOKIE, cookies.join("; "));
    }

    let send = request.send();
    let response = match cancel.remaining() {
        Some(remaining) => tokio::time::timeout(remaining, send)
            .await
            .map_err(|_| PeelError::timeout("simple fetch"))?,
        None => send.await,
    }
    .map_err(classify_transport_error)?;

    let status = response.status().as_u16();
    let final_url = response.url().to_string();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs);

    let body = response
        .bytes()
        .await
        .map_err(|e| PeelError::network(format!("body read failed: {e}")))?;

    debug!(status, bytes = body.len(), content_type = %content_type, "simple fetch complete");
    Ok(SimpleResponse {
        final_url,
        status,
        content_type,
        body,
        retry_after,
    })
}

fn classify_transport_error(error: reqwest::Error) -> PeelError {
    if error.is_timeout() {
        PeelError::timeout("simple fetch")
    } else {
        PeelError::network(error.to_string())
    }
}
