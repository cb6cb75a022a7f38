//! Request model and validation.

use crate::errors::{PeelError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const MAX_URL_LEN: usize = 2048;
pub const MAX_WAIT_MS: u64 = 60_000;

/// Output format requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Markdown,
    Text,
    Html,
}

/// One step of a page-interaction script, executed in order on the rendered
/// page. Failure of a non-optional action fails the whole fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PageAction {
    Click {
        selector: String,
        #[serde(default)]
        optional: bool,
    },
    Type {
        selector: String,
        text: String,
        #[serde(default)]
        optional: bool,
    },
    #[serde(rename_all = "camelCase")]
    WaitFor {
        #[serde(default)]
        selector: Option<String>,
        #[serde(default)]
        ms: Option<u64>,
        #[serde(default)]
        optional: bool,
    },
    Scroll {
        #[serde(default)]
        pixels: Option<i64>,
        #[serde(default)]
        to_element: Option<String>,
        #[serde(default)]
        optional: bool,
    },
    Hover {
        selector: String,
        #[serde(default)]
        optional: bool,
    },
    Press {
        key: String,
        #[serde(default)]
        optional: bool,
    },
}

impl PageAction {
    pub fn is_optional(&self) -> bool {
        match self {
            PageAction::Click { optional, .. }
            | PageAction::Type { optional, .. }
            | PageAction::WaitFor { optional, .. }
            | PageAction::Scroll { optional, .. }
            | PageAction::Hover { optional, .. }
            | PageAction::Press { optional, .. } => *optional,
        }
    }
}

/// Declarative extraction: CSS field selectors, or a prompt + JSON schema for
/// an LLM-backed extractor downstream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractConfig {
    /// field name -> CSS selector
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub css: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<serde_json::Value>,
}

/// Immutable input to one pipeline execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PeelRequest {
    pub url: String,
    pub format: OutputFormat,
    /// Force the browser rung.
    pub render: bool,
    /// Force the stealth rung.
    pub stealth: bool,
    pub wait_ms: Option<u64>,
    pub timeout_ms: Option<u64>,
    pub user_agent: Option<String>,
    pub headers: HashMap<String, String>,
    pub cookies: Vec<String>,
    /// CSS selector to reduce the DOM to before conversion.
    pub selector: Option<String>,
    /// CSS selectors to drop before conversion.
    pub exclude: Vec<String>,
    pub include_tags: Vec<String>,
    pub exclude_tags: Vec<String>,
    pub screenshot: bool,
    pub screenshot_full_page: bool,
    pub actions: Vec<PageAction>,
    /// Enables BM25 filtering and quick-answer.
    pub question: Option<String>,
    /// Hard truncation ceiling.
    pub max_tokens: Option<usize>,
    /// Smart-distill target.
    pub budget: Option<usize>,
    pub extract: Option<ExtractConfig>,
    pub agent_mode: bool,
    pub profile_dir: Option<String>,
    pub proxies: Vec<String>,
    pub no_cache: bool,
}

impl Default for PeelRequest {
    fn default() -> Self {
        Self {
            url: String::new(),
            format: OutputFormat::Markdown,
            render: false,
            stealth: false,
            wait_ms: None,
            timeout_ms: None,
            user_agent: None,
            headers: HashMap::new(),
            cookies: Vec::new(),
            selector: None,
            exclude: Vec::new(),
            include_tags: Vec::new(),
            exclude_tags: Vec::new(),
            screenshot: false,
            screenshot_full_page: false,
            actions: Vec::new(),
            question: None,
            max_tokens: None,
            budget: None,
            extract: None,
            agent_mode: false,
            profile_dir: None,
            proxies: Vec::new(),
            no_cache: false,
        }
    }
}

impl PeelRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Validate every caller-controlled field. Called once at the pipeline
    /// entry; downstream stages may assume a validated request.
    pub fn validate(&self) -> Result<()> {
        validate_url(&self.url)?;

        if let Some(wait) = self.wait_ms {
            if wait > MAX_WAIT_MS {
                return Err(PeelError::validation(format!(
                    "waitMs {wait} exceeds maximum {MAX_WAIT_MS}"
                )));
            }
        }

        for (key, value) in &self.headers {
            if key.trim().is_empty() || key.contains([':', '\r', '\n']) {
                return Err(PeelError::validation(format!("invalid header name: {key:?}")));
            }
            if value.contains(['\r', '\n']) {
                return Err(PeelError::validation(format!(
                    "invalid header value for {key:?}"
                )));
            }
        }

        for proxy in &self.proxies {
            url::Url::parse(proxy)
                .map_err(|e| PeelError::validation(format!("invalid proxy {proxy:?}: {e}")))?;
        }

        Ok(())
    }

    /// Cache key material: the fields that change what bytes come back.
    pub fn cache_key_material(&self) -> String {
        format!(
            "{}|{:?}|{}|{}|{}|{:?}|{:?}|{:?}|{:?}|{:?}|{:?}|{:?}",
            self.url,
            self.format,
            self.render,
            self.stealth,
            self.agent_mode,
            self.selector,
            self.exclude,
            self.include_tags,
            self.exclude_tags,
            self.question,
            self.max_tokens,
            self.budget,
        )
    }
}

/// URL guard shared by the API, the CLI and the pipeline entry.
pub fn validate_url(raw: &str) -> Result<url::Url> {
    if raw.len() > MAX_URL_LEN {
        return Err(PeelError::validation(format!(
            "url length {} exceeds maximum {MAX_URL_LEN}",
            raw.len()
        )));
    }
    if raw
        .bytes()
        .any(|b| b <= 0x1F || b == 0x7F)
    {
        return Err(PeelError::validation("url contains control characters"));
    }
    let parsed = url::Url::parse(raw)
        .map_err(|e| PeelError::validation(format!("invalid url: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(PeelError::validation(format!(
            "unsupported scheme {other:?}, expected http or https"
        ))),
    }
}
