//! Fetcher → dispatcher handoff.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Strategy that produced (or attempted to produce) a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMethod {
    Simple,
    Browser,
    Stealth,
    Cached,
}

impl std::fmt::Display for FetchMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FetchMethod::Simple => "simple",
            FetchMethod::Browser => "browser",
            FetchMethod::Stealth => "stealth",
            FetchMethod::Cached => "cached",
        };
        f.write_str(s)
    }
}

/// Response body. HTML stays text; everything else stays bytes until the
/// content-type dispatcher decides what to do with it.
#[derive(Debug, Clone)]
pub enum Body {
    Html(String),
    Binary(Bytes),
}

impl Body {
    pub fn as_html(&self) -> Option<&str> {
        match self {
            Body::Html(s) => Some(s),
            Body::Binary(_) => None,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Body::Html(s) => s.as_bytes(),
            Body::Binary(b) => b,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Body::Html(s) => s.len(),
            Body::Binary(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Internal handoff between the escalation fetcher and the content
/// dispatcher.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub final_url: String,
    pub status: u16,
    pub content_type: String,
    pub elapsed_ms: u64,
    pub body: Body,
    /// The strategy that produced these bytes, never a later strategy that
    /// was attempted and failed.
    pub method: FetchMethod,
    pub screenshot: Option<Vec<u8>>,
    /// Every rung tried, in order, including the successful one.
    pub attempted_strategies: Vec<FetchMethod>,
}

impl FetchOutcome {
    pub fn html(&self) -> Option<&str> {
        self.body.as_html()
    }

    pub fn is_html(&self) -> bool {
        matches!(self.body, Body::Html(_))
    }
}
