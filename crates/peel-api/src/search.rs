//! Search provider seam.
//!
//! The pipeline does not specify a search backend; the default provider
//! parses URLs straight out of the query, which covers agents that paste
//! links. Real backends implement the same trait behind configuration.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use peel_types::{PeelError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://[^\s,\n]+").expect("static regex"));

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, count: usize) -> Result<Vec<SearchHit>>;
}

/// Extracts URLs from the query text instead of calling a search API.
pub struct NoneProvider {
    enable_url_parsing: bool,
}

impl NoneProvider {
    pub fn new(enable_url_parsing: bool) -> Self {
        Self { enable_url_parsing }
    }

    fn extract_urls(&self, query: &str) -> Vec<String> {
        if !self.enable_url_parsing {
            return Vec::new();
        }
        URL_RE
            .find_iter(query)
            .map(|m| m.as_str().trim_end_matches([',', '.', ';', ')', ']']))
            .filter(|candidate| url::Url::parse(candidate).is_ok())
            .map(String::from)
            .collect()
    }
}

#[async_trait]
impl SearchProvider for NoneProvider {
    async fn search(&self, query: &str, count: usize) -> Result<Vec<SearchHit>> {
        let urls = self.extract_urls(query);
        if urls.is_empty() {
            return Err(PeelError::validation(
                "no URLs found in query; paste URLs directly or configure a search backend",
            ));
        }
        Ok(urls
            .into_iter()
            .take(count)
            .map(|url| SearchHit {
                title: url.clone(),
                snippet: String::new(),
                url,
            })
            .collect())
    }
}
