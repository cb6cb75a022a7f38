//! Pipeline output.

use crate::outcome::FetchMethod;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Coarse class of the returned content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    #[default]
    Html,
    Json,
    Xml,
    Text,
    Document,
}

/// Stable 16-hex prefix of SHA-256(content). Identical fingerprints imply
/// byte-identical content.
pub fn content_fingerprint(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    hex::encode(&digest[..8])
}

/// Final output of one pipeline execution.
///
/// `metadata` stays a free-form map; well-known keys have typed accessors so
/// extractors can add fields without schema churn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeelResult {
    pub url: String,
    pub title: Option<String>,
    pub content: String,
    pub content_type: ContentKind,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    /// Sorted, deduped, http(s)-only.
    #[serde(default)]
    pub links: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    pub tokens: usize,
    pub method: FetchMethod,
    pub elapsed_ms: u64,
    /// 0.0 .. 1.0
    pub quality: f64,
    pub fingerprint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted: Option<HashMap<String, serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_tracking: Option<ChangeTracking>,
}

/// Change detection against a previously stored fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeTracking {
    pub previous_fingerprint: Option<String>,
    pub changed: bool,
}

impl PeelResult {
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }

    pub fn description(&self) -> Option<&str> {
        self.meta_str("description")
    }

    pub fn author(&self) -> Option<&str> {
        self.meta_str("author")
    }

    pub fn language(&self) -> Option<&str> {
        self.meta_str("language")
    }

    pub fn word_count(&self) -> Option<u64> {
        self.metadata.get("wordCount").and_then(|v| v.as_u64())
    }

    pub fn set_meta(&mut self, key: &str, value: impl Into<serde_json::Value>) {
        let value = value.into();
        if !value.is_null() {
            self.metadata.insert(key.to_string(), value);
        }
    }

    /// Recompute `fingerprint` after any content mutation. Post-processing
    /// stages that rewrite `content` must call this before returning.
    pub fn refresh_fingerprint(&mut self) {
        self.fingerprint = content_fingerprint(&self.content);
    }
}
