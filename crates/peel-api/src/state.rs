//! Shared application state.

use crate::search::{NoneProvider, SearchProvider};
use dashmap::DashMap;
use peel_pipeline::PeelServices;
use peel_types::PeelResult;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub services: Arc<PeelServices>,
    pub jobs: Arc<JobStore>,
    pub search: Arc<dyn SearchProvider>,
    pub auth: AuthConfig,
    /// url -> last content fingerprint seen by /v1/watch.
    pub watch_fingerprints: Arc<DashMap<String, String>>,
}

impl AppState {
    pub fn new(services: Arc<PeelServices>, auth: AuthConfig) -> Self {
        Self {
            services,
            jobs: Arc::new(JobStore::default()),
            search: Arc::new(NoneProvider::new(true)),
            auth,
            watch_fingerprints: Arc::new(DashMap::new()),
        }
    }
}

/// API keys accepted by the bearer middleware. Permissive when empty (local
/// or development deployments).
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    pub api_keys: Vec<String>,
}

impl AuthConfig {
    pub fn from_env() -> Self {
        let api_keys = std::env::var("PEEL_API_KEYS")
            .map(|raw| {
                raw.split(',')
                    .map(|k| k.trim().to_string())
                    .filter(|k| !k.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        Self { api_keys }
    }

    pub fn allows(&self, bearer: Option<&str>) -> bool {
        if self.api_keys.is_empty() {
            return true;
        }
        match bearer {
            Some(token) => token.starts_with("wp_") && self.api_keys.iter().any(|k| k == token),
            None => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Scraping,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlJob {
    pub id: String,
    pub status: JobStatus,
    pub total: usize,
    pub completed: usize,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub results: Vec<PeelResult>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

/// In-memory async job registry for crawl/map jobs.
#[derive(Default)]
pub struct JobStore {
    jobs: DashMap<String, CrawlJob>,
}

impl JobStore {
    pub fn create(&self) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        self.jobs.insert(
            id.clone(),
            CrawlJob {
                id: id.clone(),
                status: JobStatus::Queued,
                total: 0,
                completed: 0,
                results: Vec::new(),
                error: None,
            },
        );
        id
    }

    pub fn get(&self, id: &str) -> Option<CrawlJob> {
        self.jobs.get(id).map(|j| j.clone())
    }

    pub fn update<F: FnOnce(&mut CrawlJob)>(&self, id: &str, apply: F) {
        if let Some(mut job) = self.jobs.get_mut(id) {
            apply(&mut job);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_permissive_when_unconfigured() {
        let auth = AuthConfig::default();
        assert!(auth.allows(None));
        assert!(auth.allows(Some("anything")));
    }

    #[test]
    fn auth_requires_known_wp_key() {
        let auth = AuthConfig {
            api_keys: vec!["wp_live_abc".to_string()],
        };
        assert!(auth.allows(Some("wp_live_abc")));
        assert!(!auth.allows(Some("wp_other")));
        assert!(!auth.allows(Some("live_abc")));
        assert!(!auth.allows(None));
    }

    #[test]
    fn job_lifecycle() {
        let store = JobStore::default();
        let id = store.create();
        assert_eq!(store.get(&id).unwrap().status, JobStatus::Queued);

        store.update(&id, |job| {
            job.status = JobStatus::Scraping;
            job.total = 5;
        });
        let job = store.get(&id).unwrap();
        assert_eq!(job.status, JobStatus::Scraping);
        assert_eq!(job.total, 5);
        assert!(store.get("missing").is_none());
    }
}
