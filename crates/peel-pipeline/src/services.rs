//! Long-lived service wiring.

use peel_cache::{CacheConfig, ResultCache};
use peel_fetch::{
    build_client, ClientConfig, EscalationConfig, EscalationFetcher, GovernorConfig, HostGovernor,
    PageRenderer, PreResolver,
};
use peel_stealth::{RotationStrategy, UserAgentRotator};
use peel_types::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Applied when the request carries no `timeoutMs`.
    pub default_timeout_ms: u64,
    /// Caption language preference for YouTube.
    pub language: String,
    /// Quick-answer passages returned.
    pub answer_passages: usize,
    pub cache: CacheConfig,
    pub governor: GovernorConfig,
    pub escalation_client: ClientConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 60_000,
            language: "en".to_string(),
            answer_passages: 3,
            cache: CacheConfig::default(),
            governor: GovernorConfig::default(),
            escalation_client: ClientConfig::default(),
        }
    }
}

/// Everything a request needs, created once at process start and shared.
/// The pipeline itself holds no cross-request state.
pub struct PeelServices {
    pub config: PipelineConfig,
    pub cache: Arc<ResultCache>,
    pub fetcher: Arc<EscalationFetcher>,
    /// Plain client for side fetches (YouTube watch pages, captions).
    pub http: reqwest::Client,
}

impl PeelServices {
    /// Wire the full service graph. `renderer` is `None` in environments
    /// without a browser; the ladder then stops after the simple rung.
    pub async fn build(
        config: PipelineConfig,
        renderer: Option<Arc<dyn PageRenderer>>,
    ) -> Result<Arc<Self>> {
        let resolver = PreResolver::new();
        resolver.warm_up().await;
        resolver.spawn_refresher(Duration::from_secs(300));

        let cache = Arc::new(ResultCache::new(config.cache.clone()));
        cache.spawn_sweeper(Duration::from_secs(60));

        let governor = Arc::new(HostGovernor::new(config.governor.clone()));
        let rotator = Arc::new(UserAgentRotator::new(RotationStrategy::Random));

        let escalation = EscalationConfig {
            client: config.escalation_client.clone(),
            ..Default::default()
        };
        let fetcher = Arc::new(EscalationFetcher::new(
            escalation,
            governor,
            Some(resolver.clone()),
            rotator,
            renderer,
        ));

        let http = build_client(&config.escalation_client, None, Some(resolver))?;

        Ok(Arc::new(Self {
            config,
            cache,
            fetcher,
            http,
        }))
    }

    /// Minimal wiring for tests: no DNS warm-up, no background tasks.
    pub fn build_for_tests(renderer: Option<Arc<dyn PageRenderer>>) -> Result<Arc<Self>> {
        let config = PipelineConfig {
            governor: GovernorConfig {
                rate_per_sec: 1000.0,
                burst: 1000.0,
                overrides: Default::default(),
            },
            ..Default::default()
        };
        let cache = Arc::new(ResultCache::new(config.cache.clone()));
        let governor = Arc::new(HostGovernor::new(config.governor.clone()));
        let rotator = Arc::new(UserAgentRotator::new(RotationStrategy::Sticky));
        let fetcher = Arc::new(EscalationFetcher::new(
            EscalationConfig {
                min_html_bytes: 32,
                ..Default::default()
            },
            governor,
            None,
            rotator,
            renderer,
        ));
        let http = build_client(&ClientConfig::default(), None, None)?;
        Ok(Arc::new(Self {
            config,
            cache,
            fetcher,
            http,
        }))
    }
}
