//! DNS pre-resolver.
//!
//! Keeps `host -> SocketAddr[]` warm for a configurable list of popular
//! domains and satisfies reqwest's resolver contract, so clients built with
//! it skip system DNS for the hot set. Refresh failures are logged and
//! otherwise ignored; a miss falls through to a live lookup.

use dashmap::DashMap;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Domains worth keeping warm by default.
const DEFAULT_HOSTS: &[&str] = &[
    "www.google.com",
    "www.youtube.com",
    "www.wikipedia.org",
    "en.wikipedia.org",
    "github.com",
    "www.reddit.com",
    "twitter.com",
    "x.com",
    "www.amazon.com",
    "medium.com",
    "stackoverflow.com",
    "news.ycombinator.com",
];

#[derive(Debug)]
pub struct PreResolver {
    cache: DashMap<String, Vec<SocketAddr>>,
    hosts: Vec<String>,
}

impl PreResolver {
    pub fn new() -> Arc<Self> {
        Self::with_hosts(DEFAULT_HOSTS.iter().map(|s| s.to_string()).collect())
    }

    pub fn with_hosts(hosts: Vec<String>) -> Arc<Self> {
        Arc::new(Self {
            cache: DashMap::new(),
            hosts,
        })
    }

    /// Resolve every configured host once. Failures never propagate.
    pub async fn warm_up(&self) {
        for host in &self.hosts {
            match tokio::net::lookup_host((host.as_str(), 443)).await {
                Ok(addrs) => {
                    let addrs: Vec<SocketAddr> = addrs.collect();
                    if !addrs.is_empty() {
                        debug!(host = %host, count = addrs.len(), "dns pre-resolved");
                        self.cache.insert(host.clone(), addrs);
                    }
                }
                Err(e) => warn!(host = %host, error = %e, "dns pre-resolve failed"),
            }
        }
    }

    /// Spawn the periodic refresh task.
    pub fn spawn_refresher(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match weak.upgrade() {
                    Some(resolver) => resolver.warm_up().await,
                    None => break,
                }
            }
        })
    }

    pub fn cached(&self, host: &str) -> Option<Vec<SocketAddr>> {
        self.cache.get(host).map(|entry| entry.clone())
    }
}

impl Resolve for PreResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let cached = self.cached(name.as_str());
        let host = name.as_str().to_string();
        Box::pin(async move {
            if let Some(addrs) = cached {
                let iter: Addrs = Box::new(addrs.into_iter());
                return Ok(iter);
            }
            let addrs = tokio::net::lookup_host((host.as_str(), 0))
                .await
                .map_err(|e| -> Box<dyn std::error::Error + Send + Sync> { Box::new(e) })?;
            let iter: Addrs = Box::new(addrs.collect::<Vec<_>>().into_iter());
            Ok(iter)
        })
    }
}
