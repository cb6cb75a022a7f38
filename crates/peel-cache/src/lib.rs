//! In-process result cache.
//!
//! Keyed by a hash of the normalised URL plus the options that change what
//! bytes come back. Reads are lock-free snapshots; writes are last-write-wins
//! per key. Eviction is LRU under either an entry cap or a byte cap,
//! whichever trips first.

use dashmap::DashMap;
use peel_types::{PeelRequest, PeelResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Cache tuning. TTLs can be overridden per namespace (`result`, `youtube`,
/// `dns` and so on share one store but age differently).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Default time-to-live in seconds.
    pub ttl_secs: u64,
    pub max_entries: usize,
    pub max_bytes: usize,
    #[serde(default)]
    pub namespace_ttl_secs: HashMap<String, u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 900,
            max_entries: 2048,
            max_bytes: 256 * 1024 * 1024,
            namespace_ttl_secs: HashMap::new(),
        }
    }
}

struct Entry {
    result: PeelResult,
    stored_at: Instant,
    ttl: Duration,
    /// Monotonic access stamp for LRU ordering.
    last_access: AtomicU64,
    bytes: usize,
}

/// Process-wide result cache.
pub struct ResultCache {
    config: CacheConfig,
    entries: DashMap<String, Arc<Entry>>,
    clock: AtomicU64,
    total_bytes: AtomicU64,
}

impl ResultCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: DashMap::new(),
            clock: AtomicU64::new(0),
            total_bytes: AtomicU64::new(0),
        }
    }

    /// Derive the cache key for a request: sha256 over the normalised URL and
    /// every option that affects the returned bytes.
    pub fn key_for(request: &PeelRequest) -> String {
        let normalised = normalise_url(&request.url);
        let mut hasher = Sha256::new();
        hasher.update(normalised.as_bytes());
        hasher.update(b"|");
        hasher.update(request.cache_key_material().as_bytes());
        hex::encode(&hasher.finalize()[..16])
    }

    pub fn get(&self, key: &str) -> Option<PeelResult> {
        let entry = self.entries.get(key)?;
        if entry.stored_at.elapsed() > entry.ttl {
            drop(entry);
            self.remove(key);
            return None;
        }
        let stamp = self.clock.fetch_add(1, Ordering::Relaxed) + 1;
        entry.last_access.store(stamp, Ordering::Relaxed);
        Some(entry.result.clone())
    }

    pub fn put(&self, key: String, result: PeelResult) {
        self.put_ns("result", key, result)
    }

    pub fn put_ns(&self, namespace: &str, key: String, result: PeelResult) {
        let ttl = self
            .config
            .namespace_ttl_secs
            .get(namespace)
            .copied()
            .unwrap_or(self.config.ttl_secs);
        let bytes = result.content.len() + key.len() + 256;
        let stamp = self.clock.fetch_add(1, Ordering::Relaxed) + 1;
        let entry = Arc::new(Entry {
            result,
            stored_at: Instant::now(),
            ttl: Duration::from_secs(ttl),
            last_access: AtomicU64::new(stamp),
            bytes,
        });
        if let Some(prev) = self.entries.insert(key, entry) {
            self.total_bytes
                .fetch_sub(prev.bytes as u64, Ordering::Relaxed);
        }
        self.total_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
        self.evict_if_needed();
    }

    pub fn remove(&self, key: &str) {
        if let Some((_, entry)) = self.entries.remove(key) {
            self.total_bytes
                .fetch_sub(entry.bytes as u64, Ordering::Relaxed);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn bytes(&self) -> usize {
        self.total_bytes.load(Ordering::Relaxed) as usize
    }

    /// Drop expired entries. Called by the background sweeper; safe to call
    /// at any time.
    pub fn purge_expired(&self) {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.value().stored_at.elapsed() > e.value().ttl)
            .map(|e| e.key().clone())
            .collect();
        for key in expired {
            self.remove(&key);
        }
    }

    fn evict_if_needed(&self) {
        while self.entries.len() > self.config.max_entries
            || self.bytes() > self.config.max_bytes
        {
            let Some(lru_key) = self.least_recent_key() else {
                break;
            };
            debug!(key = %lru_key, "evicting least-recently-used cache entry");
            self.remove(&lru_key);
        }
    }

    fn least_recent_key(&self) -> Option<String> {
        self.entries
            .iter()
            .min_by_key(|e| e.value().last_access.load(Ordering::Relaxed))
            .map(|e| e.key().clone())
    }

    /// Spawn a periodic purge task. The task holds a weak handle so dropping
    /// the last cache reference stops the sweeper.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match weak.upgrade() {
                    Some(cache) => cache.purge_expired(),
                    None => break,
                }
            }
        })
    }
}

/// Normalise a URL for cache-keying: lowercase scheme/host, drop fragments,
/// drop a trailing slash on the root path.
pub fn normalise_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            let mut s = parsed.to_string();
            if parsed.path() == "/" && parsed.query().is_none() && s.ends_with('/') {
                s.pop();
            }
            s
        }
        Err(_) => raw.to_string(),
    }
}
