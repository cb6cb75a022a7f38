//! Warmed browser pool.
//!
//! Ordinary renders borrow a browser and return it; idle browsers past the
//! TTL are closed by the sweeper. Profile-backed launches are never pooled:
//! each profile directory is guarded by a process-wide lock so at most one
//! request writes to it at a time.

use crate::launcher::{launch_browser, LaunchOptions, LaunchedBrowser};
use dashmap::DashMap;
use peel_stealth::StealthConfig;
use peel_types::Result;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Maximum browsers kept warm.
    pub max_size: usize,
    /// Idle browsers older than this are closed.
    pub idle_ttl_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 4,
            idle_ttl_secs: 120,
        }
    }
}

struct IdleBrowser {
    launched: LaunchedBrowser,
    parked_at: Instant,
}

/// Process-wide pool plus the profile lock registry.
pub struct BrowserPool {
    config: PoolConfig,
    stealth: StealthConfig,
    idle: Mutex<VecDeque<IdleBrowser>>,
    profile_locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl BrowserPool {
    pub fn new(config: PoolConfig, stealth: StealthConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            stealth,
            idle: Mutex::new(VecDeque::new()),
            profile_locks: DashMap::new(),
        })
    }

    /// Borrow a pooled browser, launching a fresh one when the pool is dry.
    pub async fn checkout(&self, proxy: Option<&str>) -> Result<LaunchedBrowser> {
        // Proxied sessions get dedicated launches: the proxy is a process
        // flag, so a pooled browser cannot be retargeted.
        if proxy.is_none() {
            let mut idle = self.idle.lock().await;
            if let Some(parked) = idle.pop_front() {
                debug!("reusing pooled browser");
                return Ok(parked.launched);
            }
        }
        launch_browser(&LaunchOptions {
            stealth: self.stealth.clone(),
            profile_dir: None,
            proxy: proxy.map(String::from),
        })
        .await
    }

    /// Return a clean browser to the pool; closes it when the pool is full.
    pub async fn checkin(&self, launched: LaunchedBrowser) {
        let mut idle = self.idle.lock().await;
        if idle.len() < self.config.max_size {
            idle.push_back(IdleBrowser {
                launched,
                parked_at: Instant::now(),
            });
            return;
        }
        drop(idle);
        launched.close().await;
    }

    /// Discard a browser whose page state is unknown (errors, cancellation).
    pub async fn discard(&self, launched: LaunchedBrowser) {
        launched.close().await;
    }

    /// Launch a profile-backed browser, holding the profile's exclusive
    /// lock for the session's lifetime.
    pub async fn checkout_profile(
        &self,
        profile_dir: PathBuf,
        proxy: Option<&str>,
    ) -> Result<(LaunchedBrowser, OwnedMutexGuard<()>)> {
        let lock = self
            .profile_locks
            .entry(profile_dir.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock_owned().await;
        info!(profile = %profile_dir.display(), "profile lock acquired");

        let launched = launch_browser(&LaunchOptions {
            stealth: self.stealth.clone(),
            profile_dir: Some(profile_dir),
            proxy: proxy.map(String::from),
        })
        .await?;
        Ok((launched, guard))
    }

    /// Close idle browsers past the TTL.
    pub async fn sweep(&self) {
        let ttl = Duration::from_secs(self.config.idle_ttl_secs);
        let expired: Vec<LaunchedBrowser> = {
            let mut idle = self.idle.lock().await;
            let mut keep = VecDeque::new();
            let mut out = Vec::new();
            while let Some(parked) = idle.pop_front() {
                if parked.parked_at.elapsed() > ttl {
                    out.push(parked.launched);
                } else {
                    keep.push_back(parked);
                }
            }
            *idle = keep;
            out
        };
        for browser in expired {
            debug!("closing idle browser past ttl");
            browser.close().await;
        }
    }

    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match weak.upgrade() {
                    Some(pool) => pool.sweep().await,
                    None => break,
                }
            }
        })
    }

    /// Drain and close everything (process shutdown).
    pub async fn shutdown(&self) {
        let drained: Vec<LaunchedBrowser> = {
            let mut idle = self.idle.lock().await;
            idle.drain(..).map(|p| p.launched).collect()
        };
        for browser in drained {
            browser.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Launch-dependent behaviour is covered by integration environments
    // with a Chromium binary; here we exercise the profile lock registry.

    #[tokio::test]
    async fn profile_lock_is_exclusive_per_path() {
        let pool = BrowserPool::new(PoolConfig::default(), StealthConfig::default());
        let path = PathBuf::from("/tmp/peel-profile-a");

        let lock = pool
            .profile_locks
            .entry(path.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.clone().lock_owned().await;

        // Second acquisition on the same profile must wait.
        let try_second = lock.clone().try_lock_owned();
        assert!(try_second.is_err());

        drop(guard);
        assert!(lock.try_lock_owned().is_ok());
    }

    #[tokio::test]
    async fn different_profiles_do_not_contend() {
        let pool = BrowserPool::new(PoolConfig::default(), StealthConfig::default());
        let lock_a = pool
            .profile_locks
            .entry(PathBuf::from("/tmp/a"))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let lock_b = pool
            .profile_locks
            .entry(PathBuf::from("/tmp/b"))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let _ga = lock_a.lock_owned().await;
        assert!(lock_b.try_lock_owned().is_ok());
    }
}
