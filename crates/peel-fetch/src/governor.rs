//! Per-host token-bucket governor.
//!
//! One bucket per host: `{tokens, last_refill}`. Acquisition waits until a
//! token is available, observing the request's cancellation signal while it
//! waits. Rate and bucket size come from the default tier with per-host
//! overrides.

use dashmap::DashMap;
use peel_types::{CancellationSignal, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::trace;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernorConfig {
    /// Tokens refilled per second.
    pub rate_per_sec: f64,
    /// Bucket capacity; also the cold-start balance.
    pub burst: f64,
    /// host -> (rate_per_sec, burst)
    #[serde(default)]
    pub overrides: HashMap<String, (f64, f64)>,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            rate_per_sec: 4.0,
            burst: 2.0,
            overrides: HashMap::new(),
        }
    }
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
    rate: f64,
    burst: f64,
}

impl Bucket {
    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.burst);
        self.last_refill = now;
    }

    /// Take a token, or report how long until one exists.
    fn try_take(&mut self) -> std::result::Result<(), Duration> {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            let deficit = 1.0 - self.tokens;
            Err(Duration::from_secs_f64(deficit / self.rate))
        }
    }
}

/// Process-wide per-host rate limiter.
pub struct HostGovernor {
    config: GovernorConfig,
    buckets: DashMap<String, Mutex<Bucket>>,
}

impl HostGovernor {
    pub fn new(config: GovernorConfig) -> Self {
        Self {
            config,
            buckets: DashMap::new(),
        }
    }

    fn tier_for(&self, host: &str) -> (f64, f64) {
        self.config
            .overrides
            .get(host)
            .copied()
            .unwrap_or((self.config.rate_per_sec, self.config.burst))
    }

    /// Block until a token for `host` is available or the request is
    /// cancelled.
    pub async fn acquire(&self, host: &str, cancel: &CancellationSignal) -> Result<()> {
        loop {
            cancel.check()?;

            let wait = {
                let entry = self.buckets.entry(host.to_string()).or_insert_with(|| {
                    let (rate, burst) = self.tier_for(host);
                    Mutex::new(Bucket {
                        tokens: burst,
                        last_refill: Instant::now(),
                        rate,
                        burst,
                    })
                });
                let mut bucket = entry.lock().await;
                match bucket.try_take() {
                    Ok(()) => return Ok(()),
                    Err(wait) => wait,
                }
            };

            trace!(host, wait_ms = wait.as_millis() as u64, "governor waiting");
            // Sleep in short slices so cancellation stays responsive.
            tokio::time::sleep(wait.min(Duration::from_millis(50))).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn tokens_meter_the_rate() {
        let config = GovernorConfig {
            rate_per_sec: 5.0,
            burst: 1.0,
            overrides: HashMap::new(),
        };
        let governor = Arc::new(HostGovernor::new(config));
        let cancel = CancellationSignal::unbounded();

        let start = Instant::now();
        let mut tasks = Vec::new();
        for _ in 0..20 {
            let governor = governor.clone();
            let cancel = cancel.clone();
            tasks.push(tokio::spawn(async move {
                governor.acquire("example.com", &cancel).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        // 1 immediate token + 19 refilled at 5/s.
        assert!(start.elapsed() >= Duration::from_millis(3700), "elapsed {:?}", start.elapsed());
    }

    #[tokio::test]
    async fn other_hosts_are_not_throttled() {
        let config = GovernorConfig {
            rate_per_sec: 1.0,
            burst: 1.0,
            overrides: HashMap::new(),
        };
        let governor = HostGovernor::new(config);
        let cancel = CancellationSignal::unbounded();

        governor.acquire("slow.example", &cancel).await.unwrap();

        let start = Instant::now();
        governor.acquire("fast.example", &cancel).await.unwrap();
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn per_host_override_applies() {
        let mut overrides = HashMap::new();
        overrides.insert("bursty.example".to_string(), (100.0, 10.0));
        let config = GovernorConfig {
            rate_per_sec: 1.0,
            burst: 1.0,
            overrides,
        };
        let governor = HostGovernor::new(config);
        let cancel = CancellationSignal::unbounded();

        let start = Instant::now();
        for _ in 0..10 {
            governor.acquire("bursty.example", &cancel).await.unwrap();
        }
        assert!(start.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test]
    async fn cancellation_interrupts_waiting() {
        let config = GovernorConfig {
            rate_per_sec: 0.1,
            burst: 1.0,
            overrides: HashMap::new(),
        };
        let governor = Arc::new(HostGovernor::new(config));
        let cancel = CancellationSignal::unbounded();

        governor.acquire("example.com", &cancel).await.unwrap();

        let waiting = {
            let governor = governor.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { governor.acquire("example.com", &cancel).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();
        let result = waiting.await.unwrap();
        assert!(matches!(result, Err(peel_types::PeelError::Aborted)));
    }
}
