//! User-agent rotation and the browser-like header set for the simple rung.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationStrategy {
    #[default]
    Random,
    Sequential,
    /// Same agent for the whole process lifetime.
    Sticky,
}

/// Rotating pool of realistic desktop user agents.
#[derive(Debug)]
pub struct UserAgentRotator {
    agents: Vec<String>,
    strategy: RotationStrategy,
    cursor: AtomicUsize,
}

impl UserAgentRotator {
    pub fn new(strategy: RotationStrategy) -> Self {
        Self::with_agents(default_user_agents(), strategy)
    }

    pub fn with_agents(agents: Vec<String>, strategy: RotationStrategy) -> Self {
        let agents = if agents.is_empty() {
            default_user_agents()
        } else {
            agents
        };
        Self {
            agents,
            strategy,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn next(&self) -> &str {
        let idx = match self.strategy {
            RotationStrategy::Random => rand::thread_rng().gen_range(0..self.agents.len()),
            RotationStrategy::Sequential => {
                self.cursor.fetch_add(1, Ordering::Relaxed) % self.agents.len()
            }
            RotationStrategy::Sticky => 0,
        };
        &self.agents[idx]
    }
}

impl Default for UserAgentRotator {
    fn default() -> Self {
        Self::new(RotationStrategy::Random)
    }
}

pub fn default_user_agents() -> Vec<String> {
    [
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36",
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:127.0) Gecko/20100101 Firefox/127.0",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.5 Safari/605.1.15",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Header set a real browser sends alongside the given user agent. Applied
/// on the simple rung so plain HTTP fetches do not look like a bare client.
pub fn realistic_headers(user_agent: &str) -> Vec<(&'static str, String)> {
    let chrome = user_agent.contains("Chrome");
    let mut headers = vec![
        (
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8"
                .to_string(),
        ),
        ("Accept-Language", "en-US,en;q=0.9".to_string()),
        ("Upgrade-Insecure-Requests", "1".to_string()),
        ("Sec-Fetch-Dest", "document".to_string()),
        ("Sec-Fetch-Mode", "navigate".to_string()),
        ("Sec-Fetch-Site", "none".to_string()),
        ("Sec-Fetch-User", "?1".to_string()),
    ];
    if chrome {
        headers.push((
            "sec-ch-ua",
            "\"Not/A)Brand\";v=\"8\", \"Chromium\";v=\"126\", \"Google Chrome\";v=\"126\""
                .to_string(),
        ));
        headers.push(("sec-ch-ua-mobile", "?0".to_string()));
        headers.push(("sec-ch-ua-platform", "\"Windows\"".to_string()));
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn sequential_rotation_cycles() {
        let rotator = UserAgentRotator::with_agents(
            vec!["a".into(), "b".into(), "c".into()],
            RotationStrategy::Sequential,
        );
        assert_eq!(rotator.next(), "a");
        assert_eq!(rotator.next(), "b");
        assert_eq!(rotator.next(), "c");
        assert_eq!(rotator.next(), "a");
    }

    #[test]
    fn sticky_never_moves() {
        let rotator = UserAgentRotator::with_agents(
            vec!["a".into(), "b".into()],
            RotationStrategy::Sticky,
        );
        for _ in 0..5 {
            assert_eq!(rotator.next(), "a");
        }
    }

    #[test]
    fn random_stays_in_pool() {
        let rotator = UserAgentRotator::default();
        let pool: HashSet<String> = default_user_agents().into_iter().collect();
        for _ in 0..20 {
            assert!(pool.contains(rotator.next()));
        }
    }

    #[test]
    fn chrome_headers_include_client_hints() {
        let agents = default_user_agents();
        let chrome_headers = realistic_headers(&agents[0]);
        assert!(chrome_headers.iter().any(|(k, _)| *k == "sec-ch-ua"));

        let firefox_headers = realistic_headers(&agents[3]);
        assert!(!firefox_headers.iter().any(|(k, _)| *k == "sec-ch-ua"));
        assert!(firefox_headers
            .iter()
            .any(|(k, v)| *k == "Accept-Language" && v.starts_with("en-US")));
    }
}
