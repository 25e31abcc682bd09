use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Context as _;
use rand::Rng as _;
use serde::{Deserialize, Serialize};

const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rotation {
    #[default]
    RoundRobin,
    Random,
}

/// Anti-detection knobs handed to the search layer. Loaded from YAML:
///
/// ```yaml
/// rotation: random
/// retry_budget: 3
/// backoff_ms: 2000
/// proxies: ["http://10.0.0.1:8080"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestPolicy {
    pub rotation: Rotation,
    /// Extra attempts after the first one.
    pub retry_budget: u32,
    pub backoff_ms: u64,
    pub proxies: Vec<String>,
    pub user_agents: Vec<String>,
}

impl Default for RequestPolicy {
    fn default() -> Self {
        Self {
            rotation: Rotation::RoundRobin,
            retry_budget: 2,
            backoff_ms: 2000,
            proxies: Vec::new(),
            user_agents: DEFAULT_USER_AGENTS.iter().map(|s| (*s).to_owned()).collect(),
        }
    }
}

impl RequestPolicy {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("read policy: {}", path.display()))?;
        let policy: Self = serde_yaml::from_str(&yaml)
            .with_context(|| format!("parse policy: {}", path.display()))?;
        policy
            .validate()
            .with_context(|| format!("check policy: {}", path.display()))?;
        Ok(policy)
    }

    /// Every proxy in the pool must parse as a proxy URL.
    pub fn validate(&self) -> anyhow::Result<()> {
        for proxy in &self.proxies {
            reqwest::Proxy::all(proxy.as_str())
                .with_context(|| format!("invalid proxy: {proxy}"))?;
        }
        Ok(())
    }

    pub fn attempts(&self) -> u32 {
        self.retry_budget.saturating_add(1)
    }

    /// Delay before attempt `attempt` (1-based); zero for the first.
    pub fn backoff(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let factor = 1_u64 << (attempt - 2).min(16);
        Duration::from_millis(self.backoff_ms.saturating_mul(factor))
    }
}

/// Per-attempt request identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attempt {
    pub number: u32,
    pub proxy: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug)]
pub struct Rotator {
    policy: RequestPolicy,
    proxy_cursor: AtomicUsize,
    agent_cursor: AtomicUsize,
}

impl Rotator {
    pub fn new(policy: RequestPolicy) -> Self {
        Self {
            policy,
            proxy_cursor: AtomicUsize::new(0),
            agent_cursor: AtomicUsize::new(0),
        }
    }

    pub fn policy(&self) -> &RequestPolicy {
        &self.policy
    }

    pub fn next_attempt(&self, number: u32) -> Attempt {
        Attempt {
            number,
            proxy: self.pick(&self.policy.proxies, &self.proxy_cursor),
            user_agent: self.pick(&self.policy.user_agents, &self.agent_cursor),
        }
    }

    fn pick(&self, pool: &[String], cursor: &AtomicUsize) -> Option<String> {
        if pool.is_empty() {
            return None;
        }
        let idx = match self.policy.rotation {
            Rotation::RoundRobin => cursor.fetch_add(1, Ordering::Relaxed) % pool.len(),
            Rotation::Random => rand::thread_rng().gen_range(0..pool.len()),
        };
        pool.get(idx).cloned()
    }
}
