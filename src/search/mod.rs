//! Video search capability consumed by the batch orchestrator.
//!
//! [`SearchProvider`] is the only thing the orchestrator sees. Each platform
//! implements [`PlatformSearcher`] for a single attempt; [`PolicySearch`]
//! combines platforms and owns retries, backoff and proxy/user-agent rotation,
//! so a `SearchError` reaching the orchestrator is final.

pub mod pexels;
pub mod policy;
pub mod vimeo;
pub mod youtube;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::formats::{Platform, VideoRecord};
use policy::{Attempt, RequestPolicy, Rotator};

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, max_results: usize)
    -> Result<Vec<VideoRecord>, SearchError>;
}

#[async_trait]
pub trait PlatformSearcher: Send + Sync {
    fn platform(&self) -> Platform;

    async fn search_once(
        &self,
        query: &str,
        max_results: usize,
        attempt: &Attempt,
    ) -> Result<Vec<VideoRecord>, SearchError>;
}

pub struct PolicySearch {
    searchers: Vec<Arc<dyn PlatformSearcher>>,
    rotator: Rotator,
    max_duration_secs: Option<f64>,
}

impl PolicySearch {
    pub fn new(searchers: Vec<Arc<dyn PlatformSearcher>>, policy: RequestPolicy) -> Self {
        Self {
            searchers,
            rotator: Rotator::new(policy),
            max_duration_secs: None,
        }
    }

    pub fn with_max_duration_secs(mut self, max_duration_secs: Option<f64>) -> Self {
        self.max_duration_secs = max_duration_secs;
        self
    }

    async fn search_platform(
        &self,
        searcher: &dyn PlatformSearcher,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<VideoRecord>, SearchError> {
        let policy = self.rotator.policy();
        let attempts = policy.attempts();
        let mut number = 1;
        loop {
            let attempt = self.rotator.next_attempt(number);
            tracing::debug!(
                platform = %searcher.platform(),
                attempt = number,
                proxy = ?attempt.proxy,
                "search attempt"
            );
            match searcher.search_once(query, max_results, &attempt).await {
                Ok(videos) => return Ok(videos),
                Err(err) if number < attempts && err.is_retryable() => {
                    number += 1;
                    let backoff = policy.backoff(number);
                    tracing::warn!(
                        platform = %searcher.platform(),
                        attempt = number - 1,
                        attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        %err,
                        "search attempt failed; retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn keep(&self, video: &VideoRecord) -> bool {
        match (self.max_duration_secs, video.duration) {
            (Some(limit), Some(duration)) => duration <= limit,
            _ => true,
        }
    }
}

#[async_trait]
impl SearchProvider for PolicySearch {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<VideoRecord>, SearchError> {
        if self.searchers.is_empty() {
            return Err(SearchError::Config("no platforms selected".to_owned()));
        }

        let mut videos = Vec::new();
        let mut failures = Vec::new();
        let mut succeeded = 0_usize;
        for searcher in &self.searchers {
            match self.search_platform(searcher.as_ref(), query, max_results).await {
                Ok(found) => {
                    succeeded += 1;
                    let before = found.len();
                    let mut kept = found
                        .into_iter()
                        .filter(|video| self.keep(video))
                        .take(max_results)
                        .collect::<Vec<_>>();
                    tracing::info!(
                        platform = %searcher.platform(),
                        found = before,
                        kept = kept.len(),
                        "platform search complete"
                    );
                    videos.append(&mut kept);
                }
                Err(err) => {
                    tracing::warn!(platform = %searcher.platform(), %err, "platform search failed");
                    failures.push(err);
                }
            }
        }

        if succeeded == 0 {
            return Err(match failures.len() {
                1 => failures.remove(0),
                _ => SearchError::AllPlatformsFailed(failures),
            });
        }
        Ok(videos)
    }
}

/// Collapses line breaks, drops control characters and trims.
pub fn sanitize_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '\r' | '\n' | '\t' => out.push(' '),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out.trim().to_owned()
}

pub fn sanitize_opt(raw: Option<&str>) -> Option<String> {
    raw.map(sanitize_text).filter(|s| !s.is_empty())
}

pub fn build_provider(
    platforms: &[Platform],
    config: &SearchConfig,
    policy: RequestPolicy,
    max_duration_secs: Option<f64>,
) -> anyhow::Result<PolicySearch> {
    policy.validate()?;
    let mut searchers: Vec<Arc<dyn PlatformSearcher>> = Vec::new();
    let mut seen = Vec::new();
    for &platform in platforms {
        if seen.contains(&platform) {
            continue;
        }
        seen.push(platform);
        let searcher: Arc<dyn PlatformSearcher> = match platform {
            Platform::Youtube => Arc::new(youtube::YoutubeSearcher::new(config.youtube.clone())),
            Platform::Vimeo => Arc::new(vimeo::VimeoSearcher::new(config.vimeo.clone())?),
            Platform::Pexels => Arc::new(pexels::PexelsSearcher::new(config.pexels.clone())?),
        };
        searchers.push(searcher);
    }
    if searchers.is_empty() {
        anyhow::bail!("at least one platform is required");
    }

    tracing::info!(
        platforms = ?seen,
        retry_budget = policy.retry_budget,
        proxies = policy.proxies.len(),
        rotation = ?policy.rotation,
        "search provider ready"
    );
    Ok(PolicySearch::new(searchers, policy).with_max_duration_secs(max_duration_secs))
}
