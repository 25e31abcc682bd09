use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng as _;

use crate::formats::{Query, RunStats, ScrapeResult};
use crate::result_store::{FINAL_RESULTS_FILE, ResultStore, checkpoint_file_name};
use crate::search::SearchProvider;

/// Pause taken before each dispatch: `delay` plus a uniform draw from
/// `0..=jitter`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DelayPolicy {
    pub delay: Duration,
    pub jitter: Duration,
}

impl DelayPolicy {
    pub fn from_millis(delay_ms: u64, jitter_ms: u64) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            jitter: Duration::from_millis(jitter_ms),
        }
    }

    pub fn next_pause(&self) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return self.delay;
        }
        self.delay + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }
}

#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Index into the query list where processing starts.
    pub start_from: usize,
    /// Checkpoint interval, counted by 1-based position in the full list.
    pub batch_size: NonZeroUsize,
    pub max_results: usize,
    pub delay: DelayPolicy,
}

#[derive(Debug)]
pub struct BatchOutcome {
    pub results: Vec<ScrapeResult>,
    pub stats: RunStats,
    pub elapsed: Duration,
}

/// Drives queries through a [`SearchProvider`] one at a time, in list order.
///
/// Every query produces exactly one [`ScrapeResult`]; a failed or panicking
/// search is recorded as a failure entry and the run moves on. Failed writes
/// are logged and the accumulator is kept for the next checkpoint.
pub struct BatchRunner {
    search: Arc<dyn SearchProvider>,
    store: ResultStore,
    config: BatchConfig,
}

impl BatchRunner {
    pub fn new(search: Arc<dyn SearchProvider>, store: ResultStore, config: BatchConfig) -> Self {
        Self {
            search,
            store,
            config,
        }
    }

    pub async fn run(&self, queries: &[Query]) -> BatchOutcome {
        let total = queries.len();
        let start_from = self.config.start_from;
        let mut results = Vec::with_capacity(total.saturating_sub(start_from));
        let mut stats = RunStats::default();
        let started_at = Instant::now();

        if start_from >= total {
            tracing::warn!(
                start_from,
                total,
                "start offset is past the end of the query list; nothing to do"
            );
        } else {
            tracing::info!(
                start_from,
                total,
                batch_size = self.config.batch_size.get(),
                max_results = self.config.max_results,
                "scrape: start"
            );
        }

        for (idx, query) in queries.iter().enumerate().skip(start_from) {
            if idx > start_from {
                let pause = self.config.delay.next_pause();
                if !pause.is_zero() {
                    tracing::debug!(
                        pause_ms = pause.as_millis() as u64,
                        "waiting before next query"
                    );
                    tokio::time::sleep(pause).await;
                }
            }

            let position = idx + 1;
            let pct = position as f64 * 100.0 / total as f64;
            tracing::info!(
                query_id = query.id,
                emotion = %query.emotion,
                subject = %query.subject,
                setting = %query.setting,
                "[{position}/{total}] ({pct:.1}%) {}",
                query.query
            );

            let result = self.dispatch(query, &mut stats).await;
            results.push(result);

            if position % self.config.batch_size.get() == 0 {
                self.checkpoint(&results, &stats, position, total, started_at);
            }
        }

        match self.store.save_results(&results, FINAL_RESULTS_FILE) {
            Ok(path) => tracing::info!(
                path = %path.display(),
                results = results.len(),
                "scrape: final results saved"
            ),
            Err(err) => tracing::error!(%err, "scrape: failed to save final results"),
        }

        let elapsed = started_at.elapsed();
        tracing::info!(
            processed = stats.queries_processed,
            videos = stats.total_videos_found,
            errors = stats.errors,
            elapsed_secs = elapsed.as_secs_f64(),
            "scrape: done"
        );
        BatchOutcome {
            results,
            stats,
            elapsed,
        }
    }

    async fn dispatch(&self, query: &Query, stats: &mut RunStats) -> ScrapeResult {
        let search = Arc::clone(&self.search);
        let text = query.query.clone();
        let max_results = self.config.max_results;
        let joined = tokio::spawn(async move { search.search(&text, max_results).await }).await;

        match joined {
            Ok(Ok(videos)) => {
                tracing::info!(query_id = query.id, found = videos.len(), "query done");
                stats.record_success(&videos);
                ScrapeResult::success(query, videos)
            }
            Ok(Err(err)) => {
                tracing::error!(query_id = query.id, query = %query.query, %err, "query failed");
                stats.record_failure();
                ScrapeResult::failure(query, err.to_string())
            }
            Err(err) => {
                tracing::error!(query_id = query.id, query = %query.query, %err, "search task aborted");
                stats.record_failure();
                ScrapeResult::failure(query, format!("search task aborted: {err}"))
            }
        }
    }

    fn checkpoint(
        &self,
        results: &[ScrapeResult],
        stats: &RunStats,
        position: usize,
        total: usize,
        started_at: Instant,
    ) {
        let name = checkpoint_file_name(position);
        if let Err(err) = self.store.save_results(results, &name) {
            tracing::error!(%err, position, "checkpoint failed; continuing");
        }

        let processed = (position - self.config.start_from).max(1);
        let elapsed = started_at.elapsed().as_secs_f64();
        let avg_secs = elapsed / processed as f64;
        let remaining = total - position;
        tracing::info!(
            position,
            total,
            videos = stats.total_videos_found,
            errors = stats.errors,
            elapsed_secs = format_args!("{elapsed:.1}"),
            avg_secs_per_query = format_args!("{avg_secs:.2}"),
            eta_secs = format_args!("{:.0}", avg_secs * remaining as f64),
            "checkpoint"
        );
    }
}
