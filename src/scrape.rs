use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use chrono::Utc;

use crate::batch::{BatchConfig, BatchRunner, DelayPolicy};
use crate::cli::{ScrapeArgs, ScrapeOptions};
use crate::config::SearchConfig;
use crate::formats::{Query, RunSummary};
use crate::result_store::ResultStore;
use crate::search::build_provider;
use crate::search::policy::RequestPolicy;

pub async fn run(args: ScrapeArgs) -> anyhow::Result<RunSummary> {
    let queries = load_queries(&args.queries)?;
    run_queries(&queries, &args.out, &args.options).await
}

pub fn load_queries(path: &Path) -> anyhow::Result<Vec<Query>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("read queries: {}", path.display()))?;
    let queries: Vec<Query> = serde_json::from_str(&json)
        .with_context(|| format!("parse queries: {}", path.display()))?;
    tracing::info!(path = %path.display(), queries = queries.len(), "loaded queries");
    Ok(queries)
}

/// Builds the request policy from `--policy`, then applies `--retries` and
/// `--backoff-ms`.
pub fn load_policy(options: &ScrapeOptions) -> anyhow::Result<RequestPolicy> {
    let mut policy = match options.policy.as_deref() {
        Some(path) => RequestPolicy::load(path)?,
        None => RequestPolicy::default(),
    };
    if let Some(retries) = options.retries {
        policy.retry_budget = retries;
    }
    if let Some(backoff_ms) = options.backoff_ms {
        policy.backoff_ms = backoff_ms;
    }
    Ok(policy)
}

pub async fn run_queries(
    queries: &[Query],
    out: &Path,
    options: &ScrapeOptions,
) -> anyhow::Result<RunSummary> {
    let policy = load_policy(options).context("load request policy")?;
    let provider = build_provider(
        &options.platforms,
        &SearchConfig::from_env(),
        policy,
        options.max_duration_secs,
    )
    .context("build search provider")?;

    let store = ResultStore::new(out);
    let runner = BatchRunner::new(
        Arc::new(provider),
        store.clone(),
        BatchConfig {
            start_from: options.start_from,
            batch_size: options.batch_size,
            max_results: options.max_results,
            delay: DelayPolicy::from_millis(options.delay_ms, options.jitter_ms),
        },
    );

    let started_at = Utc::now();
    let outcome = runner.run(queries).await;
    let finished_at = Utc::now();

    if let Err(err) = store.save_videos_csv(&outcome.results) {
        tracing::error!(%err, "failed to export videos csv");
    }

    let elapsed_secs = outcome.elapsed.as_secs_f64();
    let summary = RunSummary {
        started_at,
        finished_at,
        start_from: options.start_from,
        total_queries: queries.len(),
        results: outcome.results.len(),
        elapsed_secs,
        avg_videos_per_query: outcome.stats.avg_videos_per_query(),
        avg_secs_per_query: elapsed_secs / outcome.results.len().max(1) as f64,
        stats: outcome.stats,
    };
    match store.save_summary(&summary) {
        Ok(path) => tracing::info!(path = %path.display(), "run summary written"),
        Err(err) => tracing::error!(%err, "failed to write run summary"),
    }

    for (platform, count) in &summary.stats.platform_videos {
        tracing::info!(%platform, videos = count, "platform total");
    }
    tracing::info!(
        processed = summary.stats.queries_processed,
        videos = summary.stats.total_videos_found,
        errors = summary.stats.errors,
        avg_videos_per_query = format_args!("{:.2}", summary.avg_videos_per_query),
        "scrape complete"
    );
    Ok(summary)
}
