use std::num::NonZeroUsize;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::formats::Platform;
use crate::queries::QueryStyle;

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Directory for the per-run debug and error log files.
    #[arg(long, global = true, default_value = "logs")]
    pub log_dir: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate `queries.json` from a term table.
    Generate(GenerateArgs),
    /// Search every query in `queries.json` and write result artifacts.
    Scrape(ScrapeArgs),
    /// Generate then scrape in one go.
    Build(BuildArgs),
}

#[derive(Debug, Args)]
pub struct GenerateArgs {
    /// CSV with `Emotion`, `Subject` and `Setting` columns.
    #[arg(long)]
    pub terms: PathBuf,

    /// Output directory (receives `queries.json`).
    #[arg(long)]
    pub out: PathBuf,

    /// How each emotion/subject/setting triple is phrased.
    #[arg(long, value_enum, default_value_t = QueryStyle::Simple)]
    pub style: QueryStyle,
}

/// Knobs shared by `scrape` and `build`.
#[derive(Debug, Clone, Args)]
pub struct ScrapeOptions {
    /// Platforms to search, in order.
    #[arg(long, value_enum, num_args = 1.., default_values_t = [Platform::Youtube])]
    pub platforms: Vec<Platform>,

    /// Index of the first query to process.
    #[arg(long, default_value_t = 0)]
    pub start_from: usize,

    /// Write a checkpoint every N queries.
    #[arg(long, default_value = "100")]
    pub batch_size: NonZeroUsize,

    /// Videos requested per platform per query.
    #[arg(long, default_value_t = 5)]
    pub max_results: usize,

    /// Fixed pause before each query after the first.
    #[arg(long, default_value_t = 3000)]
    pub delay_ms: u64,

    /// Random extra pause added to `--delay-ms`.
    #[arg(long, default_value_t = 2000)]
    pub jitter_ms: u64,

    /// YAML request policy (rotation, retry budget, proxies, user agents).
    #[arg(long)]
    pub policy: Option<PathBuf>,

    /// Override the policy's retry budget.
    #[arg(long)]
    pub retries: Option<u32>,

    /// Override the policy's base backoff.
    #[arg(long)]
    pub backoff_ms: Option<u64>,

    /// Drop videos longer than this.
    #[arg(long)]
    pub max_duration_secs: Option<f64>,
}

#[derive(Debug, Args)]
pub struct ScrapeArgs {
    /// `queries.json` written by `generate`.
    #[arg(long)]
    pub queries: PathBuf,

    /// Output directory for checkpoints, final results and exports.
    #[arg(long)]
    pub out: PathBuf,

    #[command(flatten)]
    pub options: ScrapeOptions,
}

#[derive(Debug, Args)]
pub struct BuildArgs {
    /// CSV with `Emotion`, `Subject` and `Setting` columns.
    #[arg(long)]
    pub terms: PathBuf,

    /// Output directory for every artifact of the run.
    #[arg(long)]
    pub out: PathBuf,

    #[arg(long, value_enum, default_value_t = QueryStyle::Simple)]
    pub style: QueryStyle,

    #[command(flatten)]
    pub options: ScrapeOptions,
}
