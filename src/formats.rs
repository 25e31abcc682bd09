use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Youtube,
    Vimeo,
    Pexels,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Youtube => "youtube",
            Self::Vimeo => "vimeo",
            Self::Pexels => "pexels",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One search query produced by the generator. `id` is the position in
/// generation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub id: usize,
    pub query: String,
    pub emotion: String,
    pub subject: String,
    pub setting: String,
    /// Never read back; resume works on `--start-from` only.
    #[serde(default)]
    pub scraped: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub platform: Platform,
    pub query: String,
    pub url: String,
    pub title: String,
    /// Seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploader: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeSuccess {
    pub query: String,
    pub query_id: usize,
    pub emotion: String,
    pub subject: String,
    pub setting: String,
    pub timestamp: DateTime<Utc>,
    pub total_videos: usize,
    pub videos: Vec<VideoRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeFailure {
    pub query: String,
    pub query_id: usize,
    pub emotion: String,
    pub subject: String,
    pub setting: String,
    pub timestamp: DateTime<Utc>,
    pub error: String,
}

/// Outcome of one processed query, as written to the batch artifacts.
///
/// Serialized without a tag: a success entry carries `total_videos` and
/// `videos`, a failure entry carries `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScrapeResult {
    Success(ScrapeSuccess),
    Failure(ScrapeFailure),
}

impl ScrapeResult {
    pub fn success(query: &Query, videos: Vec<VideoRecord>) -> Self {
        Self::Success(ScrapeSuccess {
            query: query.query.clone(),
            query_id: query.id,
            emotion: query.emotion.clone(),
            subject: query.subject.clone(),
            setting: query.setting.clone(),
            timestamp: Utc::now(),
            total_videos: videos.len(),
            videos,
        })
    }

    pub fn failure(query: &Query, error: String) -> Self {
        Self::Failure(ScrapeFailure {
            query: query.query.clone(),
            query_id: query.id,
            emotion: query.emotion.clone(),
            subject: query.subject.clone(),
            setting: query.setting.clone(),
            timestamp: Utc::now(),
            error,
        })
    }

    pub fn query_id(&self) -> usize {
        match self {
            Self::Success(success) => success.query_id,
            Self::Failure(failure) => failure.query_id,
        }
    }

    pub fn total_videos(&self) -> usize {
        match self {
            Self::Success(success) => success.total_videos,
            Self::Failure(_) => 0,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    pub fn videos(&self) -> &[VideoRecord] {
        match self {
            Self::Success(success) => &success.videos,
            Self::Failure(_) => &[],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub queries_processed: u64,
    pub total_videos_found: u64,
    pub platform_videos: BTreeMap<Platform, u64>,
    pub errors: u64,
}

impl RunStats {
    pub fn record_success(&mut self, videos: &[VideoRecord]) {
        self.queries_processed += 1;
        self.total_videos_found += videos.len() as u64;
        for video in videos {
            *self.platform_videos.entry(video.platform).or_default() += 1;
        }
    }

    pub fn record_failure(&mut self) {
        self.queries_processed += 1;
        self.errors += 1;
    }

    pub fn platform_count(&self, platform: Platform) -> u64 {
        self.platform_videos.get(&platform).copied().unwrap_or(0)
    }

    pub fn avg_videos_per_query(&self) -> f64 {
        self.total_videos_found as f64 / self.queries_processed.max(1) as f64
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub start_from: usize,
    pub total_queries: usize,
    pub results: usize,
    pub elapsed_secs: f64,
    pub avg_videos_per_query: f64,
    pub avg_secs_per_query: f64,
    pub stats: RunStats,
}
