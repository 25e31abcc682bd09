use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, USER_AGENT};
use serde::Deserialize;

use super::policy::Attempt;
use super::{PlatformSearcher, sanitize_opt, sanitize_text};
use crate::error::SearchError;
use crate::formats::{Platform, VideoRecord};

pub const DEFAULT_BASE_URL: &str = "https://api.pexels.com";

#[derive(Debug, Clone)]
pub struct PexelsConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl PexelsConfig {
    pub fn from_env() -> Self {
        let base_url = std::env::var("VIDSCOUT_PEXELS_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_owned());
        let api_key = std::env::var("PEXELS_API_KEY")
            .ok()
            .map(|key| key.trim().to_owned())
            .filter(|key| !key.is_empty());
        Self {
            base_url,
            api_key,
            timeout: Duration::from_secs(30),
        }
    }
}

pub struct PexelsSearcher {
    config: PexelsConfig,
    client: reqwest::Client,
}

impl PexelsSearcher {
    pub fn new(config: PexelsConfig) -> anyhow::Result<Self> {
        let client = build_client(config.timeout, None).context("build pexels http client")?;
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!("{}/videos/search", self.config.base_url.trim_end_matches('/'))
    }
}

pub(crate) fn build_client(
    timeout: Duration,
    proxy: Option<&str>,
) -> reqwest::Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::limited(10));
    if let Some(proxy) = proxy {
        builder = builder.proxy(reqwest::Proxy::all(proxy)?);
    }
    builder.build()
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    videos: Vec<PexelsVideo>,
}

#[derive(Debug, Deserialize)]
struct PexelsVideo {
    url: String,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    user: Option<PexelsUser>,
    #[serde(default)]
    video_files: Vec<PexelsVideoFile>,
}

#[derive(Debug, Deserialize)]
struct PexelsUser {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PexelsVideoFile {
    link: String,
}

#[async_trait]
impl PlatformSearcher for PexelsSearcher {
    fn platform(&self) -> Platform {
        Platform::Pexels
    }

    async fn search_once(
        &self,
        query: &str,
        max_results: usize,
        attempt: &Attempt,
    ) -> Result<Vec<VideoRecord>, SearchError> {
        let Some(api_key) = self.config.api_key.as_deref() else {
            return Err(SearchError::Config("PEXELS_API_KEY is not set".to_owned()));
        };

        let client = match attempt.proxy.as_deref() {
            Some(proxy) => build_client(self.config.timeout, Some(proxy))
                .map_err(|err| SearchError::Config(format!("proxy {proxy}: {err}")))?,
            None => self.client.clone(),
        };

        let endpoint = self.endpoint();
        tracing::info!(endpoint = %endpoint, query, max_results, "pexels search");
        let per_page = max_results.to_string();
        let mut request = client
            .get(&endpoint)
            .header(AUTHORIZATION, api_key)
            .query(&[
                ("query", query),
                ("orientation", "landscape"),
                ("locale", "en-US"),
                ("per_page", per_page.as_str()),
            ]);
        if let Some(user_agent) = attempt.user_agent.as_deref() {
            request = request.header(USER_AGENT, user_agent);
        }

        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(SearchError::RateLimited {
                platform: Platform::Pexels.to_string(),
                message: format!("GET {endpoint} ({status})"),
            });
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(SearchError::Config(format!(
                "pexels rejected the API key ({status})"
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Platform {
                platform: Platform::Pexels.to_string(),
                message: format!("GET {endpoint} ({status}): {}", body.trim()),
            });
        }

        let raw = response.text().await?;
        let parsed: SearchResponse = serde_json::from_str(&raw)
            .map_err(|err| SearchError::Parse(format!("pexels response: {err}")))?;
        Ok(to_records(query, parsed))
    }
}

fn to_records(query: &str, response: SearchResponse) -> Vec<VideoRecord> {
    response
        .videos
        .into_iter()
        .map(|video| {
            let direct = video.video_files.into_iter().next().map(|file| file.link);
            VideoRecord {
                platform: Platform::Pexels,
                query: query.to_owned(),
                title: title_from_page_url(&video.url),
                url: direct.unwrap_or(video.url),
                duration: video.duration,
                uploader: sanitize_opt(video.user.and_then(|u| u.name).as_deref()),
                description: None,
                view_count: None,
                upload_date: None,
            }
        })
        .collect()
}

/// `https://www.pexels.com/video/happy-dog-running-1234567/` -> `happy dog running`.
fn title_from_page_url(page_url: &str) -> String {
    let slug = url::Url::parse(page_url).ok().and_then(|url| {
        url.path_segments()?
            .filter(|segment| !segment.is_empty())
            .next_back()
            .map(ToOwned::to_owned)
    });
    let Some(slug) = slug else {
        return "N/A".to_owned();
    };
    let words = match slug.rsplit_once('-') {
        Some((rest, id)) if id.chars().all(|c| c.is_ascii_digit()) => rest,
        _ if slug.chars().all(|c| c.is_ascii_digit()) => "",
        _ => slug.as_str(),
    };
    let title = sanitize_text(&words.replace('-', " "));
    if title.is_empty() || title == "video" {
        "N/A".to_owned()
    } else {
        title
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_the_first_direct_file_link() {
        let response: SearchResponse = serde_json::from_str(
            r#"{"videos":[
                {"url":"https://www.pexels.com/video/calm-cat-on-a-sofa-1/","duration":12,"user":{"name":"Ann"},
                 "video_files":[{"link":"https://cdn/1.mp4"},{"link":"https://cdn/1b.mp4"}]},
                {"url":"https://www.pexels.com/video/2/","video_files":[]}
            ]}"#,
        )
        .unwrap();
        let records = to_records("calm cat home", response);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].url, "https://cdn/1.mp4");
        assert_eq!(records[0].title, "calm cat on a sofa");
        assert_eq!(records[0].duration, Some(12.0));
        assert_eq!(records[0].uploader.as_deref(), Some("Ann"));
        assert_eq!(records[1].url, "https://www.pexels.com/video/2/");
        assert_eq!(records[1].title, "N/A");
    }

    #[test]
    fn title_comes_from_the_page_slug() {
        assert_eq!(
            title_from_page_url("https://www.pexels.com/video/happy-dog-running-1234567/"),
            "happy dog running"
        );
        assert_eq!(
            title_from_page_url("https://www.pexels.com/video/sunset-over-the-sea/"),
            "sunset over the sea"
        );
        assert_eq!(title_from_page_url("not a url"), "N/A");
    }

    #[tokio::test]
    async fn missing_api_key_is_a_config_error() {
        let searcher = PexelsSearcher::new(PexelsConfig {
            base_url: "http://127.0.0.1:9".to_owned(),
            api_key: None,
            timeout: Duration::from_secs(1),
        })
        .unwrap();
        let err = searcher
            .search_once("q", 1, &Attempt::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::Config(_)));
    }
}
