use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::policy::Attempt;
use super::{PlatformSearcher, sanitize_opt, sanitize_text};
use crate::error::SearchError;
use crate::formats::{Platform, VideoRecord};

#[derive(Debug, Clone)]
pub struct YoutubeConfig {
    pub bin: String,
    /// Leading arguments, e.g. `-m yt_dlp` when `bin` is a Python interpreter.
    pub bin_args: Vec<String>,
    pub cookies_from_browser: Option<String>,
    pub timeout: Duration,
}

impl YoutubeConfig {
    pub fn from_env() -> Self {
        let bin = std::env::var("VIDSCOUT_YTDLP_BIN").unwrap_or_else(|_| "yt-dlp".to_owned());
        let bin_args = std::env::var("VIDSCOUT_YTDLP_ARGS")
            .map(|raw| raw.split_whitespace().map(ToOwned::to_owned).collect())
            .unwrap_or_default();
        let cookies_from_browser = std::env::var("VIDSCOUT_YTDLP_COOKIES_FROM_BROWSER")
            .ok()
            .filter(|v| !v.trim().is_empty());
        Self {
            bin,
            bin_args,
            cookies_from_browser,
            timeout: Duration::from_secs(120),
        }
    }
}

/// Runs `yt-dlp --dump-json "ytsearchN:<query>"` and reads one JSON object
/// per line.
#[derive(Debug, Clone)]
pub struct YoutubeSearcher {
    config: YoutubeConfig,
}

impl YoutubeSearcher {
    pub fn new(config: YoutubeConfig) -> Self {
        Self { config }
    }

    fn command(
        &self,
        query: &str,
        max_results: usize,
        attempt: &Attempt,
    ) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.config.bin);
        cmd.args(&self.config.bin_args);
        cmd.args(["--dump-json", "--skip-download", "--no-warnings", "--ignore-errors"]);
        if let Some(browser) = self.config.cookies_from_browser.as_deref() {
            cmd.args(["--cookies-from-browser", browser]);
        }
        if let Some(proxy) = attempt.proxy.as_deref() {
            cmd.args(["--proxy", proxy]);
        }
        if let Some(user_agent) = attempt.user_agent.as_deref() {
            cmd.args(["--user-agent", user_agent]);
        }
        cmd.arg(format!("ytsearch{max_results}:{query}"));
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl PlatformSearcher for YoutubeSearcher {
    fn platform(&self) -> Platform {
        Platform::Youtube
    }

    async fn search_once(
        &self,
        query: &str,
        max_results: usize,
        attempt: &Attempt,
    ) -> Result<Vec<VideoRecord>, SearchError> {
        tracing::info!(bin = %self.config.bin, query, max_results, "youtube search");
        let child = self.command(query, max_results, attempt).spawn().map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                SearchError::Config(format!("yt-dlp executable not found: {}", self.config.bin))
            } else {
                SearchError::Platform {
                    platform: Platform::Youtube.to_string(),
                    message: format!("spawn {}: {err}", self.config.bin),
                }
            }
        })?;

        let output = tokio::time::timeout(self.config.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                SearchError::Network(format!(
                    "yt-dlp timed out after {}s",
                    self.config.timeout.as_secs()
                ))
            })?
            .map_err(|err| SearchError::Platform {
                platform: Platform::Youtube.to_string(),
                message: format!("wait yt-dlp: {err}"),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let videos = parse_entries(query, &stdout)?;
        if !output.status.success() && videos.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(&stderr, output.status));
        }

        tracing::debug!(found = videos.len(), "youtube entries parsed");
        Ok(videos)
    }
}

#[derive(Debug, Deserialize)]
struct YtDlpEntry {
    id: Option<String>,
    title: Option<String>,
    duration: Option<f64>,
    view_count: Option<u64>,
    description: Option<String>,
    uploader: Option<String>,
    channel: Option<String>,
    upload_date: Option<String>,
    webpage_url: Option<String>,
}

fn parse_entries(query: &str, stdout: &str) -> Result<Vec<VideoRecord>, SearchError> {
    let mut videos = Vec::new();
    for line in stdout.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let entry: YtDlpEntry = serde_json::from_str(line)
            .map_err(|err| SearchError::Parse(format!("yt-dlp json line: {err}")))?;

        let url = match (entry.id.as_deref(), entry.webpage_url) {
            (Some(id), _) => format!("https://www.youtube.com/watch?v={id}"),
            (None, Some(url)) => url,
            (None, None) => continue,
        };
        videos.push(VideoRecord {
            platform: Platform::Youtube,
            query: query.to_owned(),
            url,
            title: entry
                .title
                .as_deref()
                .map(sanitize_text)
                .unwrap_or_else(|| "N/A".to_owned()),
            duration: entry.duration,
            uploader: sanitize_opt(entry.uploader.or(entry.channel).as_deref()),
            description: sanitize_opt(entry.description.as_deref()),
            view_count: entry.view_count,
            upload_date: entry.upload_date,
        });
    }
    Ok(videos)
}

fn classify_failure(stderr: &str, status: std::process::ExitStatus) -> SearchError {
    let tail = stderr
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or_default()
        .trim()
        .to_owned();
    if stderr.contains("HTTP Error 429") || stderr.contains("Too Many Requests") {
        return SearchError::RateLimited {
            platform: Platform::Youtube.to_string(),
            message: tail,
        };
    }
    SearchError::Platform {
        platform: Platform::Youtube.to_string(),
        message: format!("yt-dlp failed ({status}): {tail}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_json_lines_and_builds_watch_urls() {
        let stdout = concat!(
            r#"{"id":"abc","title":"Happy\ndog","duration":42.0,"view_count":10,"uploader":"Ann","upload_date":"20240101"}"#,
            "\n\n",
            r#"{"id":null,"webpage_url":"https://www.youtube.com/shorts/xyz","title":null,"channel":"Chan"}"#,
            "\n",
            r#"{"title":"no url"}"#,
            "\n",
        );
        let videos = parse_entries("happy dog park", stdout).unwrap();
        assert_eq!(videos.len(), 2);
        assert_eq!(videos[0].url, "https://www.youtube.com/watch?v=abc");
        assert_eq!(videos[0].title, "Happy dog");
        assert_eq!(videos[0].duration, Some(42.0));
        assert_eq!(videos[0].query, "happy dog park");
        assert_eq!(videos[1].url, "https://www.youtube.com/shorts/xyz");
        assert_eq!(videos[1].title, "N/A");
        assert_eq!(videos[1].uploader.as_deref(), Some("Chan"));
    }

    #[test]
    fn garbage_output_is_a_parse_error() {
        assert!(matches!(
            parse_entries("q", "not json\n"),
            Err(SearchError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn missing_executable_is_a_config_error() {
        let searcher = YoutubeSearcher::new(YoutubeConfig {
            bin: "/nonexistent/yt-dlp-for-tests".to_owned(),
            bin_args: Vec::new(),
            cookies_from_browser: None,
            timeout: Duration::from_secs(5),
        });
        let err = searcher
            .search_once("q", 1, &Attempt::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::Config(_)));
        assert!(!err.is_retryable());
    }

    fn script_searcher(script: &std::path::Path) -> YoutubeSearcher {
        YoutubeSearcher::new(YoutubeConfig {
            bin: "sh".to_owned(),
            bin_args: vec![script.to_string_lossy().to_string()],
            cookies_from_browser: None,
            timeout: Duration::from_secs(10),
        })
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runs_the_configured_executable_with_search_prefix() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let script = temp.path().join("fake-yt-dlp");
        std::fs::write(
            &script,
            "#!/bin/sh\n\
             for last; do :; done\n\
             printf '{\"id\":\"v1\",\"title\":\"%s\"}\\n' \"$last\"\n",
        )?;

        let searcher = script_searcher(&script);
        let attempt = Attempt {
            number: 1,
            proxy: Some("http://proxy:8080".to_owned()),
            user_agent: Some("ua".to_owned()),
        };
        let videos = searcher.search_once("sad cat beach", 3, &attempt).await?;
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].title, "ytsearch3:sad cat beach");
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn rate_limit_in_stderr_is_classified() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let script = temp.path().join("fake-yt-dlp");
        std::fs::write(
            &script,
            "echo 'ERROR: HTTP Error 429: Too Many Requests' >&2\nexit 1\n",
        )?;

        let searcher = script_searcher(&script);
        let err = searcher
            .search_once("q", 1, &Attempt::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::RateLimited { .. }));
        Ok(())
    }
}
