use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, USER_AGENT};
use scraper::{Html, Selector};
use url::Url;

use super::pexels::build_client;
use super::policy::Attempt;
use super::{PlatformSearcher, sanitize_text};
use crate::error::SearchError;
use crate::formats::{Platform, VideoRecord};

pub const DEFAULT_BASE_URL: &str = "https://html.duckduckgo.com/html/";
const FALLBACK_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone)]
pub struct VimeoConfig {
    /// DuckDuckGo HTML endpoint.
    pub base_url: String,
    pub timeout: Duration,
}

impl VimeoConfig {
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("VIDSCOUT_DDG_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_owned());
        Self {
            base_url,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Finds Vimeo pages through a `site:vimeo.com` web search.
pub struct VimeoSearcher {
    config: VimeoConfig,
    client: reqwest::Client,
}

impl VimeoSearcher {
    pub fn new(config: VimeoConfig) -> anyhow::Result<Self> {
        let client = build_client(config.timeout, None).context("build vimeo http client")?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl PlatformSearcher for VimeoSearcher {
    fn platform(&self) -> Platform {
        Platform::Vimeo
    }

    async fn search_once(
        &self,
        query: &str,
        max_results: usize,
        attempt: &Attempt,
    ) -> Result<Vec<VideoRecord>, SearchError> {
        let client = match attempt.proxy.as_deref() {
            Some(proxy) => build_client(self.config.timeout, Some(proxy))
                .map_err(|err| SearchError::Config(format!("proxy {proxy}: {err}")))?,
            None => self.client.clone(),
        };

        let site_query = format!("site:vimeo.com {query}");
        tracing::info!(endpoint = %self.config.base_url, query = %site_query, "vimeo search");
        let response = client
            .post(&self.config.base_url)
            .header(
                USER_AGENT,
                attempt.user_agent.as_deref().unwrap_or(FALLBACK_USER_AGENT),
            )
            .header(ACCEPT, "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8")
            .form(&[("q", site_query.as_str())])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::ACCEPTED {
            return Err(SearchError::RateLimited {
                platform: Platform::Vimeo.to_string(),
                message: format!("search endpoint answered {status}"),
            });
        }
        if !status.is_success() {
            return Err(SearchError::Platform {
                platform: Platform::Vimeo.to_string(),
                message: format!("POST {} ({status})", self.config.base_url),
            });
        }

        let html = response.text().await?;
        let links = parse_result_links(&html, max_results);
        if links.is_empty() && html.contains("anomaly") {
            return Err(SearchError::RateLimited {
                platform: Platform::Vimeo.to_string(),
                message: "search engine served a bot challenge".to_owned(),
            });
        }

        Ok(links
            .into_iter()
            .map(|(url, title)| VideoRecord {
                platform: Platform::Vimeo,
                query: query.to_owned(),
                url,
                title,
                duration: None,
                uploader: None,
                description: None,
                view_count: None,
                upload_date: None,
            })
            .collect())
    }
}

/// `(url, title)` of result anchors that point at vimeo.com, in page order.
fn parse_result_links(html: &str, max_results: usize) -> Vec<(String, String)> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("a.result__a") else {
        return Vec::new();
    };

    let mut links: Vec<(String, String)> = Vec::new();
    for element in document.select(&selector) {
        if links.len() >= max_results {
            break;
        }
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Some(url) = resolve_result_href(href) else {
            continue;
        };
        if !is_vimeo(&url) || links.iter().any(|(seen, _)| seen == url.as_str()) {
            continue;
        }
        let title = sanitize_text(&element.text().collect::<String>());
        links.push((url.to_string(), title));
    }
    links
}

/// Unwraps `//duckduckgo.com/l/?uddg=<target>` redirect links.
fn resolve_result_href(href: &str) -> Option<Url> {
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_owned()
    };
    let url = Url::parse(&absolute).ok()?;
    let is_redirect = url
        .host_str()
        .is_some_and(|host| host.ends_with("duckduckgo.com"))
        && url.path().starts_with("/l/");
    if !is_redirect {
        return Some(url);
    }
    let target = url
        .query_pairs()
        .find(|(key, _)| key == "uddg")
        .map(|(_, value)| value.into_owned())?;
    Url::parse(&target).ok()
}

fn is_vimeo(url: &Url) -> bool {
    url.host_str()
        .is_some_and(|host| host == "vimeo.com" || host.ends_with(".vimeo.com"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESULTS_HTML: &str = r#"<!doctype html>
<html><body>
  <div class="result">
    <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fvimeo.com%2F12345&amp;rut=abc">Happy dog
in the park</a>
  </div>
  <div class="result">
    <a class="result__a" href="https://www.youtube.com/watch?v=nope">Not vimeo</a>
  </div>
  <div class="result">
    <a class="result__a" href="https://player.vimeo.com/video/678">Player link</a>
  </div>
  <div class="result">
    <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fvimeo.com%2F12345">Duplicate</a>
  </div>
  <a class="other" href="https://vimeo.com/999">Not a result</a>
</body></html>"#;

    #[test]
    fn keeps_vimeo_results_in_order() {
        let links = parse_result_links(RESULTS_HTML, 5);
        assert_eq!(
            links,
            [
                (
                    "https://vimeo.com/12345".to_owned(),
                    "Happy dog in the park".to_owned()
                ),
                (
                    "https://player.vimeo.com/video/678".to_owned(),
                    "Player link".to_owned()
                ),
            ]
        );
    }

    #[test]
    fn honours_max_results() {
        assert_eq!(parse_result_links(RESULTS_HTML, 1).len(), 1);
    }

    #[test]
    fn rejects_lookalike_hosts() {
        let url = Url::parse("https://notvimeo.com/1").unwrap();
        assert!(!is_vimeo(&url));
    }
}
