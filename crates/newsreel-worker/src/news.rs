//! Headline sources for the ingest stage.

use std::sync::LazyLock;

use async_trait::async_trait;
use futures::future::join_all;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::HackerNewsConfig;
use crate::error::{WorkerError, WorkerResult};

static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

/// A candidate story.
#[derive(Debug, Clone, PartialEq)]
pub struct NewsItem {
    pub title: String,
    pub url: Option<String>,
    pub text: Option<String>,
}

impl NewsItem {
    pub fn new(title: impl AsRef<str>) -> Self {
        Self {
            title: clean_title(title.as_ref()),
            url: None,
            text: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Text handed to the script writer: story body, else link, else title.
    pub fn source_text(&self) -> String {
        self.text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .or(self.url.as_deref())
            .unwrap_or(self.title.as_str())
            .to_string()
    }
}

/// Cut `"Headline - Publisher"` down to the headline.
pub fn clean_title(raw: &str) -> String {
    raw.split(" - ").next().unwrap_or(raw).trim().to_string()
}

/// A feed of current headlines, most relevant first.
#[async_trait]
pub trait NewsSource: Send + Sync {
    /// Stored as the task's `source`.
    fn name(&self) -> &str;

    async fn headlines(&self) -> WorkerResult<Vec<NewsItem>>;
}

/// Top stories from the public Hacker News API.
pub struct HackerNewsSource {
    config: HackerNewsConfig,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct HnItem {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    dead: bool,
    #[serde(default)]
    deleted: bool,
}

impl HackerNewsSource {
    pub fn new(config: HackerNewsConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> WorkerResult<T> {
        let url = format!("{}/{}", self.config.base_url.trim_end_matches('/'), path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| WorkerError::news_failed(format!("GET {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(WorkerError::news_failed(format!(
                "GET {} returned {}",
                url,
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| WorkerError::news_failed(format!("Failed to parse {}: {}", url, e)))
    }
}

#[async_trait]
impl NewsSource for HackerNewsSource {
    fn name(&self) -> &str {
        "hacker_news"
    }

    async fn headlines(&self) -> WorkerResult<Vec<NewsItem>> {
        let ids: Vec<u64> = self.get_json("topstories.json").await?;
        debug!(count = ids.len(), "Fetched top story ids");

        let fetches = ids
            .iter()
            .take(self.config.max_items)
            .map(|id| async move {
                let path = format!("item/{}.json", id);
                self.get_json::<Option<HnItem>>(&path).await
            });

        let items = join_all(fetches)
            .await
            .into_iter()
            .filter_map(|result| match result {
                Ok(item) => item,
                Err(e) => {
                    warn!("Skipping story: {}", e);
                    None
                }
            })
            .filter(|item| !item.dead && !item.deleted)
            .filter(|item| item.kind.as_deref().map_or(true, |k| k == "story"))
            .filter_map(|item| {
                let title = item.title.filter(|t| !t.trim().is_empty())?;
                let mut news = NewsItem::new(title);
                news.url = item.url;
                news.text = item
                    .text
                    .map(|html| HTML_TAG.replace_all(&html, " ").trim().to_string());
                Some(news)
            })
            .collect();

        Ok(items)
    }
}
