//! Stock media search.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use newsreel_models::AssetKind;

use crate::config::PixabayConfig;
use crate::error::{WorkerError, WorkerResult};

/// A remote asset that may be downloaded for a scene.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetCandidate {
    pub url: String,
    pub kind: AssetKind,
    /// Name of the source that returned it
    pub source: String,
}

impl AssetCandidate {
    /// File extension to save the download under.
    pub fn extension(&self) -> &'static str {
        match self.kind {
            AssetKind::Clip => "mp4",
            AssetKind::Image => {
                let path = self.url.split(['?', '#']).next().unwrap_or_default();
                if path.to_ascii_lowercase().ends_with(".png") {
                    "png"
                } else {
                    "jpg"
                }
            }
        }
    }
}

/// A searchable pool of stock footage or stills.
#[async_trait]
pub trait AssetSource: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, term: &str) -> WorkerResult<Vec<AssetCandidate>>;
}

#[derive(Debug, Deserialize)]
struct VideoSearchResponse {
    #[serde(default)]
    hits: Vec<VideoHit>,
}

#[derive(Debug, Deserialize)]
struct VideoHit {
    videos: VideoRenditions,
}

#[derive(Debug, Deserialize)]
struct VideoRenditions {
    medium: Option<Rendition>,
    small: Option<Rendition>,
}

#[derive(Debug, Deserialize)]
struct Rendition {
    #[serde(default)]
    url: String,
}

#[derive(Debug, Deserialize)]
struct ImageSearchResponse {
    #[serde(default)]
    hits: Vec<ImageHit>,
}

#[derive(Debug, Deserialize)]
struct ImageHit {
    #[serde(rename = "largeImageURL")]
    large_image_url: Option<String>,
    #[serde(rename = "webformatURL")]
    webformat_url: Option<String>,
}

async fn pixabay_get<T: for<'de> Deserialize<'de>>(
    client: &Client,
    url: &str,
    config: &PixabayConfig,
    term: &str,
    extra: &[(&str, &str)],
) -> WorkerResult<T> {
    let per_page = config.per_page.to_string();
    let mut query = vec![
        ("key", config.api_key.as_str()),
        ("q", term),
        ("per_page", per_page.as_str()),
        ("safesearch", "true"),
    ];
    query.extend_from_slice(extra);

    let response = client
        .get(url)
        .query(&query)
        .send()
        .await
        .map_err(|e| WorkerError::asset(format!("Pixabay search '{}' failed: {}", term, e)))?;

    if !response.status().is_success() {
        return Err(WorkerError::asset(format!(
            "Pixabay search '{}' returned {}",
            term,
            response.status()
        )));
    }

    response
        .json()
        .await
        .map_err(|e| WorkerError::asset(format!("Failed to parse Pixabay response: {}", e)))
}

/// Pixabay video search; yields the medium rendition of each hit.
pub struct PixabayVideoSource {
    config: PixabayConfig,
    client: Client,
}

impl PixabayVideoSource {
    pub fn new(config: PixabayConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }
}

#[async_trait]
impl AssetSource for PixabayVideoSource {
    fn name(&self) -> &str {
        "pixabay_video"
    }

    async fn search(&self, term: &str) -> WorkerResult<Vec<AssetCandidate>> {
        let url = format!("{}/videos/", self.config.base_url.trim_end_matches('/'));
        let response: VideoSearchResponse =
            pixabay_get(&self.client, &url, &self.config, term, &[]).await?;

        let candidates: Vec<AssetCandidate> = response
            .hits
            .into_iter()
            .filter_map(|hit| hit.videos.medium.or(hit.videos.small))
            .filter(|rendition| !rendition.url.is_empty())
            .map(|rendition| AssetCandidate {
                url: rendition.url,
                kind: AssetKind::Clip,
                source: self.name().to_string(),
            })
            .collect();

        debug!(term, hits = candidates.len(), "Pixabay video search");
        Ok(candidates)
    }
}

/// Pixabay photo search, portrait orientation.
pub struct PixabayImageSource {
    config: PixabayConfig,
    client: Client,
}

impl PixabayImageSource {
    pub fn new(config: PixabayConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }
}

#[async_trait]
impl AssetSource for PixabayImageSource {
    fn name(&self) -> &str {
        "pixabay_image"
    }

    async fn search(&self, term: &str) -> WorkerResult<Vec<AssetCandidate>> {
        let url = format!("{}/", self.config.base_url.trim_end_matches('/'));
        let extra = [("image_type", "photo"), ("orientation", "vertical")];
        let response: ImageSearchResponse =
            pixabay_get(&self.client, &url, &self.config, term, &extra).await?;

        let candidates: Vec<AssetCandidate> = response
            .hits
            .into_iter()
            .filter_map(|hit| hit.large_image_url.or(hit.webformat_url))
            .filter(|url| !url.is_empty())
            .map(|url| AssetCandidate {
                url,
                kind: AssetKind::Image,
                source: self.name().to_string(),
            })
            .collect();

        debug!(term, hits = candidates.len(), "Pixabay image search");
        Ok(candidates)
    }
}
