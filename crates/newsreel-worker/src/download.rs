//! Streaming downloads of selected assets.

use std::path::Path;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{WorkerError, WorkerResult};

/// Copies a remote asset to local disk.
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    async fn fetch(&self, url: &str, dest: &Path) -> WorkerResult<()>;
}

/// [`AssetFetcher`] over plain HTTP(S).
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AssetFetcher for HttpFetcher {
    /// Stream `url` into `dest`. A partial file is removed on failure.
    async fn fetch(&self, url: &str, dest: &Path) -> WorkerResult<()> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| WorkerError::asset(format!("Download of {} failed: {}", url, e)))?;

        let result = async {
            let mut file = fs::File::create(dest).await?;
            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                let data = chunk
                    .map_err(|e| WorkerError::asset(format!("Download of {} interrupted: {}", url, e)))?;
                file.write_all(&data).await?;
            }
            file.flush().await?;
            Ok::<(), WorkerError>(())
        }
        .await;

        if result.is_err() {
            let _ = fs::remove_file(dest).await;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_writes_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/clip.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 4096]))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("assets").join("clip.mp4");
        HttpFetcher::default()
            .fetch(&format!("{}/clip.mp4", server.uri()), &dest)
            .await
            .unwrap();

        assert_eq!(std::fs::read(&dest).unwrap().len(), 4096);
    }

    #[tokio::test]
    async fn test_fetch_404_is_asset_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("missing.mp4");
        let err = HttpFetcher::default()
            .fetch(&format!("{}/missing.mp4", server.uri()), &dest)
            .await
            .unwrap_err();

        assert!(matches!(err, WorkerError::Asset(_)));
        assert!(!dest.exists());
    }
}
