//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Asset unusable: {0}")]
    Asset(String),

    #[error("Scene {scene} has no usable asset")]
    SceneExhausted { scene: usize },

    #[error("Every scene is exhausted")]
    AllScenesExhausted,

    #[error("News source failed: {0}")]
    NewsFailed(String),

    #[error("Script generation failed: {0}")]
    ScriptFailed(String),

    #[error("Narration failed: {0}")]
    NarrationFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Task is missing {0}")]
    MissingInput(&'static str),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Store error: {0}")]
    Store(#[from] newsreel_store::StoreError),

    #[error("Media error: {0}")]
    Media(#[from] newsreel_media::MediaError),

    #[error("Model error: {0}")]
    Model(#[from] newsreel_models::ModelError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn asset(msg: impl ToString) -> Self {
        Self::Asset(msg.to_string())
    }

    pub fn news_failed(msg: impl Into<String>) -> Self {
        Self::NewsFailed(msg.into())
    }

    pub fn script_failed(msg: impl Into<String>) -> Self {
        Self::ScriptFailed(msg.into())
    }

    pub fn narration_failed(msg: impl Into<String>) -> Self {
        Self::NarrationFailed(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Check if the next cycle may succeed where this one failed.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::Http(_) | WorkerError::NewsFailed(_) => true,
            WorkerError::Store(e) => e.is_retryable(),
            WorkerError::Media(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Whether this error ends the task it was raised for.
    ///
    /// Store failures leave the task where it is so a later cycle can pick
    /// it up again once the claim goes stale.
    pub fn is_fatal_to_task(&self) -> bool {
        !matches!(
            self,
            WorkerError::Store(_) | WorkerError::Asset(_) | WorkerError::SceneExhausted { .. }
        )
    }
}
