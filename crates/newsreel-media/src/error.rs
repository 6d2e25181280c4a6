//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

use crate::timeline::TimelineError;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("{0} not found in PATH")]
    ToolNotFound(String),

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("Transcription of {path} failed: {reason}")]
    TranscriptionFailed { path: PathBuf, reason: String },

    #[error("Asset {path} unusable: {reason}")]
    AssetUnusable { path: PathBuf, reason: String },

    #[error("Render to {output} failed: {reason}")]
    RenderFailed { output: PathBuf, reason: String },

    #[error("Output {0} is already being rendered")]
    OutputBusy(PathBuf),

    #[error("Timeline error: {0}")]
    Timeline(#[from] TimelineError),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid media file: {0}")]
    InvalidMedia(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    pub fn transcription_failed(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::TranscriptionFailed {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn asset_unusable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::AssetUnusable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn render_failed(output: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::RenderFailed {
            output: output.into(),
            reason: reason.to_string(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Failures confined to a single asset; the caller can drop it and go on.
    pub fn is_asset_level(&self) -> bool {
        matches!(self, Self::AssetUnusable { .. } | Self::FileNotFound(_))
    }

    /// Failures that abort the whole task for this run.
    pub fn is_fatal_to_task(&self) -> bool {
        matches!(
            self,
            Self::TranscriptionFailed { .. }
                | Self::RenderFailed { .. }
                | Self::OutputBusy(_)
                | Self::Timeline(_)
        )
    }

    /// A later attempt might succeed without any change to the inputs.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::OutputBusy(_) | Self::Timeout(_) | Self::Io(_))
    }
}
