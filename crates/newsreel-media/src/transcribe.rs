//! Word-level transcription of narration tracks.
//!
//! [`TranscriptAligner`] wraps any [`SpeechToText`] engine. The default
//! engine is the `whisper` CLI, run with word timestamps and JSON output
//! into a scratch directory that is removed when the call returns.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, info};

use newsreel_models::{Transcript, TranscriptSegment, TranscriptWord};

use crate::error::{MediaError, MediaResult};

/// A speech-to-text engine producing word timestamps.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, audio: &Path) -> MediaResult<Transcript>;
}

/// Whisper CLI settings.
#[derive(Debug, Clone)]
pub struct WhisperConfig {
    pub binary: String,
    pub model: String,
    /// `None` lets whisper detect the language
    pub language: Option<String>,
    pub timeout_secs: u64,
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self {
            binary: "whisper".to_string(),
            model: "base".to_string(),
            language: None,
            timeout_secs: 600,
        }
    }
}

impl WhisperConfig {
    /// Read `WHISPER_BIN`, `WHISPER_MODEL`, `WHISPER_LANGUAGE` and
    /// `WHISPER_TIMEOUT_SECS`, keeping defaults for anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            binary: std::env::var("WHISPER_BIN").unwrap_or(defaults.binary),
            model: std::env::var("WHISPER_MODEL").unwrap_or(defaults.model),
            language: std::env::var("WHISPER_LANGUAGE")
                .ok()
                .filter(|l| !l.trim().is_empty()),
            timeout_secs: std::env::var("WHISPER_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.timeout_secs),
        }
    }
}

/// Runs the `whisper` command line tool.
#[derive(Debug, Clone, Default)]
pub struct WhisperCli {
    config: WhisperConfig,
}

impl WhisperCli {
    pub fn new(config: WhisperConfig) -> Self {
        Self { config }
    }

    fn build_args(&self, audio: &Path, output_dir: &Path) -> Vec<String> {
        let mut args = vec![
            audio.to_string_lossy().to_string(),
            "--model".to_string(),
            self.config.model.clone(),
            "--word_timestamps".to_string(),
            "True".to_string(),
            "--output_format".to_string(),
            "json".to_string(),
            "--output_dir".to_string(),
            output_dir.to_string_lossy().to_string(),
        ];
        if let Some(language) = &self.config.language {
            args.push("--language".to_string());
            args.push(language.clone());
        }
        args
    }
}

#[async_trait]
impl SpeechToText for WhisperCli {
    async fn transcribe(&self, audio: &Path) -> MediaResult<Transcript> {
        which::which(&self.config.binary)
            .map_err(|_| MediaError::ToolNotFound(self.config.binary.clone()))?;

        let scratch = tempfile::tempdir()?;
        let args = self.build_args(audio, scratch.path());
        debug!("Running {} {}", self.config.binary, args.join(" "));

        let child = Command::new(&self.config.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = tokio::time::timeout(
            Duration::from_secs(self.config.timeout_secs),
            child.wait_with_output(),
        )
        .await
        .map_err(|_| MediaError::Timeout(self.config.timeout_secs))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
            let tail: Vec<&str> = tail.into_iter().rev().collect();
            return Err(MediaError::transcription_failed(
                audio,
                format!("whisper exited with {:?}: {}", output.status.code(), tail.join(" | ")),
            ));
        }

        let json_path = whisper_output_path(audio, scratch.path());
        let raw = tokio::fs::read_to_string(&json_path).await.map_err(|e| {
            MediaError::transcription_failed(audio, format!("missing {}: {}", json_path.display(), e))
        })?;

        parse_whisper_json(&raw)
    }
}

/// Whisper names its output after the input file stem.
fn whisper_output_path(audio: &Path, output_dir: &Path) -> PathBuf {
    let stem = audio
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "audio".to_string());
    output_dir.join(format!("{}.json", stem))
}

#[derive(Debug, Deserialize)]
struct WhisperOutput {
    #[serde(default)]
    segments: Vec<WhisperSegment>,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    start: f64,
    end: f64,
    #[serde(default)]
    text: String,
    #[serde(default)]
    words: Vec<WhisperWord>,
}

#[derive(Debug, Deserialize)]
struct WhisperWord {
    word: String,
    start: f64,
    end: f64,
}

/// Parse whisper's JSON output into a [`Transcript`].
pub fn parse_whisper_json(raw: &str) -> MediaResult<Transcript> {
    let output: WhisperOutput = serde_json::from_str(raw)?;

    let segments = output
        .segments
        .into_iter()
        .map(|segment| TranscriptSegment {
            start: segment.start,
            end: segment.end,
            text: segment.text.trim().to_string(),
            words: segment
                .words
                .into_iter()
                .map(|w| TranscriptWord::new(w.word.trim(), w.start, w.end))
                .collect(),
        })
        .collect();

    Ok(Transcript::new(segments))
}

/// Produces word timestamps for a finished narration track.
#[derive(Clone)]
pub struct TranscriptAligner {
    engine: Arc<dyn SpeechToText>,
}

impl TranscriptAligner {
    pub fn new(engine: Arc<dyn SpeechToText>) -> Self {
        Self { engine }
    }

    /// Transcribe `audio` to completion.
    ///
    /// Every failure, including a missing file or a timeout, comes back as
    /// `TranscriptionFailed` so the caller can fail the task.
    pub async fn align(&self, audio: &Path) -> MediaResult<Transcript> {
        if !audio.exists() {
            return Err(MediaError::transcription_failed(audio, "audio file not found"));
        }

        let started = Instant::now();
        let transcript = self.engine.transcribe(audio).await.map_err(|e| match e {
            MediaError::TranscriptionFailed { .. } => e,
            other => MediaError::transcription_failed(audio, other),
        })?;

        info!(
            audio = %audio.display(),
            segments = transcript.segments().len(),
            words = transcript.word_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Narration aligned"
        );
        Ok(transcript)
    }
}
