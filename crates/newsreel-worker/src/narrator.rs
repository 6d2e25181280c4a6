//! Text-to-speech narration.

use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;
use tracing::{debug, info};

use newsreel_media::MediaProbe;
use newsreel_models::Narration;

use crate::config::TtsConfig;
use crate::error::{WorkerError, WorkerResult};

static UNSPEAKABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[^\w\s,!.?'"-]"#).unwrap());

/// Drop emoji and other symbols the voice would read out or choke on.
pub fn clean_for_speech(text: &str) -> String {
    UNSPEAKABLE.replace_all(text, "").trim().to_string()
}

/// Speaks a script into an audio file.
#[async_trait]
pub trait Narrator: Send + Sync {
    async fn narrate(&self, script: &str, output: &Path) -> WorkerResult<Narration>;
}

/// [`Narrator`] running the `edge-tts` CLI, timed with FFprobe.
pub struct EdgeTtsNarrator {
    config: TtsConfig,
    probe: Arc<dyn MediaProbe>,
}

impl EdgeTtsNarrator {
    pub fn new(config: TtsConfig, probe: Arc<dyn MediaProbe>) -> Self {
        Self { config, probe }
    }

    fn build_args(&self, text: &str, output: &Path) -> Vec<String> {
        vec![
            "--voice".to_string(),
            self.config.voice.clone(),
            "--text".to_string(),
            text.to_string(),
            "--write-media".to_string(),
            output.to_string_lossy().to_string(),
        ]
    }
}

#[async_trait]
impl Narrator for EdgeTtsNarrator {
    async fn narrate(&self, script: &str, output: &Path) -> WorkerResult<Narration> {
        let text = clean_for_speech(script);
        if text.is_empty() {
            return Err(WorkerError::narration_failed("nothing speakable in script"));
        }

        which::which(&self.config.binary)
            .map_err(|_| WorkerError::config_error(format!("{} not found in PATH", self.config.binary)))?;

        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        debug!(voice = %self.config.voice, chars = text.len(), "Running {}", self.config.binary);
        let child = Command::new(&self.config.binary)
            .args(self.build_args(&text, output))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let result = tokio::time::timeout(
            Duration::from_secs(self.config.timeout_secs),
            child.wait_with_output(),
        )
        .await
        .map_err(|_| {
            WorkerError::narration_failed(format!("timed out after {}s", self.config.timeout_secs))
        })??;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(WorkerError::narration_failed(format!(
                "{} exited with {:?}: {}",
                self.config.binary,
                result.status.code(),
                stderr.trim()
            )));
        }

        let info = self.probe.probe(output).await?;
        if info.duration <= 0.0 {
            return Err(WorkerError::narration_failed(format!(
                "{} has no duration",
                output.display()
            )));
        }

        info!(path = %output.display(), duration = info.duration, "Narration saved");
        Ok(Narration {
            path: output.to_path_buf(),
            duration: info.duration,
        })
    }
}
