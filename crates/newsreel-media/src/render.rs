//! Final composite rendering.
//!
//! One FFmpeg invocation layers, bottom to top:
//! 1. normalized background segments, concatenated in time order
//! 2. one drawtext overlay per caption, enabled only during its window
//!
//! and mixes the narration (full volume) with an optional looped music bed
//! attenuated to a fixed gain and cut to the narration length.
//!
//! The filter graph goes to a script file inside a per-render scratch
//! directory that is removed when the render returns, successful or not.
//! A partially written output file is left in place for diagnostics.

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex};
use std::time::Instant;
use tracing::{debug, info, warn};

use newsreel_models::{CanvasSize, CaptionEvent, CaptionStyle, EncodingConfig};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters::{caption_chain, concat_filter, music_bed_filter, narration_mix_filter, output_format_filter};
use crate::metrics;
use crate::normalize::NormalizedSegment;

/// Default music gain relative to narration.
pub const DEFAULT_MUSIC_GAIN: f64 = 0.12;

/// Outputs currently being written by this process.
static ACTIVE_OUTPUTS: LazyLock<Mutex<HashSet<PathBuf>>> = LazyLock::new(|| Mutex::new(HashSet::new()));

/// Exclusive hold on an output path for the lifetime of the guard.
#[derive(Debug)]
pub struct OutputLock {
    path: PathBuf,
}

impl OutputLock {
    /// Fails with [`MediaError::OutputBusy`] when another render holds `path`.
    pub fn acquire(path: &Path) -> MediaResult<Self> {
        let key = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        let mut active = ACTIVE_OUTPUTS
            .lock()
            .map_err(|_| MediaError::internal("output lock poisoned"))?;
        if !active.insert(key.clone()) {
            return Err(MediaError::OutputBusy(path.to_path_buf()));
        }
        Ok(Self { path: key })
    }
}

impl Drop for OutputLock {
    fn drop(&mut self) {
        if let Ok(mut active) = ACTIVE_OUTPUTS.lock() {
            active.remove(&self.path);
        }
    }
}

/// Output format of the final artifact.
#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub canvas: CanvasSize,
    pub fps: u32,
    pub encoding: EncodingConfig,
    pub timeout_secs: u64,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            canvas: CanvasSize::default(),
            fps: newsreel_models::encoding::DEFAULT_FPS,
            encoding: EncodingConfig::default(),
            timeout_secs: 1800,
        }
    }
}

impl RenderSettings {
    /// Load overrides from `RENDER_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let canvas = CanvasSize::new(
            env_parse("RENDER_WIDTH").unwrap_or(defaults.canvas.width),
            env_parse("RENDER_HEIGHT").unwrap_or(defaults.canvas.height),
        );
        let mut encoding = defaults.encoding;
        if let Ok(preset) = std::env::var("RENDER_PRESET") {
            encoding = encoding.with_preset(preset);
        }
        if let Some(crf) = env_parse("RENDER_CRF") {
            encoding = encoding.with_crf(crf);
        }

        Self {
            canvas,
            fps: env_parse("RENDER_FPS").unwrap_or(defaults.fps),
            encoding,
            timeout_secs: env_parse("RENDER_TIMEOUT_SECS").unwrap_or(defaults.timeout_secs),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Background music mixed under the narration.
#[derive(Debug, Clone, PartialEq)]
pub struct MusicBed {
    pub path: PathBuf,
    pub gain: f64,
}

/// Everything the compositor needs for one artifact.
#[derive(Debug, Clone)]
pub struct RenderJob {
    /// Normalized background clips in time order
    pub segments: Vec<NormalizedSegment>,
    pub captions: Vec<CaptionEvent>,
    pub narration: PathBuf,
    pub music: Option<MusicBed>,
    pub total_duration: f64,
    pub output: PathBuf,
}

/// A finished artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOutput {
    pub path: PathBuf,
    pub duration: f64,
    pub size_bytes: u64,
}

/// Renders composite videos.
#[async_trait]
pub trait Compositor: Send + Sync {
    async fn render(&self, job: &RenderJob) -> MediaResult<RenderOutput>;
}

/// [`Compositor`] backed by a single FFmpeg filter graph.
#[derive(Debug, Clone, Default)]
pub struct FfmpegCompositor {
    settings: RenderSettings,
    caption_style: CaptionStyle,
}

impl FfmpegCompositor {
    pub fn new(settings: RenderSettings, caption_style: CaptionStyle) -> Self {
        Self {
            settings,
            caption_style,
        }
    }

    /// Filter graph for `job`, with `music` already resolved.
    pub fn build_filter_script(&self, job: &RenderJob, music: Option<&MusicBed>) -> String {
        let n = job.segments.len();
        let mut graph = vec![concat_filter(n, "base")];

        let format = output_format_filter(self.settings.fps);
        let video = match caption_chain(&job.captions, &self.caption_style) {
            Some(chain) => format!("[base]{},{}[vout]", chain, format),
            None => format!("[base]{}[vout]", format),
        };
        graph.push(video);

        if let Some(music) = music {
            graph.push(music_bed_filter(n + 1, music.gain, job.total_duration, "bed"));
            graph.push(narration_mix_filter(&format!("{}:a", n), "bed", "aout"));
        }

        graph.join(";\n")
    }

    /// FFmpeg command reading the graph from `script`.
    pub fn build_command(&self, job: &RenderJob, music: Option<&MusicBed>, script: &Path) -> MediaResult<FfmpegCommand> {
        let (first, rest) = job
            .segments
            .split_first()
            .ok_or_else(|| MediaError::render_failed(&job.output, "no background segments"))?;

        let mut cmd = FfmpegCommand::new(&first.path, &job.output);
        for segment in rest {
            cmd = cmd.add_input(&segment.path);
        }
        cmd = cmd.add_input(&job.narration);
        if let Some(music) = music {
            cmd = cmd.add_input(&music.path).stream_loop(-1);
        }

        let audio_map = if music.is_some() {
            "[aout]".to_string()
        } else {
            format!("{}:a", job.segments.len())
        };

        Ok(cmd
            .filter_complex_script(script)
            .map("[vout]")
            .map(audio_map)
            .output_duration(job.total_duration)
            .frame_rate(self.settings.fps)
            .output_args(self.settings.encoding.to_ffmpeg_args())
            .output_args(["-movflags", "+faststart"]))
    }

    fn validate(&self, job: &RenderJob) -> MediaResult<()> {
        if job.segments.is_empty() {
            return Err(MediaError::render_failed(&job.output, "no background segments"));
        }
        if !job.total_duration.is_finite() || job.total_duration <= 0.0 {
            return Err(MediaError::render_failed(
                &job.output,
                format!("invalid duration {}", job.total_duration),
            ));
        }
        if let Some(missing) = job.segments.iter().find(|s| !s.path.exists()) {
            return Err(MediaError::render_failed(
                &job.output,
                format!("segment {} missing", missing.path.display()),
            ));
        }
        if !job.narration.exists() {
            return Err(MediaError::render_failed(
                &job.output,
                format!("narration {} missing", job.narration.display()),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Compositor for FfmpegCompositor {
    async fn render(&self, job: &RenderJob) -> MediaResult<RenderOutput> {
        let _lock = OutputLock::acquire(&job.output)?;
        self.validate(job)?;

        let music = match &job.music {
            Some(music) if music.path.exists() => Some(music),
            Some(music) => {
                warn!(music = %music.path.display(), "Music track missing, rendering narration only");
                None
            }
            None => None,
        };

        if let Some(parent) = job.output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let scratch = tempfile::Builder::new().prefix("newsreel-render-").tempdir()?;
        let script = scratch.path().join("graph.txt");
        tokio::fs::write(&script, self.build_filter_script(job, music)).await?;
        let cmd = self.build_command(job, music, &script)?;

        info!(
            output = %job.output.display(),
            segments = job.segments.len(),
            captions = job.captions.len(),
            music = music.is_some(),
            duration = job.total_duration,
            "Rendering composite"
        );

        let started = Instant::now();
        let total = job.total_duration;
        let result = FfmpegRunner::new()
            .with_timeout(self.settings.timeout_secs)
            .run_with_progress(&cmd, move |progress| {
                debug!(
                    percent = progress.fraction_of(total) * 100.0,
                    speed = progress.speed,
                    "Render progress"
                );
            })
            .await;
        let elapsed = started.elapsed().as_secs_f64();

        if let Err(e) = result {
            metrics::record_render("failure", elapsed);
            warn!(
                output = %job.output.display(),
                error = %e,
                "Render failed, leaving partial output in place"
            );
            return Err(match e {
                MediaError::FfmpegFailed { stderr, message, .. } => {
                    MediaError::render_failed(&job.output, stderr.unwrap_or(message))
                }
                other => MediaError::render_failed(&job.output, other),
            });
        }

        metrics::record_render("success", elapsed);
        let size_bytes = tokio::fs::metadata(&job.output).await.map(|m| m.len()).unwrap_or(0);
        info!(
            output = %job.output.display(),
            size_bytes,
            elapsed_secs = elapsed,
            "Render complete"
        );

        Ok(RenderOutput {
            path: job.output.clone(),
            duration: job.total_duration,
            size_bytes,
        })
    }
}
