//! FFprobe media information.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use newsreel_models::{AssetKind, VisualAsset};

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// Demuxers FFmpeg uses for single still images.
const IMAGE_FORMATS: &[&str] = &["image2", "png_pipe", "jpeg_pipe", "webp_pipe", "bmp_pipe"];

/// Media file information.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Duration in seconds (0 for still images)
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Video codec, empty for audio-only files
    pub codec: String,
    /// Container format reported by FFprobe
    pub format_name: String,
    pub has_video: bool,
    pub has_audio: bool,
    pub size: u64,
}

impl MediaInfo {
    pub fn is_still_image(&self) -> bool {
        self.format_name
            .split(',')
            .any(|f| IMAGE_FORMATS.contains(&f.trim()))
    }

    /// Describe the file at `path` as a visual asset.
    ///
    /// Fails with `AssetUnusable` when the file has no decodable picture or,
    /// for clips, no usable duration.
    pub fn to_visual_asset(&self, path: &Path) -> MediaResult<VisualAsset> {
        if !self.has_video || self.width == 0 || self.height == 0 {
            return Err(MediaError::asset_unusable(path, "no video stream"));
        }

        let kind = if self.is_still_image() {
            AssetKind::Image
        } else {
            AssetKind::from_path(path).unwrap_or(AssetKind::Clip)
        };

        match kind {
            AssetKind::Image => Ok(VisualAsset::image(path, self.width, self.height)),
            AssetKind::Clip if self.duration > 0.0 => {
                Ok(VisualAsset::clip(path, self.duration, self.width, self.height))
            }
            AssetKind::Clip => Err(MediaError::asset_unusable(path, "clip has zero duration")),
        }
    }
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    format_name: Option<String>,
    duration: Option<String>,
    size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
}

/// Source of media information.
#[async_trait]
pub trait MediaProbe: Send + Sync {
    async fn probe(&self, path: &Path) -> MediaResult<MediaInfo>;
}

/// [`MediaProbe`] backed by the `ffprobe` binary.
#[derive(Debug, Clone, Default)]
pub struct Ffprobe;

#[async_trait]
impl MediaProbe for Ffprobe {
    async fn probe(&self, path: &Path) -> MediaResult<MediaInfo> {
        probe_media(path).await
    }
}

/// Probe a media file for information.
pub async fn probe_media(path: impl AsRef<Path>) -> MediaResult<MediaInfo> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    check_ffprobe()?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: format!("FFprobe failed on {}", path.display()),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    parse_probe_output(&output.stdout)
}

fn parse_probe_output(stdout: &[u8]) -> MediaResult<MediaInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)?;

    let video = probe.streams.iter().find(|s| s.codec_type == "video");
    let has_audio = probe.streams.iter().any(|s| s.codec_type == "audio");

    if video.is_none() && !has_audio {
        return Err(MediaError::InvalidMedia("no audio or video stream".to_string()));
    }

    let format_name = probe.format.format_name.unwrap_or_default();
    let mut info = MediaInfo {
        duration: probe
            .format
            .duration
            .as_deref()
            .and_then(|d| d.parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d >= 0.0)
            .unwrap_or(0.0),
        size: probe
            .format
            .size
            .as_deref()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0),
        format_name,
        has_audio,
        ..Default::default()
    };

    if let Some(stream) = video {
        info.has_video = true;
        info.width = stream.width.unwrap_or(0);
        info.height = stream.height.unwrap_or(0);
        info.codec = stream.codec_name.clone().unwrap_or_default();
        info.fps = stream
            .avg_frame_rate
            .as_deref()
            .and_then(parse_frame_rate)
            .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_frame_rate))
            .unwrap_or(0.0);
    }

    if info.is_still_image() {
        info.duration = 0.0;
    }

    Ok(info)
}

/// Parse frame rate string (e.g., "30/1" or "29.97").
fn parse_frame_rate(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        return (den > 0.0).then(|| num / den);
    }
    s.parse().ok()
}
