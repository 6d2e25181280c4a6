#![deny(unreachable_patterns)]
//! FFmpeg-backed media layer for Newsreel.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building and a runner with progress parsing,
//!   timeouts and kill-on-drop
//! - FFprobe media inspection
//! - Word-level narration alignment through a speech-to-text engine
//! - The timeline builder (scene partitioning, asset layout, captions)
//! - Asset normalization to fixed-canvas, fixed-length segments
//! - The final compositor

pub mod command;
pub mod error;
pub mod filters;
pub mod metrics;
pub mod normalize;
pub mod probe;
pub mod progress;
pub mod render;
pub mod timeline;
pub mod transcribe;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use normalize::{
    normalize_batch, normalize_timeline, plan_fit, plan_transform, FfmpegNormalizer,
    NormalizeRequest, NormalizeSettings, NormalizedSegment, SegmentNormalizer,
};
pub use probe::{probe_media, Ffprobe, MediaInfo, MediaProbe};
pub use progress::FfmpegProgress;
pub use render::{
    Compositor, FfmpegCompositor, MusicBed, OutputLock, RenderJob, RenderOutput, RenderSettings,
    DEFAULT_MUSIC_GAIN,
};
pub use timeline::{
    place_captions, Timeline, TimelineBuilder, TimelineError, TimelineResult, TimelineStrategy,
};
pub use transcribe::{parse_whisper_json, SpeechToText, TranscriptAligner, WhisperCli, WhisperConfig};
