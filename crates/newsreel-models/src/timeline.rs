//! Timeline layer plan types.
//!
//! These are the outputs of timeline building and the inputs of
//! normalization and compositing:
//! - [`TimelineSegment`]: one normalized visual placed on the canvas
//! - [`CaptionEvent`]: one spoken word rendered over the visuals
//! - [`SegmentTransform`]: how an asset is fitted and stretched to its window

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::scene::VisualAsset;

/// Default vertical canvas width
pub const DEFAULT_CANVAS_WIDTH: u32 = 1080;
/// Default vertical canvas height
pub const DEFAULT_CANVAS_HEIGHT: u32 = 1920;
/// Shortest on-screen time for a caption, in seconds
pub const MIN_CAPTION_DURATION: f64 = 0.1;
/// Zoom reached at the end of a still-image segment
pub const DEFAULT_TERMINAL_ZOOM: f64 = 1.15;

/// Output canvas dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

impl CanvasSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for CanvasSize {
    fn default() -> Self {
        Self::new(DEFAULT_CANVAS_WIDTH, DEFAULT_CANVAS_HEIGHT)
    }
}

impl fmt::Display for CanvasSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Synthetic motion applied to still images.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ZoomPolicy {
    /// Scale reached at the end of the segment (start is always 1.0)
    pub terminal_scale: f64,
}

impl ZoomPolicy {
    /// Zoom factor at `elapsed` seconds into a segment of `duration` seconds.
    pub fn scale_at(&self, elapsed: f64, duration: f64) -> f64 {
        if duration <= 0.0 {
            return 1.0;
        }
        let progress = (elapsed / duration).clamp(0.0, 1.0);
        1.0 + (self.terminal_scale - 1.0) * progress
    }
}

impl Default for ZoomPolicy {
    fn default() -> Self {
        Self {
            terminal_scale: DEFAULT_TERMINAL_ZOOM,
        }
    }
}

/// Cover-fit of an asset onto the canvas: scale, then centre crop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CanvasFit {
    /// Asset size after scaling (both >= canvas)
    pub scaled_width: u32,
    pub scaled_height: u32,
    /// Top-left corner of the canvas-sized crop window
    pub crop_x: u32,
    pub crop_y: u32,
}

/// How the asset fills its window in time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Playback {
    /// Clip at least as long as the window, cut to `[0, duration)`
    Trim,
    /// Clip shorter than the window, repeated end-to-start
    Loop { extra_loops: u32 },
    /// Still image with a linear zoom from 1.0 to `terminal_scale`
    Zoom { terminal_scale: f64 },
}

/// Spatial and temporal transform of one segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SegmentTransform {
    pub fit: CanvasFit,
    pub playback: Playback,
}

/// One visual asset scheduled on the output timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TimelineSegment {
    /// Scene the asset was gathered for
    pub scene_index: usize,
    pub asset: VisualAsset,
    /// Seconds from the start of the narration
    pub start: f64,
    pub duration: f64,
    pub transform: SegmentTransform,
}

impl TimelineSegment {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// Horizontal placement of captions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum HorizontalAnchor {
    #[default]
    Center,
    /// Fixed pixel offset from the left edge
    Offset(u32),
}

/// Fixed screen anchor for captions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CaptionPosition {
    pub x: HorizontalAnchor,
    /// Pixels from the top of the canvas
    pub y: u32,
}

impl Default for CaptionPosition {
    fn default() -> Self {
        Self {
            x: HorizontalAnchor::Center,
            y: 1400,
        }
    }
}

/// One word on screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CaptionEvent {
    pub text: String,
    pub start: f64,
    pub end: f64,
    pub position: CaptionPosition,
}

impl CaptionEvent {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Caption rendering style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CaptionStyle {
    /// TrueType font file; FFmpeg's default font when unset
    #[serde(default)]
    pub font_file: Option<PathBuf>,
    pub font_size: u32,
    pub fill_color: String,
    pub stroke_color: String,
    pub stroke_width: u32,
    /// Widest a caption may render before its font is shrunk
    pub max_width: u32,
    pub position: CaptionPosition,
    pub uppercase: bool,
    pub min_duration: f64,
}

impl Default for CaptionStyle {
    fn default() -> Self {
        Self {
            font_file: None,
            font_size: 80,
            fill_color: "yellow".to_string(),
            stroke_color: "black".to_string(),
            stroke_width: 4,
            max_width: 900,
            position: CaptionPosition::default(),
            uppercase: true,
            min_duration: MIN_CAPTION_DURATION,
        }
    }
}

impl CaptionStyle {
    /// Glyph advance as a fraction of font size, for bold sans fonts.
    const AVG_GLYPH_WIDTH: f64 = 0.6;

    /// Apply the text transform of this style.
    pub fn format_text(&self, text: &str) -> String {
        let trimmed = text.trim();
        if self.uppercase {
            trimmed.to_uppercase()
        } else {
            trimmed.to_string()
        }
    }

    /// Font size that keeps `text` within `max_width`.
    pub fn font_size_for(&self, text: &str) -> u32 {
        let chars = text.chars().count().max(1) as f64;
        let estimated = chars * self.font_size as f64 * Self::AVG_GLYPH_WIDTH;
        if estimated <= self.max_width as f64 {
            return self.font_size;
        }
        let scaled = self.max_width as f64 / (chars * Self::AVG_GLYPH_WIDTH);
        (scaled.floor() as u32).max(1)
    }
}
