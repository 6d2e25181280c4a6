//! Timeline building.
//!
//! Turns a narration length, its transcript and the assets gathered for each
//! scene into one ordered layer plan:
//!
//! 1. **Partition**: split `[0, total)` into scene windows, either evenly
//!    ([`TimelineStrategy::Uniform`]) or on transcript segment boundaries
//!    ([`TimelineStrategy::Gapless`]).
//! 2. **Layout**: divide each window evenly across the scene's usable assets.
//!    A window with nothing to show is held by the previous segment, or by
//!    the next one when nothing precedes it.
//! 3. **Plan**: attach a canvas fit and a loop/trim/zoom transform to every
//!    segment.
//! 4. **Captions**: one event per spoken word, clamped into the timeline.
//!
//! The resulting segments always cover the full narration without gaps or
//! overlaps.

mod builder;
mod captions;
mod partition;

pub use builder::TimelineBuilder;
pub use captions::place_captions;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use newsreel_models::{CanvasSize, CaptionEvent, TimelineSegment, ZoomPolicy};

use crate::normalize::plan_transform;

/// Windows at or below this length (seconds) are dropped.
pub const MIN_WINDOW_SECS: f64 = 0.001;

/// Errors that can occur while building or editing a timeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimelineError {
    #[error("No scene has a usable visual")]
    NoVisuals,

    #[error("Invalid narration duration: {0}")]
    InvalidDuration(f64),

    #[error("Segment {index} out of range ({len} segments)")]
    SegmentOutOfRange { index: usize, len: usize },
}

pub type TimelineResult<T> = Result<T, TimelineError>;

/// How scene windows are partitioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimelineStrategy {
    /// Equal share per scene, then per asset
    #[default]
    Uniform,
    /// Scene windows follow transcript segment starts
    Gapless,
}

impl TimelineStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimelineStrategy::Uniform => "uniform",
            TimelineStrategy::Gapless => "gapless",
        }
    }
}

impl fmt::Display for TimelineStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TimelineStrategy {
    type Err = StrategyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "uniform" => Ok(TimelineStrategy::Uniform),
            "gapless" | "transcript" => Ok(TimelineStrategy::Gapless),
            _ => Err(StrategyParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Unknown timeline strategy: {0}")]
pub struct StrategyParseError(String);

/// An ordered, gapless layer plan for one narration.
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    total_duration: f64,
    segments: Vec<TimelineSegment>,
    captions: Vec<CaptionEvent>,
    canvas: CanvasSize,
    zoom: ZoomPolicy,
}

impl Timeline {
    pub(crate) fn new(
        total_duration: f64,
        segments: Vec<TimelineSegment>,
        captions: Vec<CaptionEvent>,
        canvas: CanvasSize,
        zoom: ZoomPolicy,
    ) -> Self {
        Self {
            total_duration,
            segments,
            captions,
            canvas,
            zoom,
        }
    }

    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    pub fn segments(&self) -> &[TimelineSegment] {
        &self.segments
    }

    pub fn captions(&self) -> &[CaptionEvent] {
        &self.captions
    }

    pub fn canvas(&self) -> CanvasSize {
        self.canvas
    }

    /// Sum of all segment durations.
    pub fn covered_duration(&self) -> f64 {
        self.segments.iter().map(|s| s.duration).sum()
    }

    /// Whether consecutive segments touch within `tolerance` seconds and the
    /// whole narration is covered.
    pub fn is_contiguous(&self, tolerance: f64) -> bool {
        let (Some(first), Some(last)) = (self.segments.first(), self.segments.last()) else {
            return false;
        };
        first.start.abs() <= tolerance
            && (last.end() - self.total_duration).abs() <= tolerance
            && self
                .segments
                .windows(2)
                .all(|pair| (pair[0].end() - pair[1].start).abs() <= tolerance)
    }

    /// Remove the segment at `index`, handing its time span to a neighbour.
    ///
    /// The previous segment is stretched when there is one, otherwise the
    /// next segment is pulled back to the removed start. Returns the indices
    /// (after removal) of segments whose duration changed and must be
    /// normalized again.
    pub fn absorb(&mut self, index: usize) -> TimelineResult<Vec<usize>> {
        if index >= self.segments.len() {
            return Err(TimelineError::SegmentOutOfRange {
                index,
                len: self.segments.len(),
            });
        }

        let removed = self.segments.remove(index);
        if self.segments.is_empty() {
            return Err(TimelineError::NoVisuals);
        }

        let changed = if index > 0 {
            let prev = &mut self.segments[index - 1];
            prev.duration = removed.end() - prev.start;
            index - 1
        } else {
            let next = &mut self.segments[0];
            next.duration = next.end() - removed.start;
            next.start = removed.start;
            0
        };
        self.replan(changed);

        Ok(vec![changed])
    }

    fn replan(&mut self, index: usize) {
        let (canvas, zoom) = (self.canvas, self.zoom);
        if let Some(segment) = self.segments.get_mut(index) {
            segment.transform = plan_transform(&segment.asset, segment.duration, canvas, &zoom);
        }
    }
}
