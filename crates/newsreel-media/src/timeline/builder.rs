//! Timeline builder.

use tracing::{debug, warn};

use newsreel_models::{
    CanvasSize, CaptionStyle, TimelineSegment, Transcript, VisualAsset, VisualScene, ZoomPolicy,
};

use super::captions::place_captions;
use super::partition::{gapless_windows, split_evenly, uniform_windows, Window};
use super::{Timeline, TimelineError, TimelineResult, TimelineStrategy, MIN_WINDOW_SECS};
use crate::normalize::plan_transform;

/// Builds a [`Timeline`] from a narration, its transcript and scene assets.
#[derive(Debug, Clone)]
pub struct TimelineBuilder {
    strategy: TimelineStrategy,
    canvas: CanvasSize,
    zoom: ZoomPolicy,
    caption_style: CaptionStyle,
}

impl TimelineBuilder {
    pub fn new(strategy: TimelineStrategy) -> Self {
        Self {
            strategy,
            canvas: CanvasSize::default(),
            zoom: ZoomPolicy::default(),
            caption_style: CaptionStyle::default(),
        }
    }

    pub fn with_canvas(mut self, canvas: CanvasSize) -> Self {
        self.canvas = canvas;
        self
    }

    pub fn with_zoom(mut self, zoom: ZoomPolicy) -> Self {
        self.zoom = zoom;
        self
    }

    pub fn with_caption_style(mut self, style: CaptionStyle) -> Self {
        self.caption_style = style;
        self
    }

    pub fn strategy(&self) -> TimelineStrategy {
        self.strategy
    }

    /// Build the layer plan.
    ///
    /// `scenes` are in narrative order; exhausted scenes (no usable asset)
    /// keep their window but show the previous visual. Fails with
    /// [`TimelineError::NoVisuals`] when no scene has anything to show.
    pub fn build(
        &self,
        total_duration: f64,
        transcript: Transcript,
        scenes: &[VisualScene],
    ) -> TimelineResult<Timeline> {
        if !total_duration.is_finite() || total_duration <= 0.0 {
            return Err(TimelineError::InvalidDuration(total_duration));
        }
        if scenes.is_empty() {
            return Err(TimelineError::NoVisuals);
        }

        let windows = match self.strategy {
            TimelineStrategy::Uniform => uniform_windows(total_duration, scenes.len()),
            TimelineStrategy::Gapless => {
                let starts: Vec<f64> = transcript.segments().iter().map(|s| s.start).collect();
                if starts.is_empty() {
                    warn!("Transcript has no segments, falling back to uniform split");
                    uniform_windows(total_duration, scenes.len())
                } else {
                    gapless_windows(total_duration, &starts, scenes.len())
                }
            }
        };

        let segments = self.layout(&windows, scenes)?;
        let captions = place_captions(&transcript.into_words(), total_duration, &self.caption_style);

        debug!(
            strategy = %self.strategy,
            windows = windows.len(),
            segments = segments.len(),
            captions = captions.len(),
            "Built timeline"
        );

        Ok(Timeline::new(total_duration, segments, captions, self.canvas, self.zoom))
    }

    fn layout(&self, windows: &[Window], scenes: &[VisualScene]) -> TimelineResult<Vec<TimelineSegment>> {
        let mut segments: Vec<TimelineSegment> = Vec::new();
        // Start of time not yet covered because no segment precedes it
        let mut carry: Option<f64> = None;

        for window in windows {
            let scene = &scenes[window.scene];
            let assets: Vec<&VisualAsset> = scene.assets.iter().filter(|a| a.is_usable()).collect();

            if window.len() <= MIN_WINDOW_SECS || assets.is_empty() {
                match segments.last_mut() {
                    Some(last) => last.duration = window.end - last.start,
                    None => {
                        carry.get_or_insert(window.start);
                    }
                }
                continue;
            }

            let max_parts = ((window.len() / MIN_WINDOW_SECS).floor() as usize).max(1);
            let parts = assets.len().min(max_parts);

            for (asset, (slot_start, slot_end)) in assets
                .into_iter()
                .zip(split_evenly(window.start, window.end, parts))
            {
                let start = carry.take().unwrap_or(slot_start);
                let duration = slot_end - start;
                segments.push(TimelineSegment {
                    scene_index: scene.scene_index,
                    asset: asset.clone(),
                    start,
                    duration,
                    transform: plan_transform(asset, duration, self.canvas, &self.zoom),
                });
            }
        }

        if segments.is_empty() {
            return Err(TimelineError::NoVisuals);
        }

        // Durations of held segments changed after they were planned
        for segment in &mut segments {
            segment.transform = plan_transform(&segment.asset, segment.duration, self.canvas, &self.zoom);
        }

        Ok(segments)
    }
}
