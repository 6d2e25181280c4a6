//! Media metrics.
//!
//! - Normalization latency by playback mode
//! - Render latency and outcome
//! - Assets dropped before reaching the compositor

use metrics::{counter, histogram};

/// Metric name constants for consistency.
pub mod names {
    /// Seconds spent normalizing one segment, by mode.
    pub const NORMALIZE_SECONDS: &str = "newsreel_normalize_seconds";

    /// Seconds spent in the final render, by outcome.
    pub const RENDER_SECONDS: &str = "newsreel_render_seconds";

    /// Total renders by outcome.
    pub const RENDERS_TOTAL: &str = "newsreel_renders_total";

    /// Assets dropped, by the step that rejected them.
    pub const ASSETS_SKIPPED_TOTAL: &str = "newsreel_assets_skipped_total";
}

/// Record one normalized segment.
pub fn record_normalize(mode: &'static str, secs: f64) {
    histogram!(names::NORMALIZE_SECONDS, "mode" => mode).record(secs);
}

/// Record a finished or failed render.
pub fn record_render(outcome: &'static str, secs: f64) {
    counter!(names::RENDERS_TOTAL, "outcome" => outcome).increment(1);
    histogram!(names::RENDER_SECONDS, "outcome" => outcome).record(secs);
}

/// Record an asset that was dropped.
pub fn record_asset_skipped(step: &'static str) {
    counter!(names::ASSETS_SKIPPED_TOTAL, "step" => step).increment(1);
}
