//! Worker metrics and the Prometheus exporter.

use std::net::SocketAddr;

use metrics::counter;
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::{WorkerError, WorkerResult};

/// Metric names as constants for consistency.
pub mod names {
    pub const STAGE_RUNS_TOTAL: &str = "newsreel_stage_runs_total";
    pub const SCENES_EXHAUSTED_TOTAL: &str = "newsreel_scenes_exhausted_total";
    pub const ASSETS_FETCHED_TOTAL: &str = "newsreel_assets_fetched_total";
    pub const TASKS_INGESTED_TOTAL: &str = "newsreel_tasks_ingested_total";
}

/// Start the Prometheus scrape endpoint on `0.0.0.0:port`.
pub fn init_prometheus(port: u16) -> WorkerResult<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| WorkerError::config_error(format!("Failed to install Prometheus exporter: {}", e)))
}

/// Record one stage run and how it ended.
pub fn record_stage_run(stage: &str, outcome: &str) {
    let labels = [("stage", stage.to_string()), ("outcome", outcome.to_string())];
    counter!(names::STAGE_RUNS_TOTAL, &labels).increment(1);
}

pub fn record_scene_exhausted() {
    counter!(names::SCENES_EXHAUSTED_TOTAL).increment(1);
}

/// Record a download attempt, by source and result.
pub fn record_asset_fetch(source: &str, success: bool) {
    let labels = [
        ("source", source.to_string()),
        ("result", if success { "ok" } else { "error" }.to_string()),
    ];
    counter!(names::ASSETS_FETCHED_TOTAL, &labels).increment(1);
}

pub fn record_ingested(source: &str) {
    let labels = [("source", source.to_string())];
    counter!(names::TASKS_INGESTED_TOTAL, &labels).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_stage_run("voice", "advanced");
        record_scene_exhausted();
        record_asset_fetch("pixabay_video", false);
        record_ingested("hacker_news");
    }
}
