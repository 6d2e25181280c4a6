//! Asset normalization.
//!
//! Every timeline segment is rendered to its own intermediate file that is
//! exactly canvas-sized, exactly segment-long, video only and at the output
//! frame rate:
//!
//! - **Canvas fit**: scale to cover the canvas, then centre crop. Assets at
//!   least as wide as the canvas are height-matched and cropped horizontally.
//! - **Clips**: trimmed to `[0, duration)` when long enough, otherwise looped
//!   end-to-start with `-stream_loop` and cut at the target.
//! - **Images**: a linear centre zoom from 1.0 to the terminal scale.
//!
//! Planning is pure ([`plan_transform`]); execution goes through the
//! [`SegmentNormalizer`] trait so the pipeline can be driven without FFmpeg.

use async_trait::async_trait;
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use newsreel_models::{
    CanvasFit, CanvasSize, EncodingConfig, Playback, SegmentTransform, TimelineSegment, VisualAsset,
    ZoomPolicy,
};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters::{cover_fit_filter, output_format_filter, zoompan_filter};
use crate::metrics;
use crate::timeline::Timeline;

/// Slack allowed when deciding whether a clip is long enough to trim.
const DURATION_EPSILON: f64 = 1e-3;

/// Cover-fit an asset of `width x height` onto `canvas`.
pub fn plan_fit(width: u32, height: u32, canvas: CanvasSize) -> CanvasFit {
    if width == 0 || height == 0 {
        return CanvasFit {
            scaled_width: canvas.width,
            scaled_height: canvas.height,
            crop_x: 0,
            crop_y: 0,
        };
    }

    let scale = f64::max(
        canvas.width as f64 / width as f64,
        canvas.height as f64 / height as f64,
    );
    let scaled_width = ((width as f64 * scale).round() as u32).max(canvas.width);
    let scaled_height = ((height as f64 * scale).round() as u32).max(canvas.height);

    CanvasFit {
        scaled_width,
        scaled_height,
        crop_x: (scaled_width - canvas.width) / 2,
        crop_y: (scaled_height - canvas.height) / 2,
    }
}

/// Plan how `asset` fills a window of `duration` seconds.
pub fn plan_transform(
    asset: &VisualAsset,
    duration: f64,
    canvas: CanvasSize,
    zoom: &ZoomPolicy,
) -> SegmentTransform {
    let playback = if asset.is_image() {
        Playback::Zoom {
            terminal_scale: zoom.terminal_scale,
        }
    } else if asset.duration <= 0.0 || asset.duration + DURATION_EPSILON >= duration {
        Playback::Trim
    } else {
        let passes = (duration / asset.duration).ceil() as u32;
        Playback::Loop {
            extra_loops: passes.saturating_sub(1),
        }
    };

    SegmentTransform {
        fit: plan_fit(asset.width, asset.height, canvas),
        playback,
    }
}

/// Output format shared by all intermediate segments.
#[derive(Debug, Clone)]
pub struct NormalizeSettings {
    pub canvas: CanvasSize,
    pub fps: u32,
    pub encoding: EncodingConfig,
    /// Per-segment FFmpeg timeout
    pub timeout_secs: u64,
}

impl Default for NormalizeSettings {
    fn default() -> Self {
        Self {
            canvas: CanvasSize::default(),
            fps: newsreel_models::encoding::DEFAULT_FPS,
            encoding: EncodingConfig::for_intermediate(),
            timeout_secs: 300,
        }
    }
}

/// One segment to normalize.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizeRequest {
    pub asset: VisualAsset,
    /// Target duration in seconds
    pub duration: f64,
    pub transform: SegmentTransform,
    pub output: PathBuf,
}

impl NormalizeRequest {
    /// Request for a timeline segment, written into `work_dir`.
    pub fn for_segment(segment: &TimelineSegment, work_dir: &Path) -> Self {
        let file_name = format!(
            "seg_{:02}_{:07}_{:07}.mp4",
            segment.scene_index,
            (segment.start * 1000.0).round() as u64,
            (segment.duration * 1000.0).round() as u64,
        );
        Self {
            asset: segment.asset.clone(),
            duration: segment.duration,
            transform: segment.transform,
            output: work_dir.join(file_name),
        }
    }
}

/// A canvas-sized, duration-exact intermediate clip.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSegment {
    pub path: PathBuf,
    pub duration: f64,
}

/// Renders normalize requests to intermediate files.
#[async_trait]
pub trait SegmentNormalizer: Send + Sync {
    async fn normalize(&self, request: &NormalizeRequest) -> MediaResult<NormalizedSegment>;
}

/// [`SegmentNormalizer`] that shells out to FFmpeg.
#[derive(Debug, Clone, Default)]
pub struct FfmpegNormalizer {
    settings: NormalizeSettings,
}

impl FfmpegNormalizer {
    pub fn new(settings: NormalizeSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &NormalizeSettings {
        &self.settings
    }

    /// Plan and normalize a single asset to `target_duration`.
    pub async fn normalize_asset(
        &self,
        asset: &VisualAsset,
        target_duration: f64,
        zoom: &ZoomPolicy,
        output: impl Into<PathBuf>,
    ) -> MediaResult<NormalizedSegment> {
        let request = NormalizeRequest {
            asset: asset.clone(),
            duration: target_duration,
            transform: plan_transform(asset, target_duration, self.settings.canvas, zoom),
            output: output.into(),
        };
        self.normalize(&request).await
    }

    /// Build the FFmpeg command for a request.
    pub fn build_command(&self, request: &NormalizeRequest) -> FfmpegCommand {
        let settings = &self.settings;
        let fit = cover_fit_filter(&request.transform.fit, settings.canvas);

        let (cmd, filter) = match request.transform.playback {
            Playback::Trim => (
                FfmpegCommand::new(&request.asset.path, &request.output),
                format!("{},{}", fit, output_format_filter(settings.fps)),
            ),
            Playback::Loop { extra_loops } => (
                FfmpegCommand::new(&request.asset.path, &request.output)
                    .stream_loop(extra_loops as i32),
                format!("{},{}", fit, output_format_filter(settings.fps)),
            ),
            Playback::Zoom { terminal_scale } => {
                let frames = (request.duration * settings.fps as f64).ceil() as u64;
                (
                    FfmpegCommand::new(&request.asset.path, &request.output),
                    format!(
                        "{},{},format={}",
                        fit,
                        zoompan_filter(terminal_scale, frames, settings.fps, settings.canvas),
                        settings.encoding.pixel_format
                    ),
                )
            }
        };

        cmd.video_filter(filter)
            .output_duration(request.duration)
            .frame_rate(settings.fps)
            .no_audio()
            .output_args(settings.encoding.video_args())
    }
}

#[async_trait]
impl SegmentNormalizer for FfmpegNormalizer {
    async fn normalize(&self, request: &NormalizeRequest) -> MediaResult<NormalizedSegment> {
        let source = &request.asset.path;
        if !source.exists() {
            return Err(MediaError::asset_unusable(source, "file missing"));
        }
        if !request.duration.is_finite() || request.duration <= 0.0 {
            return Err(MediaError::asset_unusable(
                source,
                format!("invalid target duration {}", request.duration),
            ));
        }

        let started = Instant::now();
        let cmd = self.build_command(request);
        FfmpegRunner::new()
            .with_timeout(self.settings.timeout_secs)
            .run(&cmd)
            .await
            .map_err(|e| match e {
                MediaError::FfmpegFailed { stderr, .. } => MediaError::asset_unusable(
                    source,
                    stderr.unwrap_or_else(|| "FFmpeg failed".to_string()),
                ),
                MediaError::Timeout(secs) => {
                    MediaError::asset_unusable(source, format!("timed out after {}s", secs))
                }
                other => other,
            })?;

        metrics::record_normalize(kind_label(&request.transform.playback), started.elapsed().as_secs_f64());
        debug!(
            asset = %source.display(),
            output = %request.output.display(),
            duration = request.duration,
            "Normalized segment"
        );

        Ok(NormalizedSegment {
            path: request.output.clone(),
            duration: request.duration,
        })
    }
}

fn kind_label(playback: &Playback) -> &'static str {
    match playback {
        Playback::Trim => "trim",
        Playback::Loop { .. } => "loop",
        Playback::Zoom { .. } => "zoom",
    }
}

/// Normalize `requests` concurrently, at most `max_parallel` at a time.
///
/// Results come back in request order; one failing request never affects
/// the others.
pub async fn normalize_batch(
    normalizer: &dyn SegmentNormalizer,
    requests: &[NormalizeRequest],
    max_parallel: usize,
) -> Vec<MediaResult<NormalizedSegment>> {
    let semaphore = Arc::new(Semaphore::new(max_parallel.max(1)));

    let tasks = requests.iter().map(|request| {
        let semaphore = Arc::clone(&semaphore);
        async move {
            let _permit = semaphore
                .acquire()
                .await
                .map_err(|_| MediaError::internal("normalize semaphore closed"))?;
            normalizer.normalize(request).await
        }
    });

    join_all(tasks).await
}

/// Normalize every segment of `timeline`, absorbing the ones that fail.
///
/// A failed segment is removed from the timeline and its neighbour, whose
/// duration changed, is normalized again. Returns one normalized clip per
/// remaining segment, in timeline order. Fails when no segment survives,
/// or at once with any error that is not specific to one asset.
pub async fn normalize_timeline(
    normalizer: &dyn SegmentNormalizer,
    timeline: &mut Timeline,
    work_dir: &Path,
    max_parallel: usize,
) -> MediaResult<Vec<NormalizedSegment>> {
    let requests: Vec<NormalizeRequest> = timeline
        .segments()
        .iter()
        .map(|segment| NormalizeRequest::for_segment(segment, work_dir))
        .collect();
    let mut results = normalize_batch(normalizer, &requests, max_parallel).await;

    loop {
        // Only asset-level failures are absorbed
        take_pipeline_error(&mut results)?;
        let Some(failed) = results.iter().position(|r| r.is_err()) else {
            break;
        };
        if let Err(e) = &results[failed] {
            warn!(segment = failed, error = %e, "Dropping segment that failed to normalize");
            metrics::record_asset_skipped("normalize");
        }

        results.remove(failed);
        let changed = timeline.absorb(failed)?;

        let retry: Vec<NormalizeRequest> = changed
            .iter()
            .map(|&i| NormalizeRequest::for_segment(&timeline.segments()[i], work_dir))
            .collect();
        let retried = normalize_batch(normalizer, &retry, max_parallel).await;
        for (index, result) in changed.into_iter().zip(retried) {
            results[index] = result;
        }
    }

    info!(
        segments = results.len(),
        total = timeline.total_duration(),
        "Normalized timeline"
    );

    Ok(results.into_iter().flatten().collect())
}

/// Return the first error that is not specific to one asset.
fn take_pipeline_error(results: &mut Vec<MediaResult<NormalizedSegment>>) -> MediaResult<()> {
    let fatal = results
        .iter()
        .position(|r| r.as_ref().is_err_and(|e| !e.is_asset_level()));
    match fatal.map(|index| results.swap_remove(index)) {
        Some(Err(e)) => Err(e),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::{TimelineBuilder, TimelineStrategy};
    use newsreel_models::{Transcript, VisualScene};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Succeeds instantly unless the asset path is listed as broken.
    struct FakeNormalizer {
        broken: HashSet<PathBuf>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        calls: Mutex<Vec<PathBuf>>,
    }

    impl FakeNormalizer {
        fn new(broken: &[&str]) -> Self {
            Self {
                broken: broken.iter().map(PathBuf::from).collect(),
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SegmentNormalizer for FakeNormalizer {
        async fn normalize(&self, request: &NormalizeRequest) -> MediaResult<NormalizedSegment> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.calls.lock().unwrap().push(request.asset.path.clone());

            if self.broken.contains(&request.asset.path) {
                return Err(MediaError::asset_unusable(&request.asset.path, "corrupt"));
            }
            Ok(NormalizedSegment {
                path: request.output.clone(),
                duration: request.duration,
            })
        }
    }

    fn clip(path: &str, duration: f64) -> VisualAsset {
        VisualAsset::clip(path, duration, 1920, 1080)
    }

    #[test]
    fn test_plan_fit_landscape() {
        let fit = plan_fit(1920, 1080, CanvasSize::default());
        assert_eq!(fit.scaled_height, 1920);
        assert_eq!(fit.scaled_width, 3413);
        assert_eq!(fit.crop_x, (3413 - 1080) / 2);
        assert_eq!(fit.crop_y, 0);
    }

    #[test]
    fn test_plan_fit_narrow_is_width_matched() {
        // narrower than 9:16: width match, vertical crop, never letterboxed
        let fit = plan_fit(500, 1000, CanvasSize::default());
        assert_eq!(fit.scaled_width, 1080);
        assert_eq!(fit.scaled_height, 2160);
        assert_eq!(fit.crop_y, 120);
    }

    #[test]
    fn test_plan_transform_loop_counts() {
        let zoom = ZoomPolicy::default();
        let canvas = CanvasSize::default();
        let t = plan_transform(&clip("a.mp4", 5.0), 7.05, canvas, &zoom);
        assert_eq!(t.playback, Playback::Loop { extra_loops: 1 });
        let t = plan_transform(&clip("a.mp4", 5.0), 10.0, canvas, &zoom);
        assert_eq!(t.playback, Playback::Loop { extra_loops: 1 });
        let t = plan_transform(&clip("a.mp4", 5.0), 10.5, canvas, &zoom);
        assert_eq!(t.playback, Playback::Loop { extra_loops: 2 });
        let t = plan_transform(&clip("a.mp4", 8.0), 7.05, canvas, &zoom);
        assert_eq!(t.playback, Playback::Trim);
    }

    #[test]
    fn test_loop_command() {
        let asset = clip("in.mp4", 5.0);
        let request = NormalizeRequest {
            transform: plan_transform(&asset, 7.05, CanvasSize::default(), &ZoomPolicy::default()),
            asset,
            duration: 7.05,
            output: PathBuf::from("out.mp4"),
        };
        let args = FfmpegNormalizer::default().build_command(&request).build_args();

        let loop_pos = args.iter().position(|a| a == "-stream_loop").unwrap();
        assert_eq!(args[loop_pos + 1], "1");
        assert!(args.contains(&"-an".to_string()));
        let t_pos = args.iter().position(|a| a == "-t").unwrap();
        assert_eq!(args[t_pos + 1], "7.050");
        assert!(args.iter().any(|a| a.contains("crop=1080:1920")));
    }

    #[test]
    fn test_zoom_command() {
        let asset = VisualAsset::image("still.png", 1080, 1920);
        let request = NormalizeRequest {
            transform: plan_transform(&asset, 5.0, CanvasSize::default(), &ZoomPolicy::default()),
            asset,
            duration: 5.0,
            output: PathBuf::from("out.mp4"),
        };
        let args = FfmpegNormalizer::default().build_command(&request).build_args();
        let filter = args.iter().find(|a| a.contains("zoompan")).unwrap();
        assert!(filter.contains("d=120"));
        assert!(!args.contains(&"-stream_loop".to_string()));
    }

    #[tokio::test]
    async fn test_missing_file_is_asset_error() {
        let err = FfmpegNormalizer::default()
            .normalize_asset(&clip("/nonexistent/a.mp4", 5.0), 3.0, &ZoomPolicy::default(), "/tmp/out.mp4")
            .await
            .unwrap_err();
        assert!(err.is_asset_level());
    }

    #[tokio::test]
    async fn test_batch_is_bounded_and_ordered() {
        let normalizer = FakeNormalizer::new(&["b.mp4"]);
        let requests: Vec<NormalizeRequest> = ["a.mp4", "b.mp4", "c.mp4", "d.mp4", "e.mp4"]
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let asset = clip(p, 10.0);
                NormalizeRequest {
                    transform: plan_transform(&asset, 2.0, CanvasSize::default(), &ZoomPolicy::default()),
                    asset,
                    duration: 2.0,
                    output: PathBuf::from(format!("out{}.mp4", i)),
                }
            })
            .collect();

        let results = normalize_batch(&normalizer, &requests, 2).await;

        assert_eq!(results.len(), 5);
        assert!(results[1].is_err());
        assert_eq!(results[4].as_ref().unwrap().path, PathBuf::from("out4.mp4"));
        assert!(normalizer.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_failed_segment_is_absorbed_and_neighbour_redone() {
        let scenes = vec![
            VisualScene::new(0, vec![clip("a.mp4", 20.0)]),
            VisualScene::new(1, vec![clip("b.mp4", 20.0)]),
            VisualScene::new(2, vec![clip("c.mp4", 20.0)]),
        ];
        let mut timeline = TimelineBuilder::new(TimelineStrategy::Uniform)
            .build(30.0, Transcript::default(), &scenes)
            .unwrap();
        let normalizer = FakeNormalizer::new(&["b.mp4"]);

        let segments = normalize_timeline(&normalizer, &mut timeline, Path::new("/tmp/work"), 4)
            .await
            .unwrap();

        assert_eq!(segments.len(), 2);
        assert!((segments[0].duration - 20.0).abs() < 1e-9);
        assert!((segments.iter().map(|s| s.duration).sum::<f64>() - 30.0).abs() < 1e-9);
        assert!(timeline.is_contiguous(1e-9));
        // a.mp4 normalized twice: once at 10s, again at 20s
        let calls = normalizer.calls.lock().unwrap();
        assert_eq!(calls.iter().filter(|p| p.as_path() == Path::new("a.mp4")).count(), 2);
    }

    /// Fails every request as if FFmpeg were not installed.
    #[derive(Default)]
    struct NoFfmpeg {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SegmentNormalizer for NoFfmpeg {
        async fn normalize(&self, _request: &NormalizeRequest) -> MediaResult<NormalizedSegment> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(MediaError::FfmpegNotFound)
        }
    }

    #[tokio::test]
    async fn test_missing_ffmpeg_is_not_absorbed() {
        let scenes = vec![
            VisualScene::new(0, vec![clip("a.mp4", 20.0)]),
            VisualScene::new(1, vec![clip("b.mp4", 20.0)]),
        ];
        let mut timeline = TimelineBuilder::new(TimelineStrategy::Uniform)
            .build(20.0, Transcript::default(), &scenes)
            .unwrap();
        let normalizer = NoFfmpeg::default();

        let err = normalize_timeline(&normalizer, &mut timeline, Path::new("/tmp/work"), 2)
            .await
            .unwrap_err();

        assert!(matches!(err, MediaError::FfmpegNotFound));
        assert_eq!(normalizer.calls.load(Ordering::SeqCst), 2);
        assert_eq!(timeline.segments().len(), 2);
    }

    #[tokio::test]
    async fn test_everything_fails() {
        let scenes = vec![VisualScene::new(0, vec![clip("b.mp4", 20.0)])];
        let mut timeline = TimelineBuilder::new(TimelineStrategy::Uniform)
            .build(10.0, Transcript::default(), &scenes)
            .unwrap();
        let normalizer = FakeNormalizer::new(&["b.mp4"]);

        let err = normalize_timeline(&normalizer, &mut timeline, Path::new("/tmp/work"), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::Timeline(_)));
    }
}
