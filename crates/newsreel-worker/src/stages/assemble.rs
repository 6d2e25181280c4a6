use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::Instrument;

use newsreel_media::{
    normalize_timeline, Compositor, MediaError, MusicBed, RenderJob, RenderOutput, SegmentNormalizer,
    TimelineBuilder, TimelineError, TranscriptAligner,
};
use newsreel_models::{Task, TaskStatus, VisualScene};
use newsreel_store::TaskBoard;

use super::{settle_failure, Stage, StageOutcome};
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::TaskLogger;

const STAGE: &str = "assemble";

/// `ready_to_assemble -> completed`: align, lay out, normalize and render.
pub struct AssembleStage {
    board: TaskBoard,
    config: Arc<WorkerConfig>,
    aligner: TranscriptAligner,
    builder: TimelineBuilder,
    normalizer: Arc<dyn SegmentNormalizer>,
    compositor: Arc<dyn Compositor>,
}

impl AssembleStage {
    pub fn new(
        board: TaskBoard,
        config: Arc<WorkerConfig>,
        aligner: TranscriptAligner,
        builder: TimelineBuilder,
        normalizer: Arc<dyn SegmentNormalizer>,
        compositor: Arc<dyn Compositor>,
    ) -> Self {
        Self {
            board,
            config,
            aligner,
            builder,
            normalizer,
            compositor,
        }
    }

    /// Background music, when configured and present on disk.
    fn music_bed(&self) -> Option<MusicBed> {
        self.config
            .music_path
            .as_ref()
            .filter(|path| path.exists())
            .map(|path| MusicBed {
                path: path.clone(),
                gain: self.config.music_gain,
            })
    }

    async fn assemble(&self, task: &Task, logger: &TaskLogger) -> WorkerResult<RenderOutput> {
        let narration = task.narration.as_ref().ok_or(WorkerError::MissingInput("narration"))?;

        let visuals = present_visuals(&task.visuals, logger);
        if visuals.iter().all(VisualScene::is_exhausted) {
            return Err(WorkerError::AllScenesExhausted);
        }

        let transcript = self.aligner.align(&narration.path).await?;
        let mut timeline = self
            .builder
            .build(narration.duration, transcript, &visuals)
            .map_err(|e| match e {
                TimelineError::NoVisuals => WorkerError::AllScenesExhausted,
                other => WorkerError::Media(other.into()),
            })?;
        logger.log_progress(&format!(
            "{} segments, {} captions ({})",
            timeline.segments().len(),
            timeline.captions().len(),
            self.builder.strategy()
        ));

        let segment_dir = self.config.task_dir(task.id.as_str()).join("segments");
        tokio::fs::create_dir_all(&segment_dir).await?;
        let started = Instant::now();
        let segments = normalize_timeline(
            self.normalizer.as_ref(),
            &mut timeline,
            &segment_dir,
            self.config.max_normalize_parallel,
        )
        .await
        .map_err(|e| match e {
            MediaError::Timeline(TimelineError::NoVisuals) => WorkerError::AllScenesExhausted,
            other => other.into(),
        })?;
        logger.log_progress(&format!(
            "Normalized {} segments in {:.1}s",
            segments.len(),
            started.elapsed().as_secs_f64()
        ));

        let output = self.config.output_path(task.id.as_str());
        tokio::fs::create_dir_all(&self.config.output_dir).await?;

        let job = RenderJob {
            segments,
            captions: timeline.captions().to_vec(),
            narration: narration.path.clone(),
            music: self.music_bed(),
            total_duration: timeline.total_duration(),
            output,
        };
        Ok(self.compositor.render(&job).await?)
    }
}

/// Drop assets whose files disappeared since the visuals stage.
fn present_visuals(visuals: &[VisualScene], logger: &TaskLogger) -> Vec<VisualScene> {
    visuals
        .iter()
        .map(|scene| {
            let (present, missing): (Vec<_>, Vec<_>) =
                scene.assets.iter().cloned().partition(|asset| asset.path.exists());
            for asset in &missing {
                logger.log_warning(&format!(
                    "Scene {}: {} is gone, dropping it",
                    scene.scene_index,
                    asset.path.display()
                ));
            }
            VisualScene::new(scene.scene_index, present)
        })
        .collect()
}

#[async_trait]
impl Stage for AssembleStage {
    fn name(&self) -> &'static str {
        STAGE
    }

    async fn run_once(&self) -> WorkerResult<StageOutcome> {
        let Some(claimed) = self.board.claim(TaskStatus::ReadyToAssemble, STAGE).await? else {
            return Ok(StageOutcome::Idle);
        };
        let logger = TaskLogger::new(claimed.id(), STAGE);
        let id = claimed.id().clone();
        logger.log_start(&claimed.task().title);

        let result = self
            .assemble(claimed.task(), &logger)
            .instrument(logger.create_span())
            .await;
        match result {
            Ok(rendered) => {
                logger.log_completion(&format!(
                    "{} ({:.1}s, {} bytes)",
                    rendered.path.display(),
                    rendered.duration,
                    rendered.size_bytes
                ));
                self.board
                    .advance(claimed, |task| task.output_path = Some(rendered.path))
                    .await?;
                Ok(StageOutcome::Advanced(id))
            }
            Err(e) => settle_failure(&self.board, claimed, &logger, e).await,
        }
    }
}
