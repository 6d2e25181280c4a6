//! Wiring and the scheduling cycle.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use newsreel_media::{
    Compositor, Ffprobe, FfmpegCompositor, FfmpegNormalizer, MediaProbe, NormalizeSettings, RenderSettings,
    SegmentNormalizer, SpeechToText, TimelineBuilder, TranscriptAligner, WhisperCli, WhisperConfig,
};
use newsreel_models::{CanvasSize, CaptionStyle};
use newsreel_store::TaskBoard;

use crate::config::{HackerNewsConfig, OllamaConfig, PixabayConfig, TtsConfig, WorkerConfig};
use crate::download::{AssetFetcher, HttpFetcher};
use crate::error::WorkerResult;
use crate::metrics;
use crate::narrator::{EdgeTtsNarrator, Narrator};
use crate::news::{HackerNewsSource, NewsSource};
use crate::sources::{AssetSource, PixabayImageSource, PixabayVideoSource};
use crate::stages::{
    AssembleStage, IngestStage, ScriptStage, Stage, StageOutcome, VisualsStage, VoiceStage,
};
use crate::writer::{OllamaScriptWriter, ScriptWriter};

/// External services and tools the stages depend on.
#[derive(Clone)]
pub struct Collaborators {
    /// `None` disables ingestion
    pub news: Option<Arc<dyn NewsSource>>,
    pub writer: Arc<dyn ScriptWriter>,
    pub narrator: Arc<dyn Narrator>,
    pub sources: Vec<Arc<dyn AssetSource>>,
    pub fetcher: Arc<dyn AssetFetcher>,
    pub probe: Arc<dyn MediaProbe>,
    pub speech: Arc<dyn SpeechToText>,
    pub normalizer: Arc<dyn SegmentNormalizer>,
    pub compositor: Arc<dyn Compositor>,
    /// Output frame size shared by the timeline and the renderers
    pub canvas: CanvasSize,
}

impl Collaborators {
    /// Production collaborators configured from the environment.
    pub fn from_env(config: &WorkerConfig) -> WorkerResult<Self> {
        let render = RenderSettings::from_env();
        let normalize = NormalizeSettings {
            canvas: render.canvas,
            fps: render.fps,
            ..Default::default()
        };
        let probe: Arc<dyn MediaProbe> = Arc::new(Ffprobe);

        let pixabay = PixabayConfig::from_env()?;
        let mut sources: Vec<Arc<dyn AssetSource>> =
            vec![Arc::new(PixabayVideoSource::new(pixabay.clone()))];
        if pixabay.include_images {
            sources.push(Arc::new(PixabayImageSource::new(pixabay)));
        }

        let news: Option<Arc<dyn NewsSource>> = if config.ingest_enabled {
            Some(Arc::new(HackerNewsSource::new(HackerNewsConfig::from_env())))
        } else {
            None
        };

        Ok(Self {
            news,
            writer: Arc::new(OllamaScriptWriter::new(OllamaConfig::from_env())?),
            narrator: Arc::new(EdgeTtsNarrator::new(TtsConfig::from_env(), probe.clone())),
            sources,
            fetcher: Arc::new(HttpFetcher::default()),
            probe,
            speech: Arc::new(WhisperCli::new(WhisperConfig::from_env())),
            normalizer: Arc::new(FfmpegNormalizer::new(normalize)),
            canvas: render.canvas,
            compositor: Arc::new(FfmpegCompositor::new(render, caption_style(config))),
        })
    }
}

/// Caption style with the configured font, if any.
pub fn caption_style(config: &WorkerConfig) -> CaptionStyle {
    CaptionStyle {
        font_file: config.caption_font.clone(),
        ..Default::default()
    }
}

/// Tally of one cycle.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CycleReport {
    pub outcomes: Vec<(&'static str, StageOutcome)>,
    /// Stages that returned an error
    pub errors: Vec<&'static str>,
}

impl CycleReport {
    /// Whether any stage found work.
    pub fn did_work(&self) -> bool {
        self.outcomes.iter().any(|(_, o)| *o != StageOutcome::Idle)
    }
}

/// The ordered set of stages.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Self {
        Self { stages }
    }

    /// All five stages, wired to `board` and `collaborators`.
    pub fn standard(config: Arc<WorkerConfig>, board: TaskBoard, collaborators: Collaborators) -> Self {
        let mut stages: Vec<Box<dyn Stage>> = Vec::with_capacity(5);

        if let Some(news) = collaborators.news {
            stages.push(Box::new(IngestStage::new(board.clone(), news)));
        }
        stages.push(Box::new(ScriptStage::new(board.clone(), collaborators.writer)));
        stages.push(Box::new(VoiceStage::new(
            board.clone(),
            config.clone(),
            collaborators.narrator,
        )));
        stages.push(Box::new(VisualsStage::new(
            board.clone(),
            config.clone(),
            collaborators.sources,
            collaborators.fetcher,
            collaborators.probe,
        )));

        let builder = TimelineBuilder::new(config.timeline_strategy)
            .with_canvas(collaborators.canvas)
            .with_caption_style(caption_style(&config));
        stages.push(Box::new(AssembleStage::new(
            board,
            config,
            TranscriptAligner::new(collaborators.speech),
            builder,
            collaborators.normalizer,
            collaborators.compositor,
        )));

        Self::new(stages)
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage once, in order.
    ///
    /// A stage error is logged and counted; later stages still run.
    pub async fn run_cycle(&self) -> CycleReport {
        let mut report = CycleReport::default();

        for stage in &self.stages {
            let name = stage.name();
            match stage.run_once().await {
                Ok(outcome) => {
                    metrics::record_stage_run(name, outcome.as_str());
                    match outcome.task_id() {
                        Some(task_id) => info!(stage = name, task_id = %task_id, outcome = outcome.as_str(), "Stage finished"),
                        None => debug!(stage = name, "Nothing to do"),
                    }
                    report.outcomes.push((name, outcome));
                }
                Err(e) => {
                    metrics::record_stage_run(name, "error");
                    if e.is_retryable() {
                        warn!(stage = name, error = %e, "Stage error, will retry next cycle");
                    } else {
                        error!(stage = name, error = %e, "Stage error");
                    }
                    report.errors.push(name);
                }
            }
        }

        report
    }
}
