//! `voiced -> ready_to_assemble`: gather footage for every scene.
//!
//! Each scene searches its first few keywords across all asset sources.
//! Candidates from one search are merged in source order and one is drawn
//! with a seedable RNG, so a fixed `selection_seed` reproduces the same
//! picks for the same task. A scene whose downloads all fail is kept with
//! no assets; the timeline holds the previous visual over it. When the
//! footage gathered is shorter than the narration plus a margin, random
//! fallback terms are fetched as extra scenes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::Instrument;
use uuid::Uuid;

use newsreel_media::MediaProbe;
use newsreel_models::{Scene, Task, TaskId, TaskStatus, VisualAsset, VisualScene};
use newsreel_store::TaskBoard;

use super::{settle_failure, Stage, StageOutcome};
use crate::config::WorkerConfig;
use crate::download::AssetFetcher;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::TaskLogger;
use crate::metrics;
use crate::sources::{AssetCandidate, AssetSource};

const STAGE: &str = "visuals";

/// Footage credited to a still image when measuring coverage.
const IMAGE_FOOTAGE_SECS: f64 = 5.0;

pub struct VisualsStage {
    board: TaskBoard,
    config: Arc<WorkerConfig>,
    sources: Vec<Arc<dyn AssetSource>>,
    fetcher: Arc<dyn AssetFetcher>,
    probe: Arc<dyn MediaProbe>,
}

impl VisualsStage {
    pub fn new(
        board: TaskBoard,
        config: Arc<WorkerConfig>,
        sources: Vec<Arc<dyn AssetSource>>,
        fetcher: Arc<dyn AssetFetcher>,
        probe: Arc<dyn MediaProbe>,
    ) -> Self {
        Self {
            board,
            config,
            sources,
            fetcher,
            probe,
        }
    }

    fn rng_for(&self, task_id: &TaskId) -> StdRng {
        match self.config.selection_seed {
            Some(seed) => StdRng::seed_from_u64(seed ^ stable_hash(task_id.as_str())),
            None => StdRng::from_os_rng(),
        }
    }

    /// Search every source for `term`; results keep source order.
    async fn gather(&self, term: &str, logger: &TaskLogger) -> Vec<AssetCandidate> {
        let results: Vec<_> = stream::iter(self.sources.iter())
            .map(|source| async move { (source.name().to_string(), source.search(term).await) })
            .buffered(self.config.max_fetch_parallel.max(1))
            .collect::<Vec<_>>()
            .boxed()
            .await;

        let mut candidates = Vec::new();
        for (source, result) in results {
            match result {
                Ok(found) => candidates.extend(found),
                Err(e) => logger.log_warning(&format!("{} search for '{}' failed: {}", source, term, e)),
            }
        }
        candidates
    }

    /// Download and probe one candidate into `dir`.
    async fn acquire(&self, dir: &Path, label: &str, candidate: &AssetCandidate) -> WorkerResult<VisualAsset> {
        let id = Uuid::new_v4().simple().to_string();
        let dest: PathBuf = dir.join(format!("{}_{}.{}", label, &id[..8], candidate.extension()));

        let fetched = self.fetcher.fetch(&candidate.url, &dest).await;
        metrics::record_asset_fetch(&candidate.source, fetched.is_ok());
        fetched?;

        let asset = match self.probe.probe(&dest).await {
            Ok(info) => info.to_visual_asset(&dest),
            Err(e) => Err(e),
        };
        match asset {
            Ok(asset) => Ok(asset),
            Err(e) => {
                let _ = tokio::fs::remove_file(&dest).await;
                Err(WorkerError::asset(e))
            }
        }
    }

    /// Draw one candidate for `term` and bring it to disk.
    async fn pick(
        &self,
        term: &str,
        dir: &Path,
        label: &str,
        rng: &mut StdRng,
        logger: &TaskLogger,
    ) -> Option<WorkerResult<VisualAsset>> {
        let candidates = self.gather(term, logger).await;
        if candidates.is_empty() {
            return None;
        }
        let choice = &candidates[rng.random_range(0..candidates.len())];
        Some(self.acquire(dir, label, choice).await)
    }

    async fn collect_visuals(&self, task: &Task, logger: &TaskLogger) -> WorkerResult<Vec<VisualScene>> {
        let narration = task.narration.as_ref().ok_or(WorkerError::MissingInput("narration"))?;
        let dir = self.config.task_dir(task.id.as_str()).join("assets");
        let mut rng = self.rng_for(&task.id);

        let scenes = if task.scenes.is_empty() {
            logger.log_warning("No scenes, searching by title");
            vec![Scene::new(0, vec![task.title.clone()])]
        } else {
            task.scenes.clone()
        };

        let mut visuals = Vec::with_capacity(scenes.len());
        let mut footage = 0.0;

        for scene in &scenes {
            let label = format!("scene{:02}", scene.index);
            let mut assets = Vec::new();

            for term in scene.search_terms(self.config.keywords_per_scene) {
                match self.pick(&term, &dir, &label, &mut rng, logger).await {
                    Some(Ok(asset)) => {
                        footage += footage_secs(&asset);
                        assets.push(asset);
                    }
                    Some(Err(e)) => logger.log_warning(&format!("Scene {} '{}': {}", scene.index, term, e)),
                    None => logger.log_progress(&format!("Scene {} '{}': no results", scene.index, term)),
                }
            }

            if assets.is_empty() {
                let exhausted = WorkerError::SceneExhausted { scene: scene.index };
                logger.log_warning(&exhausted.to_string());
                metrics::record_scene_exhausted();
            }
            visuals.push(VisualScene::new(scene.index, assets));
        }

        let target = narration.duration + self.config.min_footage_margin_secs;
        let mut next_index = scenes.iter().map(|s| s.index + 1).max().unwrap_or(0);
        let mut attempts = 0;

        while footage < target
            && attempts < self.config.max_fallback_attempts
            && !self.config.fallback_terms.is_empty()
        {
            attempts += 1;
            let term = &self.config.fallback_terms[rng.random_range(0..self.config.fallback_terms.len())];
            let label = format!("fallback{:02}", next_index);

            match self.pick(term, &dir, &label, &mut rng, logger).await {
                Some(Ok(asset)) => {
                    logger.log_progress(&format!("Fallback '{}' added {:.1}s", term, asset.duration));
                    footage += footage_secs(&asset);
                    visuals.push(VisualScene::new(next_index, vec![asset]));
                    next_index += 1;
                }
                Some(Err(e)) => logger.log_warning(&format!("Fallback '{}': {}", term, e)),
                None => {
                    logger.log_warning(&format!("Fallback '{}' found nothing, giving up", term));
                    break;
                }
            }
        }

        if visuals.iter().all(VisualScene::is_exhausted) {
            return Err(WorkerError::AllScenesExhausted);
        }

        logger.log_progress(&format!(
            "{:.1}s of footage for {:.1}s of narration",
            footage, narration.duration
        ));
        Ok(visuals)
    }
}

fn footage_secs(asset: &VisualAsset) -> f64 {
    if asset.is_image() {
        IMAGE_FOOTAGE_SECS
    } else {
        asset.duration
    }
}

/// FNV-1a; stable across builds and platforms.
fn stable_hash(s: &str) -> u64 {
    s.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ byte as u64).wrapping_mul(0x0100_0000_01b3)
    })
}

#[async_trait]
impl Stage for VisualsStage {
    fn name(&self) -> &'static str {
        STAGE
    }

    async fn run_once(&self) -> WorkerResult<StageOutcome> {
        let Some(claimed) = self.board.claim(TaskStatus::Voiced, STAGE).await? else {
            return Ok(StageOutcome::Idle);
        };
        let logger = TaskLogger::new(claimed.id(), STAGE);
        let id = claimed.id().clone();
        logger.log_start(&format!("{} scenes", claimed.task().scenes.len()));

        let result = self
            .collect_visuals(claimed.task(), &logger)
            .instrument(logger.create_span())
            .await;
        match result {
            Ok(visuals) => {
                let usable = visuals.iter().filter(|v| !v.is_exhausted()).count();
                logger.log_completion(&format!("{} of {} scenes have footage", usable, visuals.len()));
                self.board.advance(claimed, |task| task.visuals = visuals).await?;
                Ok(StageOutcome::Advanced(id))
            }
            Err(e) => settle_failure(&self.board, claimed, &logger, e).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use newsreel_models::AssetKind;

    #[test]
    fn test_stable_hash() {
        assert_eq!(stable_hash(""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(stable_hash("task-1"), stable_hash("task-1"));
        assert_ne!(stable_hash("task-1"), stable_hash("task-2"));
    }

    #[test]
    fn test_footage_credit() {
        assert_eq!(footage_secs(&VisualAsset::clip("a.mp4", 7.5, 1280, 720)), 7.5);
        let image = VisualAsset::image("b.jpg", 1080, 1920);
        assert_eq!(image.kind, AssetKind::Image);
        assert_eq!(footage_secs(&image), IMAGE_FOOTAGE_SECS);
    }
}
