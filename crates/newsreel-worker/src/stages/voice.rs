use std::sync::Arc;

use async_trait::async_trait;
use tracing::Instrument;

use newsreel_models::{Narration, Task, TaskStatus};
use newsreel_store::TaskBoard;

use super::{settle_failure, Stage, StageOutcome};
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::TaskLogger;
use crate::narrator::Narrator;

const STAGE: &str = "voice";

/// `scripted -> voiced`: speak the script and record its duration.
pub struct VoiceStage {
    board: TaskBoard,
    config: Arc<WorkerConfig>,
    narrator: Arc<dyn Narrator>,
}

impl VoiceStage {
    pub fn new(board: TaskBoard, config: Arc<WorkerConfig>, narrator: Arc<dyn Narrator>) -> Self {
        Self {
            board,
            config,
            narrator,
        }
    }

    async fn narrate(&self, task: &Task) -> WorkerResult<Narration> {
        let script = task
            .script
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or(WorkerError::MissingInput("script"))?;

        let output = self
            .config
            .task_dir(task.id.as_str())
            .join("narration.mp3");
        self.narrator.narrate(script, &output).await
    }
}

#[async_trait]
impl Stage for VoiceStage {
    fn name(&self) -> &'static str {
        STAGE
    }

    async fn run_once(&self) -> WorkerResult<StageOutcome> {
        let Some(claimed) = self.board.claim(TaskStatus::Scripted, STAGE).await? else {
            return Ok(StageOutcome::Idle);
        };
        let logger = TaskLogger::new(claimed.id(), STAGE);
        let id = claimed.id().clone();
        logger.log_start(&claimed.task().title);

        let result = self
            .narrate(claimed.task())
            .instrument(logger.create_span())
            .await;
        match result {
            Ok(narration) => {
                logger.log_completion(&format!("{:.1}s of narration", narration.duration));
                self.board
                    .advance(claimed, |task| task.narration = Some(narration))
                    .await?;
                Ok(StageOutcome::Advanced(id))
            }
            Err(e) => settle_failure(&self.board, claimed, &logger, e).await,
        }
    }
}
