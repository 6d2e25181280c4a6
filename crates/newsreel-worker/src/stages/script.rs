use std::sync::Arc;

use async_trait::async_trait;
use tracing::Instrument;

use newsreel_models::TaskStatus;
use newsreel_store::TaskBoard;

use super::{settle_failure, Stage, StageOutcome};
use crate::error::WorkerResult;
use crate::logging::TaskLogger;
use crate::writer::ScriptWriter;

const STAGE: &str = "script";

/// `pending -> scripted`: narration script and scene descriptions.
pub struct ScriptStage {
    board: TaskBoard,
    writer: Arc<dyn ScriptWriter>,
}

impl ScriptStage {
    pub fn new(board: TaskBoard, writer: Arc<dyn ScriptWriter>) -> Self {
        Self { board, writer }
    }
}

#[async_trait]
impl Stage for ScriptStage {
    fn name(&self) -> &'static str {
        STAGE
    }

    async fn run_once(&self) -> WorkerResult<StageOutcome> {
        let Some(claimed) = self.board.claim(TaskStatus::Pending, STAGE).await? else {
            return Ok(StageOutcome::Idle);
        };
        let logger = TaskLogger::new(claimed.id(), STAGE);
        let id = claimed.id().clone();

        if claimed.task().source_text.trim().is_empty() {
            logger.log_warning("No source text, skipping");
            self.board.skip(claimed, "empty source text").await?;
            return Ok(StageOutcome::Skipped(id));
        }

        logger.log_start(&claimed.task().title);
        let task = claimed.task();
        let result = self
            .writer
            .write(&task.title, &task.source_text)
            .instrument(logger.create_span())
            .await;
        match result {
            Ok(draft) => {
                logger.log_completion(&format!(
                    "{} words, {} scenes",
                    draft.script.split_whitespace().count(),
                    draft.scenes.len()
                ));
                self.board
                    .advance(claimed, |task| {
                        task.script = Some(draft.script);
                        task.scenes = draft.scenes;
                    })
                    .await?;
                Ok(StageOutcome::Advanced(id))
            }
            Err(e) => settle_failure(&self.board, claimed, &logger, e).await,
        }
    }
}
