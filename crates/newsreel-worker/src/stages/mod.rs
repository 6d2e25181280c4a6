//! Pipeline stages.
//!
//! Each stage claims at most one task in its input status, does its work,
//! and moves the task on: to the successor status on success, to `failed`
//! with a recorded reason when the work cannot be done, or to `skipped`
//! when there is nothing to do. Store failures release the claim instead,
//! leaving the task for a later cycle.

mod assemble;
mod ingest;
mod script;
mod visuals;
mod voice;

pub use assemble::AssembleStage;
pub use ingest::IngestStage;
pub use script::ScriptStage;
pub use visuals::VisualsStage;
pub use voice::VoiceStage;

use async_trait::async_trait;
use tracing::warn;

use newsreel_models::TaskId;
use newsreel_store::{ClaimedTask, TaskBoard};

use crate::error::{WorkerError, WorkerResult};
use crate::logging::TaskLogger;

/// What one stage run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// No task was waiting
    Idle,
    Advanced(TaskId),
    Failed(TaskId),
    Skipped(TaskId),
}

impl StageOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageOutcome::Idle => "idle",
            StageOutcome::Advanced(_) => "advanced",
            StageOutcome::Failed(_) => "failed",
            StageOutcome::Skipped(_) => "skipped",
        }
    }

    pub fn task_id(&self) -> Option<&TaskId> {
        match self {
            StageOutcome::Idle => None,
            StageOutcome::Advanced(id) | StageOutcome::Failed(id) | StageOutcome::Skipped(id) => Some(id),
        }
    }
}

/// One step of the pipeline.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run_once(&self) -> WorkerResult<StageOutcome>;
}

/// Settle a claimed task whose stage work returned `err`.
pub(crate) async fn settle_failure(
    board: &TaskBoard,
    claimed: ClaimedTask,
    logger: &TaskLogger,
    err: WorkerError,
) -> WorkerResult<StageOutcome> {
    if !err.is_fatal_to_task() {
        logger.log_warning(&format!("Releasing task: {}", err));
        if let Err(release_err) = board.release(claimed).await {
            warn!(task_id = %logger.task_id(), error = %release_err, "Failed to release claim");
        }
        return Err(err);
    }

    logger.log_error(&err.to_string());
    let id = claimed.id().clone();
    board.fail(claimed, err.to_string()).await?;
    Ok(StageOutcome::Failed(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use newsreel_models::{Task, TaskStatus};
    use newsreel_store::{MemoryTaskStore, StoreError, TaskStore};
    use std::sync::Arc;

    async fn claimed_board() -> (Arc<MemoryTaskStore>, TaskBoard, ClaimedTask) {
        let store = Arc::new(MemoryTaskStore::new());
        store.insert(&Task::new("Title", "text", "manual")).await.unwrap();
        let board = TaskBoard::new(store.clone());
        let claimed = board.claim(TaskStatus::Pending, "script").await.unwrap().unwrap();
        (store, board, claimed)
    }

    #[tokio::test]
    async fn test_fatal_error_fails_task() {
        let (store, board, claimed) = claimed_board().await;
        let logger = TaskLogger::new(claimed.id(), "script");
        let id = claimed.id().clone();

        let outcome = settle_failure(&board, claimed, &logger, WorkerError::script_failed("boom"))
            .await
            .unwrap();

        assert_eq!(outcome, StageOutcome::Failed(id.clone()));
        let task = store.get(&id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        let failure = task.failure.unwrap();
        assert_eq!(failure.stage, "script");
        assert!(failure.reason.contains("boom"));
    }

    #[tokio::test]
    async fn test_store_error_releases_task() {
        let (store, board, claimed) = claimed_board().await;
        let logger = TaskLogger::new(claimed.id(), "script");
        let id = claimed.id().clone();

        let err = WorkerError::Store(StoreError::NotFound(id.clone()));
        assert!(settle_failure(&board, claimed, &logger, err).await.is_err());

        let task = store.get(&id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.claim.is_none());
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(StageOutcome::Idle.as_str(), "idle");
        assert_eq!(StageOutcome::Idle.task_id(), None);
        let id = TaskId::from_string("t");
        assert_eq!(StageOutcome::Skipped(id.clone()).task_id(), Some(&id));
    }
}
