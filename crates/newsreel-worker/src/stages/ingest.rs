use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use newsreel_models::Task;
use newsreel_store::TaskBoard;

use super::{Stage, StageOutcome};
use crate::error::WorkerResult;
use crate::metrics;
use crate::news::NewsSource;

/// Creates one `pending` task from the first headline not seen before.
pub struct IngestStage {
    board: TaskBoard,
    source: Arc<dyn NewsSource>,
}

impl IngestStage {
    pub fn new(board: TaskBoard, source: Arc<dyn NewsSource>) -> Self {
        Self { board, source }
    }
}

#[async_trait]
impl Stage for IngestStage {
    fn name(&self) -> &'static str {
        "ingest"
    }

    async fn run_once(&self) -> WorkerResult<StageOutcome> {
        let store = self.board.store();

        for item in self.source.headlines().await? {
            if item.title.is_empty() || store.exists_with_title(&item.title).await? {
                debug!(title = %item.title, "Headline already ingested");
                continue;
            }

            let task = Task::new(item.title.clone(), item.source_text(), self.source.name());
            store.insert(&task).await?;
            metrics::record_ingested(self.source.name());
            info!(task_id = %task.id, source = %task.source, "Ingested: {}", task.title);
            return Ok(StageOutcome::Advanced(task.id));
        }

        Ok(StageOutcome::Idle)
    }
}
