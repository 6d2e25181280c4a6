//! Structured task logging utilities.
//!
//! Every line carries the task id and the stage that emitted it, so a
//! failure report can always be traced back to where it happened.

use tracing::{error, info, warn, Span};

use newsreel_models::TaskId;

/// Logger bound to one task and one stage.
#[derive(Debug, Clone)]
pub struct TaskLogger {
    task_id: String,
    stage: String,
}

impl TaskLogger {
    pub fn new(task_id: &TaskId, stage: &str) -> Self {
        Self {
            task_id: task_id.to_string(),
            stage: stage.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            task_id = %self.task_id,
            stage = %self.stage,
            "Stage started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            task_id = %self.task_id,
            stage = %self.stage,
            "Stage progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            task_id = %self.task_id,
            stage = %self.stage,
            "Stage warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            task_id = %self.task_id,
            stage = %self.stage,
            "Stage error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            task_id = %self.task_id,
            stage = %self.stage,
            "Stage completed: {}", message
        );
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// Span for attaching further structured fields.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("task", task_id = %self.task_id, stage = %self.stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_logger_creation() {
        let task_id = TaskId::from_string("task-123");
        let logger = TaskLogger::new(&task_id, "visuals");

        assert_eq!(logger.task_id(), "task-123");
        assert_eq!(logger.stage(), "visuals");
    }

    #[test]
    fn test_span_carries_task_fields() {
        let _guard = tracing::subscriber::set_default(tracing_subscriber::registry());
        let logger = TaskLogger::new(&TaskId::from_string("task-9"), "assemble");

        let span = logger.create_span();
        let metadata = span.metadata().unwrap();
        assert_eq!(metadata.name(), "task");
        assert!(metadata.fields().field("task_id").is_some());
        assert!(metadata.fields().field("stage").is_some());
    }
}
