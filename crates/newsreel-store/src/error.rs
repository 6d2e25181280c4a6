//! Store error types.

use thiserror::Error;

use newsreel_models::{TaskId, TaskStatus};

use crate::firestore::FirestoreError;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A conditional write found the record no longer matching what the
    /// caller read. Another worker got there first.
    #[error("Task {task_id} is no longer {expected}")]
    StateConflict { task_id: TaskId, expected: TaskStatus },

    #[error("Task not found: {0}")]
    NotFound(TaskId),

    #[error("Task already exists: {0}")]
    AlreadyExists(TaskId),

    #[error("Task {0} has no next status")]
    NoSuccessor(TaskId),

    #[error("Firestore error: {0}")]
    Firestore(#[from] FirestoreError),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    pub fn state_conflict(task_id: &TaskId, expected: TaskStatus) -> Self {
        Self::StateConflict {
            task_id: task_id.clone(),
            expected,
        }
    }

    pub fn serialization(msg: impl ToString) -> Self {
        Self::Serialization(msg.to_string())
    }

    /// Lost a race; not a failure of the task itself.
    pub fn is_state_conflict(&self) -> bool {
        matches!(self, Self::StateConflict { .. })
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::StateConflict { .. } => true,
            Self::Firestore(e) => e.is_retryable(),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_conflict_message() {
        let err = StoreError::state_conflict(&TaskId::from("t1"), TaskStatus::Voiced);
        assert!(err.is_state_conflict());
        assert!(err.is_retryable());
        assert_eq!(err.to_string(), "Task t1 is no longer voiced");
    }

    #[test]
    fn test_not_found_is_final() {
        let err = StoreError::NotFound(TaskId::from("t1"));
        assert!(!err.is_state_conflict());
        assert!(!err.is_retryable());
    }
}
