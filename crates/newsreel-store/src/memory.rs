//! In-process task store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use newsreel_models::{Task, TaskId, TaskStatus};

use crate::error::{StoreError, StoreResult};
use crate::store::{same_version, TaskStore};

/// Task store kept in a map behind an async lock.
///
/// The write lock makes `replace_if` atomic with respect to every other
/// operation on the same store.
#[derive(Debug, Default)]
pub struct MemoryTaskStore {
    tasks: RwLock<BTreeMap<TaskId, Task>>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored task, oldest first.
    pub async fn all(&self) -> Vec<Task> {
        let tasks = self.tasks.read().await;
        let mut all: Vec<Task> = tasks.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        all
    }

    pub async fn count_in(&self, status: TaskStatus) -> usize {
        self.tasks
            .read()
            .await
            .values()
            .filter(|t| t.status == status)
            .count()
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn insert(&self, task: &Task) -> StoreResult<()> {
        let mut tasks = self.tasks.write().await;
        if tasks.contains_key(&task.id) {
            return Err(StoreError::AlreadyExists(task.id.clone()));
        }
        tasks.insert(task.id.clone(), task.clone());
        Ok(())
    }

    async fn get(&self, id: &TaskId) -> StoreResult<Option<Task>> {
        Ok(self.tasks.read().await.get(id).cloned())
    }

    async fn exists_with_title(&self, title: &str) -> StoreResult<bool> {
        Ok(self.tasks.read().await.values().any(|t| t.title == title))
    }

    async fn find_claimable(
        &self,
        status: TaskStatus,
        stale_before: DateTime<Utc>,
    ) -> StoreResult<Option<Task>> {
        let tasks = self.tasks.read().await;
        Ok(tasks
            .values()
            .filter(|t| t.is_claimable(status, stale_before))
            .min_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)))
            .cloned())
    }

    async fn replace_if(&self, expected: &Task, updated: &Task) -> StoreResult<()> {
        let mut tasks = self.tasks.write().await;
        let stored = tasks
            .get_mut(&expected.id)
            .ok_or_else(|| StoreError::NotFound(expected.id.clone()))?;

        if !same_version(stored, expected) {
            return Err(StoreError::state_conflict(&expected.id, expected.status));
        }

        *stored = updated.clone();
        Ok(())
    }
}
