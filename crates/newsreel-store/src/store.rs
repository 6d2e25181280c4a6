//! The storage seam.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use newsreel_models::{Task, TaskId, TaskStatus};

use crate::error::StoreResult;

/// Persistence for task records.
///
/// Implementations only need one atomic primitive, [`TaskStore::replace_if`];
/// every state transition is built on it by [`crate::TaskBoard`].
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Store a new task. Fails with `AlreadyExists` on an id collision.
    async fn insert(&self, task: &Task) -> StoreResult<()>;

    async fn get(&self, id: &TaskId) -> StoreResult<Option<Task>>;

    /// Whether any task (in any status) has this exact title.
    async fn exists_with_title(&self, title: &str) -> StoreResult<bool>;

    /// The oldest task in `status` that is unclaimed or whose claim was
    /// taken before `stale_before`. `Ok(None)` when there is none.
    async fn find_claimable(
        &self,
        status: TaskStatus,
        stale_before: DateTime<Utc>,
    ) -> StoreResult<Option<Task>>;

    /// Overwrite `expected` with `updated`, but only if the stored record
    /// still has the status, claim token and revision of `expected`.
    /// Otherwise fails with `StateConflict` and writes nothing.
    async fn replace_if(&self, expected: &Task, updated: &Task) -> StoreResult<()>;
}

/// The fields a conditional write compares.
pub(crate) fn same_version(stored: &Task, expected: &Task) -> bool {
    stored.status == expected.status
        && stored.revision == expected.revision
        && stored.claim.as_ref().map(|c| c.token.as_str())
            == expected.claim.as_ref().map(|c| c.token.as_str())
}
