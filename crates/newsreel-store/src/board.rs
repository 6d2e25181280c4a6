//! Claim-based task state machine.
//!
//! Every stage follows the same protocol:
//!
//! 1. [`TaskBoard::claim`] the oldest task in the status the stage consumes.
//!    The status is left unchanged; only a claim token is recorded, so no
//!    other stage instance picks the same task.
//! 2. Do the work.
//! 3. [`TaskBoard::advance`] to the single successor status with the
//!    stage's payload, or [`TaskBoard::fail`] / [`TaskBoard::skip`] it, or
//!    [`TaskBoard::release`] it for a later run.
//!
//! Each step is one conditional write through [`TaskStore::replace_if`].
//! A claim left behind by a crashed worker can be taken over once it is
//! older than the claim timeout.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use newsreel_models::{Task, TaskClaim, TaskFailure, TaskId, TaskStatus};

use crate::error::{StoreError, StoreResult};
use crate::store::TaskStore;

/// Claims older than this may be taken over.
pub const DEFAULT_CLAIM_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Lost races tolerated before `claim` reports no work.
const CLAIM_ATTEMPTS: usize = 3;

/// A task held by one stage.
#[derive(Debug, Clone)]
pub struct ClaimedTask {
    task: Task,
    stage: String,
}

impl ClaimedTask {
    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn id(&self) -> &TaskId {
        &self.task.id
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    pub fn status(&self) -> TaskStatus {
        self.task.status
    }
}

/// State transitions over any [`TaskStore`].
#[derive(Clone)]
pub struct TaskBoard {
    store: Arc<dyn TaskStore>,
    claim_timeout: Duration,
}

impl TaskBoard {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self {
            store,
            claim_timeout: DEFAULT_CLAIM_TIMEOUT,
        }
    }

    pub fn with_claim_timeout(mut self, timeout: Duration) -> Self {
        self.claim_timeout = timeout;
        self
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }

    /// Claim one task in `status` for `stage`.
    ///
    /// `Ok(None)` means there is no work right now, which is not an error.
    pub async fn claim(&self, status: TaskStatus, stage: &str) -> StoreResult<Option<ClaimedTask>> {
        let timeout = chrono::Duration::from_std(self.claim_timeout)
            .unwrap_or_else(|_| chrono::Duration::minutes(30));

        for _ in 0..CLAIM_ATTEMPTS {
            let stale_before = Utc::now() - timeout;
            let Some(candidate) = self.store.find_claimable(status, stale_before).await? else {
                return Ok(None);
            };

            if let Some(previous) = &candidate.claim {
                warn!(
                    task_id = %candidate.id,
                    stage = %stage,
                    previous_stage = %previous.stage,
                    claimed_at = %previous.claimed_at,
                    "Taking over stale claim"
                );
            }

            let mut claimed = candidate.clone();
            claimed.claim = Some(TaskClaim::new(stage));
            claimed.touch();

            match self.store.replace_if(&candidate, &claimed).await {
                Ok(()) => {
                    debug!(task_id = %claimed.id, stage = %stage, status = %status, "Claimed task");
                    return Ok(Some(ClaimedTask {
                        task: claimed,
                        stage: stage.to_string(),
                    }));
                }
                Err(e) if e.is_state_conflict() => {
                    debug!(task_id = %candidate.id, stage = %stage, "Lost claim race, retrying");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(None)
    }

    /// Move a claimed task to its successor status.
    ///
    /// `mutate` records the stage's payload; status, claim and bookkeeping
    /// fields are set afterwards and cannot be overridden by it.
    pub async fn advance<F>(&self, claimed: ClaimedTask, mutate: F) -> StoreResult<Task>
    where
        F: FnOnce(&mut Task),
    {
        let next = claimed
            .task
            .status
            .next()
            .ok_or_else(|| StoreError::NoSuccessor(claimed.task.id.clone()))?;

        let mut updated = claimed.task.clone();
        mutate(&mut updated);
        updated.status = next;
        updated.claim = None;
        updated.failure = None;
        updated.touch();

        self.store.replace_if(&claimed.task, &updated).await?;
        info!(task_id = %updated.id, stage = %claimed.stage, status = %next, "Task advanced");
        Ok(updated)
    }

    /// Mark a claimed task `failed`, recording the stage and reason.
    pub async fn fail(&self, claimed: ClaimedTask, reason: impl Into<String>) -> StoreResult<Task> {
        self.finish(claimed, TaskStatus::Failed, reason.into()).await
    }

    /// Mark a claimed task `skipped`.
    pub async fn skip(&self, claimed: ClaimedTask, reason: impl Into<String>) -> StoreResult<Task> {
        self.finish(claimed, TaskStatus::Skipped, reason.into()).await
    }

    /// Drop the claim without changing anything else.
    pub async fn release(&self, claimed: ClaimedTask) -> StoreResult<()> {
        let mut updated = claimed.task.clone();
        updated.claim = None;
        updated.touch();
        self.store.replace_if(&claimed.task, &updated).await?;
        debug!(task_id = %updated.id, stage = %claimed.stage, "Claim released");
        Ok(())
    }

    async fn finish(&self, claimed: ClaimedTask, status: TaskStatus, reason: String) -> StoreResult<Task> {
        let mut updated = claimed.task.clone();
        updated.status = status;
        updated.claim = None;
        updated.failure = Some(TaskFailure {
            stage: claimed.stage.clone(),
            reason: reason.clone(),
            at: Utc::now(),
        });
        updated.touch();

        self.store.replace_if(&claimed.task, &updated).await?;
        warn!(
            task_id = %updated.id,
            stage = %claimed.stage,
            status = %status,
            reason = %reason,
            "Task left the pipeline"
        );
        Ok(updated)
    }
}
