//! Task records and the pipeline lifecycle.
//!
//! A [`Task`] is one news item moving through the pipeline. Every stage
//! consumes tasks in exactly one [`TaskStatus`] and moves them to the
//! single successor returned by [`TaskStatus::next`], or to one of the
//! terminal states `failed`/`skipped`.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::scene::{Scene, VisualScene};

/// Unique identifier for a task.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    /// Generate a new random task ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Lifecycle status of a task.
///
/// The happy path is strictly linear:
/// `pending -> scripted -> voiced -> ready_to_assemble -> completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Scraped, waiting for a script
    #[default]
    Pending,
    /// Script and scenes written
    Scripted,
    /// Narration synthesized
    Voiced,
    /// Visual assets downloaded
    ReadyToAssemble,
    /// Final video rendered
    Completed,
    /// Unrecoverable error in some stage
    Failed,
    /// Deliberately dropped (nothing to work with)
    Skipped,
}

impl TaskStatus {
    pub const ALL: &'static [TaskStatus] = &[
        TaskStatus::Pending,
        TaskStatus::Scripted,
        TaskStatus::Voiced,
        TaskStatus::ReadyToAssemble,
        TaskStatus::Completed,
        TaskStatus::Failed,
        TaskStatus::Skipped,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Scripted => "scripted",
            TaskStatus::Voiced => "voiced",
            TaskStatus::ReadyToAssemble => "ready_to_assemble",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Skipped => "skipped",
        }
    }

    /// The single linear successor, if any.
    pub fn next(&self) -> Option<TaskStatus> {
        match self {
            TaskStatus::Pending => Some(TaskStatus::Scripted),
            TaskStatus::Scripted => Some(TaskStatus::Voiced),
            TaskStatus::Voiced => Some(TaskStatus::ReadyToAssemble),
            TaskStatus::ReadyToAssemble => Some(TaskStatus::Completed),
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Skipped => None,
        }
    }

    /// Check if this is a terminal state (no stage consumes it).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Skipped
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = TaskStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s.trim())
            .ok_or_else(|| TaskStatusParseError(s.to_string()))
    }
}

#[derive(Debug, Clone, Error)]
#[error("Unknown task status: {0}")]
pub struct TaskStatusParseError(String);

/// An in-flight claim held by one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TaskClaim {
    /// Random token identifying the claim holder
    pub token: String,
    /// Stage name that holds the claim
    pub stage: String,
    pub claimed_at: DateTime<Utc>,
}

impl TaskClaim {
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            token: Uuid::new_v4().to_string(),
            stage: stage.into(),
            claimed_at: Utc::now(),
        }
    }

    /// A claim older than `stale_before` may be taken over.
    pub fn is_stale(&self, stale_before: DateTime<Utc>) -> bool {
        self.claimed_at < stale_before
    }
}

/// Why a task ended up `failed` or `skipped`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TaskFailure {
    pub stage: String,
    pub reason: String,
    pub at: DateTime<Utc>,
}

/// Narration audio produced by the voice stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Narration {
    pub path: PathBuf,
    /// Duration in seconds
    pub duration: f64,
}

/// One content item moving through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    /// Raw source text the script is written from
    #[serde(default)]
    pub source_text: String,
    /// Where the item came from (e.g. `hacker_news`)
    #[serde(default)]
    pub source: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub script: Option<String>,
    #[serde(default)]
    pub scenes: Vec<Scene>,
    #[serde(default)]
    pub narration: Option<Narration>,
    #[serde(default)]
    pub visuals: Vec<VisualScene>,
    #[serde(default)]
    pub output_path: Option<PathBuf>,
    #[serde(default)]
    pub claim: Option<TaskClaim>,
    #[serde(default)]
    pub failure: Option<TaskFailure>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Monotonic write counter
    #[serde(default)]
    pub revision: u64,
}

impl Task {
    /// Create a new pending task.
    pub fn new(title: impl Into<String>, source_text: impl Into<String>, source: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: TaskId::new(),
            title: title.into(),
            source_text: source_text.into(),
            source: source.into(),
            status: TaskStatus::Pending,
            script: None,
            scenes: Vec::new(),
            narration: None,
            visuals: Vec::new(),
            output_path: None,
            claim: None,
            failure: None,
            created_at: now,
            updated_at: now,
            revision: 0,
        }
    }

    pub fn with_id(mut self, id: impl Into<TaskId>) -> Self {
        self.id = id.into();
        self
    }

    /// Whether a stage may claim this task right now.
    pub fn is_claimable(&self, status: TaskStatus, stale_before: DateTime<Utc>) -> bool {
        self.status == status
            && self
                .claim
                .as_ref()
                .map_or(true, |claim| claim.is_stale(stale_before))
    }

    /// Bump the revision and the update timestamp.
    pub fn touch(&mut self) {
        self.revision += 1;
        self.updated_at = Utc::now();
    }

    /// Sum of native durations of all gathered clips.
    pub fn footage_duration(&self) -> f64 {
        self.visuals
            .iter()
            .flat_map(|scene| scene.assets.iter())
            .map(|asset| asset.duration)
            .sum()
    }
}
