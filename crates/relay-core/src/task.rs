//! Task snapshot types consumed by the dispatch ranker.

use crate::ids::{BuildId, DistroId, TaskId, VersionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Origin class of the version a task belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Requester {
    /// Triggered by the repository tracker for a new commit.
    Commit,
    /// Submitted as a patch.
    Patch,
    #[default]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Undispatched,
    Dispatched,
    Started,
    Success,
    Failed,
}

impl TaskStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, TaskStatus::Failed)
    }
}

/// Read-only snapshot of a queued task, fetched fresh for every pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub distro: DistroId,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub num_dependents: u32,
    #[serde(default)]
    pub revision_order_number: u64,
    pub create_time: DateTime<Utc>,
    #[serde(default)]
    pub requester: Requester,
    pub project: String,
    pub revision: String,
    pub display_name: String,
    #[serde(default)]
    pub build_variant: String,
    /// Empty when the task is not part of a task group.
    #[serde(default)]
    pub task_group: String,
    pub build_id: BuildId,
    pub version: VersionId,
    #[serde(default)]
    pub generate_task: bool,
    #[serde(default)]
    pub status: TaskStatus,
}

impl Task {
    pub fn in_task_group(&self) -> bool {
        !self.task_group.is_empty()
    }

    pub fn is_commit(&self) -> bool {
        self.requester == Requester::Commit
    }

    /// Key that clusters task-group members: members of one group in one
    /// build share it. Compared lexicographically, build first.
    pub fn group_key(&self) -> (&str, &str) {
        (self.build_id.as_str(), self.task_group.as_str())
    }

    /// Key shared by tasks whose failures are correlated across variants.
    pub fn similarity_key(&self) -> SimilarityKey {
        SimilarityKey {
            revision: self.revision.clone(),
            project: self.project.clone(),
            display_name: self.display_name.clone(),
            requester: self.requester,
        }
    }
}

/// Most recent prior execution of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviousExecution {
    pub task_id: TaskId,
    pub status: TaskStatus,
    /// Zero means the duration was never measured.
    #[serde(default)]
    pub time_taken_ms: u64,
}

impl PreviousExecution {
    pub fn failed(&self) -> bool {
        self.status.is_failed()
    }

    /// Measured duration, `None` when unknown.
    pub fn time_taken(&self) -> Option<Duration> {
        (self.time_taken_ms > 0).then(|| Duration::from_millis(self.time_taken_ms))
    }
}

/// One failed task returned by the bulk failure aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedSibling {
    pub revision: String,
    pub project: String,
    pub display_name: String,
    pub requester: Requester,
    pub build_variant: String,
}

impl FailedSibling {
    pub fn similarity_key(&self) -> SimilarityKey {
        SimilarityKey {
            revision: self.revision.clone(),
            project: self.project.clone(),
            display_name: self.display_name.clone(),
            requester: self.requester,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SimilarityKey {
    pub revision: String,
    pub project: String,
    pub display_name: String,
    pub requester: Requester,
}

/// A task group declared by a version's project configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskGroupDefinition {
    pub name: String,
    /// Member display names in dispatch order.
    pub tasks: Vec<String>,
}

impl TaskGroupDefinition {
    pub fn new(name: impl Into<String>, tasks: &[&str]) -> Self {
        Self {
            name: name.into(),
            tasks: tasks.iter().map(|t| t.to_string()).collect(),
        }
    }

    /// Position of a member in the configured sequence.
    pub fn position(&self, display_name: &str) -> Option<usize> {
        self.tasks.iter().position(|t| t == display_name)
    }
}
