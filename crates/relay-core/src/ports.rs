//! Port traits (hexagonal architecture).
//!
//! These traits define the interfaces between the dispatch ranker and the
//! collaborators that own tasks, project configuration and host assignment.

use crate::Result;
use crate::dispatch::DispatchOrder;
use crate::ids::*;
use crate::task::{FailedSibling, PreviousExecution, Task, TaskGroupDefinition};
use async_trait::async_trait;

/// Read-only access to queued tasks and their execution history.
#[async_trait]
pub trait TaskSnapshotStore: Send + Sync {
    /// Snapshot of the queued, runnable tasks of one execution pool.
    async fn queued_tasks(&self, distro: &DistroId) -> Result<Vec<Task>>;

    /// Most recent prior execution for each task, in one bulk query.
    /// Tasks without history are simply absent from the result.
    async fn previous_executions(&self, tasks: &[TaskId]) -> Result<Vec<PreviousExecution>>;

    /// Failed tasks of the given revisions, in one bulk aggregation.
    async fn failed_siblings(&self, revisions: &[String]) -> Result<Vec<FailedSibling>>;
}

/// Resolves project configuration for a version.
#[async_trait]
pub trait ProjectConfigSource: Send + Sync {
    /// Task groups declared by the version's project configuration.
    /// `None` when the version cannot be resolved.
    async fn task_groups(&self, version: &VersionId) -> Result<Option<Vec<TaskGroupDefinition>>>;
}

/// Receives dispatch orders. Position is priority only; host assignment
/// happens elsewhere.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn publish(&self, order: &DispatchOrder) -> Result<()>;
}
