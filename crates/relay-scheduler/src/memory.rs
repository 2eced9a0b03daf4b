//! In-memory port adapters, used by the CLI and tests.

use async_trait::async_trait;
use relay_core::dispatch::DispatchOrder;
use relay_core::ids::{DistroId, TaskId, VersionId};
use relay_core::ports::{Dispatcher, ProjectConfigSource, TaskSnapshotStore};
use relay_core::task::{FailedSibling, PreviousExecution, Task, TaskGroupDefinition};
use relay_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

/// Everything a ranking pass reads, in one serializable document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub history: Vec<PreviousExecution>,
    #[serde(default)]
    pub failed_siblings: Vec<FailedSibling>,
    #[serde(default)]
    pub task_groups: HashMap<VersionId, Vec<TaskGroupDefinition>>,
}

impl Snapshot {
    /// Load a snapshot from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn into_adapters(self) -> (InMemoryTaskStore, InMemoryProjectConfigs) {
        let store = InMemoryTaskStore::new(self.tasks)
            .with_history(self.history)
            .with_failed_siblings(self.failed_siblings);
        let configs = InMemoryProjectConfigs {
            groups: self.task_groups,
            latency: None,
        };
        (store, configs)
    }
}

/// Task store over fixed vectors. Counts bulk queries so tests can check
/// that caches never fall back to per-task lookups.
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    tasks: Vec<Task>,
    history: Vec<PreviousExecution>,
    failed_siblings: Vec<FailedSibling>,
    latency: Option<Duration>,
    history_error: Option<String>,
    queued_queries: AtomicUsize,
    history_queries: AtomicUsize,
    failure_queries: AtomicUsize,
}

impl InMemoryTaskStore {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self {
            tasks,
            ..Default::default()
        }
    }

    pub fn with_history(mut self, history: Vec<PreviousExecution>) -> Self {
        self.history = history;
        self
    }

    pub fn with_failed_siblings(mut self, siblings: Vec<FailedSibling>) -> Self {
        self.failed_siblings = siblings;
        self
    }

    /// Delay every bulk history and failure query.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make the execution history query fail.
    pub fn with_history_error(mut self, reason: impl Into<String>) -> Self {
        self.history_error = Some(reason.into());
        self
    }

    pub fn queued_queries(&self) -> usize {
        self.queued_queries.load(Ordering::Relaxed)
    }

    pub fn history_queries(&self) -> usize {
        self.history_queries.load(Ordering::Relaxed)
    }

    pub fn failure_queries(&self) -> usize {
        self.failure_queries.load(Ordering::Relaxed)
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl TaskSnapshotStore for InMemoryTaskStore {
    async fn queued_tasks(&self, distro: &DistroId) -> Result<Vec<Task>> {
        self.queued_queries.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .tasks
            .iter()
            .filter(|t| &t.distro == distro)
            .cloned()
            .collect())
    }

    async fn previous_executions(&self, tasks: &[TaskId]) -> Result<Vec<PreviousExecution>> {
        self.history_queries.fetch_add(1, Ordering::Relaxed);
        self.delay().await;
        if let Some(reason) = &self.history_error {
            return Err(Error::Store(reason.clone()));
        }

        let wanted: HashSet<&TaskId> = tasks.iter().collect();
        Ok(self
            .history
            .iter()
            .filter(|prev| wanted.contains(&prev.task_id))
            .cloned()
            .collect())
    }

    async fn failed_siblings(&self, revisions: &[String]) -> Result<Vec<FailedSibling>> {
        self.failure_queries.fetch_add(1, Ordering::Relaxed);
        self.delay().await;

        Ok(self
            .failed_siblings
            .iter()
            .filter(|s| revisions.contains(&s.revision))
            .cloned()
            .collect())
    }
}

/// Project configuration keyed by version.
#[derive(Debug, Default)]
pub struct InMemoryProjectConfigs {
    groups: HashMap<VersionId, Vec<TaskGroupDefinition>>,
    latency: Option<Duration>,
}

impl InMemoryProjectConfigs {
    pub fn with_groups(mut self, version: &str, groups: Vec<TaskGroupDefinition>) -> Self {
        self.groups.insert(VersionId::from(version), groups);
        self
    }

    /// Declare a version with no task groups.
    pub fn with_version(self, version: &str) -> Self {
        self.with_groups(version, vec![])
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }
}

#[async_trait]
impl ProjectConfigSource for InMemoryProjectConfigs {
    async fn task_groups(&self, version: &VersionId) -> Result<Option<Vec<TaskGroupDefinition>>> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        Ok(self.groups.get(version).cloned())
    }
}

/// Dispatcher that keeps every published order.
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    published: Mutex<Vec<DispatchOrder>>,
    fail: bool,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatcher that rejects every order.
    pub fn failing() -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub async fn published(&self) -> Vec<DispatchOrder> {
        self.published.lock().await.clone()
    }
}

#[async_trait]
impl Dispatcher for RecordingDispatcher {
    async fn publish(&self, order: &DispatchOrder) -> Result<()> {
        if self.fail {
            return Err(Error::Dispatch(format!(
                "dispatcher rejected order for {}",
                order.distro
            )));
        }
        self.published.lock().await.push(order.clone());
        Ok(())
    }
}
