//! Per-pass caches consulted by the ranking rules.
//!
//! Every cache is built with one bulk call per collaborator, is never
//! mutated afterwards and is dropped at the end of the pass.

use futures::future::try_join_all;
use relay_core::ids::{TaskId, VersionId};
use relay_core::ports::{ProjectConfigSource, TaskSnapshotStore};
use relay_core::task::{PreviousExecution, SimilarityKey, Task, TaskGroupDefinition};
use relay_core::{Error, Result};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

use crate::comparator::ComparatorError;

/// Most recent prior execution per task.
#[derive(Debug, Clone, Default)]
pub struct ExecutionHistoryCache {
    entries: HashMap<TaskId, PreviousExecution>,
}

impl ExecutionHistoryCache {
    pub fn from_executions(executions: impl IntoIterator<Item = PreviousExecution>) -> Self {
        Self {
            entries: executions
                .into_iter()
                .map(|prev| (prev.task_id.clone(), prev))
                .collect(),
        }
    }

    /// Build the cache with one bulk query for every task in the pass.
    /// Tasks without history get no entry; no per-task fallback query is made.
    pub async fn build(store: &dyn TaskSnapshotStore, tasks: &[Task]) -> Result<Self> {
        let ids: Vec<TaskId> = tasks.iter().map(|t| t.id.clone()).collect();
        let executions = store
            .previous_executions(&ids)
            .await
            .map_err(|e| Error::CacheConstruction {
                cache: "execution history cache",
                reason: e.to_string(),
            })?;

        let cache = Self::from_executions(executions);
        debug!("Cached {} previous executions for {} tasks", cache.len(), ids.len());
        Ok(cache)
    }

    pub fn get(&self, task: &TaskId) -> Option<&PreviousExecution> {
        self.entries.get(task)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Number of failed siblings per task: same revision, project, display
/// name and requester, in a different build variant.
#[derive(Debug, Clone, Default)]
pub struct FailureCorrelationIndex {
    counts: HashMap<TaskId, u32>,
}

impl FailureCorrelationIndex {
    pub fn from_counts(counts: impl IntoIterator<Item = (TaskId, u32)>) -> Self {
        Self {
            counts: counts.into_iter().collect(),
        }
    }

    /// Build the index with one bulk aggregation over the distinct
    /// revisions of the pass. Every task of the pass gets an entry.
    pub async fn build(store: &dyn TaskSnapshotStore, tasks: &[Task]) -> Result<Self> {
        let revisions: Vec<String> = tasks
            .iter()
            .map(|t| t.revision.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let siblings = store
            .failed_siblings(&revisions)
            .await
            .map_err(|e| Error::CacheConstruction {
                cache: "failure correlation index",
                reason: e.to_string(),
            })?;

        let mut variants_by_key: HashMap<SimilarityKey, Vec<String>> = HashMap::new();
        for sibling in siblings {
            variants_by_key
                .entry(sibling.similarity_key())
                .or_default()
                .push(sibling.build_variant);
        }

        let counts = tasks.iter().map(|task| {
            let count = variants_by_key
                .get(&task.similarity_key())
                .map(|variants| {
                    variants
                        .iter()
                        .filter(|v| **v != task.build_variant)
                        .count() as u32
                })
                .unwrap_or(0);
            (task.id.clone(), count)
        });

        let index = Self::from_counts(counts);
        debug!(
            "Indexed similar failures for {} tasks across {} revisions",
            index.len(),
            revisions.len()
        );
        Ok(index)
    }

    pub fn get(&self, task: &TaskId) -> Option<u32> {
        self.counts.get(task).copied()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// Task-group definitions per version.
#[derive(Debug, Clone, Default)]
pub struct TaskGroupIndex {
    groups: HashMap<VersionId, Vec<TaskGroupDefinition>>,
}

impl TaskGroupIndex {
    pub fn from_definitions(
        definitions: impl IntoIterator<Item = (VersionId, Vec<TaskGroupDefinition>)>,
    ) -> Self {
        Self {
            groups: definitions.into_iter().collect(),
        }
    }

    /// Resolve the project configuration of every distinct version in the
    /// pass. A version that cannot be resolved fails the build.
    pub async fn build(configs: &dyn ProjectConfigSource, tasks: &[Task]) -> Result<Self> {
        let versions: BTreeSet<&VersionId> = tasks.iter().map(|t| &t.version).collect();

        let resolved = try_join_all(versions.into_iter().map(|version| async move {
            match configs.task_groups(version).await {
                Ok(Some(groups)) => Ok((version.clone(), groups)),
                Ok(None) => Err(Error::ProjectConfig {
                    version: version.to_string(),
                    reason: "version not found".to_string(),
                }),
                Err(e @ Error::ProjectConfig { .. }) => Err(e),
                Err(e) => Err(Error::ProjectConfig {
                    version: version.to_string(),
                    reason: e.to_string(),
                }),
            }
        }))
        .await?;

        Ok(Self::from_definitions(resolved))
    }

    pub fn group(&self, version: &VersionId, name: &str) -> Option<&TaskGroupDefinition> {
        self.groups
            .get(version)
            .and_then(|groups| groups.iter().find(|g| g.name == name))
    }

    /// Position of a grouped task in its group's configured sequence.
    pub fn position(&self, task: &Task) -> std::result::Result<usize, ComparatorError> {
        let group = self.group(&task.version, &task.task_group).ok_or_else(|| {
            ComparatorError::UnknownTaskGroup {
                task: task.id.clone(),
                group: task.task_group.clone(),
                version: task.version.clone(),
            }
        })?;

        group
            .position(&task.display_name)
            .ok_or_else(|| ComparatorError::TaskGroupMember {
                task: task.id.clone(),
                group: task.task_group.clone(),
                display_name: task.display_name.clone(),
            })
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Immutable view over the caches of one pass.
#[derive(Debug, Clone, Default)]
pub struct RankingContext {
    pub history: ExecutionHistoryCache,
    pub failures: FailureCorrelationIndex,
    pub groups: TaskGroupIndex,
}

impl RankingContext {
    pub fn new(
        history: ExecutionHistoryCache,
        failures: FailureCorrelationIndex,
        groups: TaskGroupIndex,
    ) -> Self {
        Self {
            history,
            failures,
            groups,
        }
    }
}
