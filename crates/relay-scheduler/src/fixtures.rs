//! Test fixtures for building task snapshots.

use chrono::{DateTime, Utc};
use relay_core::ids::{BuildId, DistroId, TaskId, VersionId};
use relay_core::task::{Requester, Task, TaskStatus};

/// 2024-01-01T00:00:00Z, shared by every fixture task unless overridden.
const FIXTURE_EPOCH_SECS: i64 = 1_704_067_200;

/// Builder for task snapshots with neutral defaults: every ranking rule
/// ties between two default tasks.
#[derive(Debug, Clone)]
pub struct TaskBuilder {
    task: Task,
}

impl TaskBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            task: Task {
                id: TaskId::from(id),
                distro: DistroId::from("ubuntu2204"),
                priority: 0,
                num_dependents: 0,
                revision_order_number: 1,
                create_time: DateTime::from_timestamp(FIXTURE_EPOCH_SECS, 0).unwrap_or_default(),
                requester: Requester::Other,
                project: "mongo".to_string(),
                revision: "r1".to_string(),
                display_name: id.to_string(),
                build_variant: "linux".to_string(),
                task_group: String::new(),
                build_id: BuildId::from("b1"),
                version: VersionId::from("v1"),
                generate_task: false,
                status: TaskStatus::Undispatched,
            },
        }
    }

    pub fn distro(mut self, distro: &str) -> Self {
        self.task.distro = DistroId::from(distro);
        self
    }

    pub fn priority(mut self, priority: i64) -> Self {
        self.task.priority = priority;
        self
    }

    pub fn dependents(mut self, count: u32) -> Self {
        self.task.num_dependents = count;
        self
    }

    pub fn revision_order(mut self, order: u64) -> Self {
        self.task.revision_order_number = order;
        self
    }

    pub fn created_at(mut self, time: DateTime<Utc>) -> Self {
        self.task.create_time = time;
        self
    }

    pub fn requester(mut self, requester: Requester) -> Self {
        self.task.requester = requester;
        self
    }

    pub fn project(mut self, project: &str) -> Self {
        self.task.project = project.to_string();
        self
    }

    pub fn revision(mut self, revision: &str) -> Self {
        self.task.revision = revision.to_string();
        self
    }

    pub fn display_name(mut self, name: &str) -> Self {
        self.task.display_name = name.to_string();
        self
    }

    pub fn build_variant(mut self, variant: &str) -> Self {
        self.task.build_variant = variant.to_string();
        self
    }

    pub fn group(mut self, group: &str) -> Self {
        self.task.task_group = group.to_string();
        self
    }

    pub fn build_id(mut self, build: &str) -> Self {
        self.task.build_id = BuildId::from(build);
        self
    }

    pub fn version(mut self, version: &str) -> Self {
        self.task.version = VersionId::from(version);
        self
    }

    pub fn generate_task(mut self, generates: bool) -> Self {
        self.task.generate_task = generates;
        self
    }

    pub fn build(self) -> Task {
        self.task
    }
}
