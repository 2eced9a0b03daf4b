//! Dispatch order handed to the dispatcher.

use crate::ids::{DistroId, PassId, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ordered task identities for one execution pool, most important first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchOrder {
    pub distro: DistroId,
    pub pass_id: PassId,
    pub task_ids: Vec<TaskId>,
    pub generated_at: DateTime<Utc>,
}

impl DispatchOrder {
    pub fn new(distro: DistroId, pass_id: PassId, task_ids: Vec<TaskId>) -> Self {
        Self {
            distro,
            pass_id,
            task_ids,
            generated_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.task_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.task_ids.is_empty()
    }

    /// Position of a task in the order.
    pub fn position(&self, task: &TaskId) -> Option<usize> {
        self.task_ids.iter().position(|t| t == task)
    }
}
