//! Pre-sort clustering of task-group members.

use relay_core::task::Task;
use std::collections::BTreeMap;

/// Returns task indices with each (build, task group) cluster contiguous.
///
/// Clusters come first, greatest (build, group) key first, each keeping
/// input order. Tasks outside task groups follow in input order. This is a
/// partition, not a sort: no other field is looked at.
pub fn cluster(tasks: &[Task]) -> Vec<usize> {
    let mut clusters: BTreeMap<(&str, &str), Vec<usize>> = BTreeMap::new();
    let mut loose = Vec::new();

    for (i, task) in tasks.iter().enumerate() {
        if task.in_task_group() {
            clusters.entry(task.group_key()).or_default().push(i);
        } else {
            loose.push(i);
        }
    }

    clusters.into_values().rev().flatten().chain(loose).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::TaskBuilder;

    #[test]
    fn test_cluster_keeps_loose_tasks_in_input_order() {
        let tasks = vec![
            TaskBuilder::new("a").build(),
            TaskBuilder::new("b").build(),
            TaskBuilder::new("c").build(),
        ];
        assert_eq!(cluster(&tasks), vec![0, 1, 2]);
    }

    #[test]
    fn test_cluster_groups_members_by_build() {
        let tasks = vec![
            TaskBuilder::new("loose").build(),
            TaskBuilder::new("b2-lint").build_id("b2").group("g").build(),
            TaskBuilder::new("b1-lint").build_id("b1").group("g").build(),
            TaskBuilder::new("b2-test").build_id("b2").group("g").build(),
            TaskBuilder::new("b1-test").build_id("b1").group("g").build(),
        ];
        assert_eq!(cluster(&tasks), vec![1, 3, 2, 4, 0]);
    }
}
