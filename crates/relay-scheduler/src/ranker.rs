//! Task ranking: pre-sort clustering, stable sort over the comparator
//! chain, then task-group anchoring.

use relay_core::ids::TaskId;
use relay_core::task::Task;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, warn};

use crate::cache::RankingContext;
use crate::comparator::{Anomaly, ComparatorChain};
use crate::presort;

/// Dispatch order produced by one ranking.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ranking {
    pub task_ids: Vec<TaskId>,
    /// Distinct anomalies raised by the rules, sorted.
    pub anomalies: Vec<Anomaly>,
}

/// Orders task snapshots for dispatch.
#[derive(Debug, Clone)]
pub struct TaskRanker {
    chain: ComparatorChain,
}

impl TaskRanker {
    pub fn new(chain: ComparatorChain) -> Self {
        Self { chain }
    }

    pub fn chain(&self) -> &ComparatorChain {
        &self.chain
    }

    /// Rank the tasks. Identical inputs always produce the identical order.
    pub fn rank(&self, tasks: &[Task], ctx: &RankingContext) -> Ranking {
        let mut order = presort::cluster(tasks);
        let mut anomalies = BTreeSet::new();

        merge_sort_by(&mut order, &mut |&a, &b| {
            self.chain
                .compare_with(&tasks[a], &tasks[b], ctx, |anomaly| {
                    anomalies.insert(anomaly);
                })
                .to_ordering()
        });

        let order = anchor_groups(&order, tasks, ctx);

        for anomaly in &anomalies {
            warn!(
                rule = anomaly.rule,
                task = %anomaly.error.task(),
                "Ranking anomaly in {}: {}",
                anomaly.error.source_name(),
                anomaly.error
            );
        }
        debug!(
            "Ranked {} tasks with {} anomalies",
            order.len(),
            anomalies.len()
        );

        Ranking {
            task_ids: order.into_iter().map(|i| tasks[i].id.clone()).collect(),
            anomalies: anomalies.into_iter().collect(),
        }
    }
}

/// Stable top-down merge sort. Unlike `slice::sort_by` it tolerates
/// comparators that are not transitive: the age rule can form cycles
/// across requester classes, and a pass must never abort over that.
fn merge_sort_by<T, F>(items: &mut [T], cmp: &mut F)
where
    T: Copy,
    F: FnMut(&T, &T) -> Ordering,
{
    let len = items.len();
    if len <= 1 {
        return;
    }

    let mid = len / 2;
    merge_sort_by(&mut items[..mid], cmp);
    merge_sort_by(&mut items[mid..], cmp);

    let mut merged = Vec::with_capacity(len);
    let (mut i, mut j) = (0, mid);
    while i < mid && j < len {
        // Take from the right run only when strictly ahead.
        if cmp(&items[j], &items[i]) == Ordering::Less {
            merged.push(items[j]);
            j += 1;
        } else {
            merged.push(items[i]);
            i += 1;
        }
    }
    merged.extend_from_slice(&items[i..mid]);
    merged.extend_from_slice(&items[j..]);
    items.copy_from_slice(&merged);
}

/// Emit each (build, group) cluster contiguously where its best-ranked
/// member landed, members in configured order. Unlisted members go last.
fn anchor_groups(sorted: &[usize], tasks: &[Task], ctx: &RankingContext) -> Vec<usize> {
    let mut members: HashMap<(&str, &str), Vec<usize>> = HashMap::new();
    for &i in sorted {
        if tasks[i].in_task_group() {
            members.entry(tasks[i].group_key()).or_default().push(i);
        }
    }

    let mut emitted = HashSet::new();
    let mut order = Vec::with_capacity(sorted.len());
    for &i in sorted {
        let task = &tasks[i];
        if !task.in_task_group() {
            order.push(i);
            continue;
        }
        let key = task.group_key();
        if !emitted.insert(key) {
            continue;
        }
        if let Some(cluster) = members.get_mut(&key) {
            cluster.sort_by_key(|&m| ctx.groups.position(&tasks[m]).unwrap_or(usize::MAX));
            order.extend_from_slice(cluster);
        }
    }
    order
}
