//! Ranking rules and the comparator chain.
//!
//! Each rule compares two task snapshots and answers which one should be
//! dispatched first. The chain applies rules in order and the first
//! decisive answer wins. Rule failures never escape the chain: they are
//! recorded as anomalies and resolved to the outcome carried by the error.

use relay_core::ids::{TaskId, VersionId};
use relay_core::task::Task;
use std::cmp::Ordering;
use std::fmt::Debug;
use std::sync::Arc;
use thiserror::Error;

use crate::cache::RankingContext;

/// Result of comparing two tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RankOutcome {
    FirstWins,
    SecondWins,
    Tie,
}

impl RankOutcome {
    /// Outcome for a comparison where the greater value is more important.
    pub fn prefer_greater<T: Ord>(first: T, second: T) -> Self {
        match first.cmp(&second) {
            Ordering::Greater => RankOutcome::FirstWins,
            Ordering::Less => RankOutcome::SecondWins,
            Ordering::Equal => RankOutcome::Tie,
        }
    }

    /// Outcome for a comparison where the smaller value is more important.
    pub fn prefer_smaller<T: Ord>(first: T, second: T) -> Self {
        Self::prefer_greater(second, first)
    }

    pub fn reverse(self) -> Self {
        match self {
            RankOutcome::FirstWins => RankOutcome::SecondWins,
            RankOutcome::SecondWins => RankOutcome::FirstWins,
            RankOutcome::Tie => RankOutcome::Tie,
        }
    }

    pub fn is_tie(self) -> bool {
        self == RankOutcome::Tie
    }

    /// Sort ordering: the winner sorts earlier.
    pub fn to_ordering(self) -> Ordering {
        match self {
            RankOutcome::FirstWins => Ordering::Less,
            RankOutcome::SecondWins => Ordering::Greater,
            RankOutcome::Tie => Ordering::Equal,
        }
    }
}

/// A rule could not decide a pair because its inputs are inconsistent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Error)]
pub enum ComparatorError {
    #[error("no cached previous execution for task {task}")]
    MissingHistory { task: TaskId },

    #[error("no similar failure count for task {task}")]
    MissingFailureCount { task: TaskId },

    #[error("task {task} ({display_name}) is not listed in task group {group}")]
    TaskGroupMember {
        task: TaskId,
        group: String,
        display_name: String,
    },

    #[error("task {task} belongs to task group {group} not declared by version {version}")]
    UnknownTaskGroup {
        task: TaskId,
        group: String,
        version: VersionId,
    },
}

impl ComparatorError {
    /// Which per-pass structure the error points at.
    pub fn source_name(&self) -> &'static str {
        match self {
            ComparatorError::MissingHistory { .. } => "execution history cache",
            ComparatorError::MissingFailureCount { .. } => "failure correlation index",
            ComparatorError::TaskGroupMember { .. } | ComparatorError::UnknownTaskGroup { .. } => {
                "task group index"
            }
        }
    }

    pub fn task(&self) -> &TaskId {
        match self {
            ComparatorError::MissingHistory { task }
            | ComparatorError::MissingFailureCount { task }
            | ComparatorError::TaskGroupMember { task, .. }
            | ComparatorError::UnknownTaskGroup { task, .. } => task,
        }
    }

    pub fn is_cache_miss(&self) -> bool {
        matches!(
            self,
            ComparatorError::MissingHistory { .. } | ComparatorError::MissingFailureCount { .. }
        )
    }
}

/// Anomaly raised while ranking: the rule that hit it and the error.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Anomaly {
    pub rule: &'static str,
    pub error: ComparatorError,
}

/// Outcome of one rule for one pair. `Recovered` carries the outcome to use
/// in place of a decision the rule could not make cleanly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleResult {
    Decided(RankOutcome),
    Recovered {
        outcome: RankOutcome,
        error: ComparatorError,
    },
}

impl RuleResult {
    /// Cache misses resolve to a tie.
    pub fn cache_miss(error: ComparatorError) -> Self {
        RuleResult::Recovered {
            outcome: RankOutcome::Tie,
            error,
        }
    }
}

impl From<RankOutcome> for RuleResult {
    fn from(outcome: RankOutcome) -> Self {
        RuleResult::Decided(outcome)
    }
}

/// A pure ranking function over two task snapshots.
pub trait RankingRule: Send + Sync + Debug {
    /// Registry key (e.g. `priority`).
    fn key(&self) -> &'static str;

    fn compare(&self, first: &Task, second: &Task, ctx: &RankingContext) -> RuleResult;

    fn description(&self) -> &'static str {
        self.key()
    }
}

/// Higher explicit priority wins. Operator override, dominates every heuristic.
#[derive(Debug, Clone, Copy)]
pub struct ByPriority;

impl RankingRule for ByPriority {
    fn key(&self) -> &'static str {
        "priority"
    }

    fn compare(&self, first: &Task, second: &Task, _ctx: &RankingContext) -> RuleResult {
        RankOutcome::prefer_greater(first.priority, second.priority).into()
    }

    fn description(&self) -> &'static str {
        "Higher explicit priority first"
    }
}

/// More dependents wins.
#[derive(Debug, Clone, Copy)]
pub struct ByDependents;

impl RankingRule for ByDependents {
    fn key(&self) -> &'static str {
        "dependents"
    }

    fn compare(&self, first: &Task, second: &Task, _ctx: &RankingContext) -> RuleResult {
        RankOutcome::prefer_greater(first.num_dependents, second.num_dependents).into()
    }

    fn description(&self) -> &'static str {
        "More blocked dependents first"
    }
}

/// Commit tasks of one project prefer the newer revision. Every other pair
/// prefers the older creation time.
#[derive(Debug, Clone, Copy)]
pub struct ByAge;

impl RankingRule for ByAge {
    fn key(&self) -> &'static str {
        "age"
    }

    fn compare(&self, first: &Task, second: &Task, _ctx: &RankingContext) -> RuleResult {
        if first.is_commit() && second.is_commit() && first.project == second.project {
            return RankOutcome::prefer_greater(
                first.revision_order_number,
                second.revision_order_number,
            )
            .into();
        }

        RankOutcome::prefer_smaller(first.create_time, second.create_time).into()
    }

    fn description(&self) -> &'static str {
        "Newest commit within a project, otherwise oldest first"
    }
}

/// Longer expected runtime wins. Unknown runtimes tie.
#[derive(Debug, Clone, Copy)]
pub struct ByRuntime;

impl RankingRule for ByRuntime {
    fn key(&self) -> &'static str {
        "runtime"
    }

    fn compare(&self, first: &Task, second: &Task, ctx: &RankingContext) -> RuleResult {
        let expected = |task: &Task| ctx.history.get(&task.id).and_then(|p| p.time_taken());

        match (expected(first), expected(second)) {
            (Some(one), Some(two)) => RankOutcome::prefer_greater(one, two).into(),
            _ => RankOutcome::Tie.into(),
        }
    }

    fn description(&self) -> &'static str {
        "Longest previous runtime first"
    }
}

/// A task whose last execution failed wins.
#[derive(Debug, Clone, Copy)]
pub struct ByRecentFailure;

impl RankingRule for ByRecentFailure {
    fn key(&self) -> &'static str {
        "recent_failure"
    }

    fn compare(&self, first: &Task, second: &Task, ctx: &RankingContext) -> RuleResult {
        let Some(one) = ctx.history.get(&first.id) else {
            return RuleResult::cache_miss(ComparatorError::MissingHistory {
                task: first.id.clone(),
            });
        };
        let Some(two) = ctx.history.get(&second.id) else {
            return RuleResult::cache_miss(ComparatorError::MissingHistory {
                task: second.id.clone(),
            });
        };

        RankOutcome::prefer_greater(one.failed(), two.failed()).into()
    }

    fn description(&self) -> &'static str {
        "Previously failing first"
    }
}

/// Within one revision, more failed siblings wins.
#[derive(Debug, Clone, Copy)]
pub struct BySimilarFailure;

impl RankingRule for BySimilarFailure {
    fn key(&self) -> &'static str {
        "similar_failure"
    }

    fn compare(&self, first: &Task, second: &Task, ctx: &RankingContext) -> RuleResult {
        if first.revision != second.revision {
            return RankOutcome::Tie.into();
        }

        let Some(one) = ctx.failures.get(&first.id) else {
            return RuleResult::cache_miss(ComparatorError::MissingFailureCount {
                task: first.id.clone(),
            });
        };
        let Some(two) = ctx.failures.get(&second.id) else {
            return RuleResult::cache_miss(ComparatorError::MissingFailureCount {
                task: second.id.clone(),
            });
        };

        RankOutcome::prefer_greater(one, two).into()
    }

    fn description(&self) -> &'static str {
        "Most similar failures across variants first"
    }
}

/// Task-group members ahead of everything else. Members of one group and
/// build follow the configured sequence; between distinct groups the
/// greater (build, group) key wins.
#[derive(Debug, Clone, Copy)]
pub struct ByTaskGroup;

impl RankingRule for ByTaskGroup {
    fn key(&self) -> &'static str {
        "task_group"
    }

    fn compare(&self, first: &Task, second: &Task, ctx: &RankingContext) -> RuleResult {
        match (first.in_task_group(), second.in_task_group()) {
            (false, false) => return RankOutcome::Tie.into(),
            (true, false) => return RankOutcome::FirstWins.into(),
            (false, true) => return RankOutcome::SecondWins.into(),
            (true, true) => {}
        }

        if first.group_key() != second.group_key() {
            return RankOutcome::prefer_greater(first.group_key(), second.group_key()).into();
        }

        // Unlisted members rank after every listed member of their group.
        match (ctx.groups.position(first), ctx.groups.position(second)) {
            (Ok(one), Ok(two)) => RankOutcome::prefer_smaller(one, two).into(),
            (Ok(_), Err(error)) => RuleResult::Recovered {
                outcome: RankOutcome::FirstWins,
                error,
            },
            (Err(error), Ok(_)) => RuleResult::Recovered {
                outcome: RankOutcome::SecondWins,
                error,
            },
            (Err(error), Err(_)) => RuleResult::Recovered {
                outcome: RankOutcome::Tie,
                error,
            },
        }
    }

    fn description(&self) -> &'static str {
        "Task groups first, in configured order"
    }
}

/// Tasks that generate further tasks win.
#[derive(Debug, Clone, Copy)]
pub struct ByGenerateTask;

impl RankingRule for ByGenerateTask {
    fn key(&self) -> &'static str {
        "generate_task"
    }

    fn compare(&self, first: &Task, second: &Task, _ctx: &RankingContext) -> RuleResult {
        RankOutcome::prefer_greater(first.generate_task, second.generate_task).into()
    }

    fn description(&self) -> &'static str {
        "Task generators first"
    }
}

/// Ordered rules applied left to right.
#[derive(Debug, Clone)]
pub struct ComparatorChain {
    rules: Vec<Arc<dyn RankingRule>>,
}

impl ComparatorChain {
    pub fn new(rules: Vec<Arc<dyn RankingRule>>) -> Self {
        Self { rules }
    }

    pub fn keys(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Compare two tasks. Anomalies are handed to `on_anomaly`; the pair
    /// then continues with the recovered outcome.
    pub fn compare_with(
        &self,
        first: &Task,
        second: &Task,
        ctx: &RankingContext,
        mut on_anomaly: impl FnMut(Anomaly),
    ) -> RankOutcome {
        for rule in &self.rules {
            let outcome = match rule.compare(first, second, ctx) {
                RuleResult::Decided(outcome) => outcome,
                RuleResult::Recovered { outcome, error } => {
                    on_anomaly(Anomaly {
                        rule: rule.key(),
                        error,
                    });
                    outcome
                }
            };
            if !outcome.is_tie() {
                return outcome;
            }
        }
        RankOutcome::Tie
    }

    /// Compare two tasks, discarding anomalies.
    pub fn compare(&self, first: &Task, second: &Task, ctx: &RankingContext) -> RankOutcome {
        self.compare_with(first, second, ctx, |_| {})
    }
}
