//! Task dispatch prioritization for Relay CI.
//!
//! Turns the unordered set of queued tasks of an execution pool into a
//! deterministic dispatch order.

pub mod cache;
pub mod comparator;
pub mod config;
#[cfg(any(test, feature = "test-fixtures"))]
pub mod fixtures;
pub mod memory;
pub mod metrics;
pub mod pass;
pub mod presort;
pub mod queue;
pub mod ranker;
pub mod registry;

pub use cache::RankingContext;
pub use comparator::{ComparatorChain, RankOutcome, RankingRule};
pub use config::SchedulerConfig;
pub use pass::{CancelSignal, DispatchPass, PassOutcome};
pub use ranker::{Ranking, TaskRanker};
pub use registry::RuleRegistry;

