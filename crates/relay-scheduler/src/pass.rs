//! Ranking pass orchestration.
//!
//! A pass fetches the queued tasks of one distro, builds the per-pass caches
//! concurrently under a deadline, ranks, and hands the order to the
//! dispatcher. If the caches cannot be built the previous order stays.

use futures::future::join_all;
use relay_core::dispatch::DispatchOrder;
use relay_core::ids::{DistroId, PassId};
use relay_core::ports::{Dispatcher, ProjectConfigSource, TaskSnapshotStore};
use relay_core::task::Task;
use relay_core::{Error, Result};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::cache::{
    ExecutionHistoryCache, FailureCorrelationIndex, RankingContext, TaskGroupIndex,
};
use crate::config::SchedulerConfig;
use crate::metrics::{LatencyTimer, PassMetrics};
use crate::queue::DispatchQueue;
use crate::ranker::TaskRanker;
use crate::registry::RuleRegistry;

/// Cooperative cancellation flag shared with whoever reconfigures pools.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    cancelled: Arc<AtomicBool>,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// How a pass ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PassOutcome {
    /// A new order was stored and handed to the dispatcher.
    Ranked {
        order: DispatchOrder,
        anomalies: usize,
    },
    /// Caches could not be built; the previous order (if any) stays.
    RetainedPrevious {
        previous: Option<DispatchOrder>,
        reason: String,
    },
    /// The cancellation signal was raised before the order was published.
    Cancelled { stage: &'static str },
}

impl PassOutcome {
    /// The order the pool dispatches from after this pass.
    pub fn effective_order(&self) -> Option<&DispatchOrder> {
        match self {
            PassOutcome::Ranked { order, .. } => Some(order),
            PassOutcome::RetainedPrevious { previous, .. } => previous.as_ref(),
            PassOutcome::Cancelled { .. } => None,
        }
    }

    pub fn is_ranked(&self) -> bool {
        matches!(self, PassOutcome::Ranked { .. })
    }
}

/// Runs ranking passes for execution pools.
pub struct DispatchPass {
    store: Arc<dyn TaskSnapshotStore>,
    configs: Arc<dyn ProjectConfigSource>,
    dispatcher: Arc<dyn Dispatcher>,
    ranker: TaskRanker,
    queue: Arc<DispatchQueue>,
    metrics: Arc<PassMetrics>,
    config: SchedulerConfig,
}

impl DispatchPass {
    /// Validate the configuration and assemble the rule chain from the
    /// built-in rules. Rule registry errors surface here, before any pass
    /// runs.
    pub fn new(
        store: Arc<dyn TaskSnapshotStore>,
        configs: Arc<dyn ProjectConfigSource>,
        dispatcher: Arc<dyn Dispatcher>,
        config: SchedulerConfig,
    ) -> Result<Self> {
        Self::with_registry(store, configs, dispatcher, config, &RuleRegistry::standard()?)
    }

    /// Like [`DispatchPass::new`], resolving rule keys against `registry`.
    pub fn with_registry(
        store: Arc<dyn TaskSnapshotStore>,
        configs: Arc<dyn ProjectConfigSource>,
        dispatcher: Arc<dyn Dispatcher>,
        config: SchedulerConfig,
        registry: &RuleRegistry,
    ) -> Result<Self> {
        config.validate()?;
        let chain = registry.chain(&config.rules)?;
        info!("Dispatch ranking rules: {}", chain.keys().join(", "));

        Ok(Self {
            store,
            configs,
            dispatcher,
            ranker: TaskRanker::new(chain),
            queue: Arc::new(DispatchQueue::new()),
            metrics: PassMetrics::new(),
            config,
        })
    }

    /// Share a dispatch queue with other components.
    pub fn with_queue(mut self, queue: Arc<DispatchQueue>) -> Self {
        self.queue = queue;
        self
    }

    pub fn queue(&self) -> &Arc<DispatchQueue> {
        &self.queue
    }

    pub fn metrics(&self) -> &Arc<PassMetrics> {
        &self.metrics
    }

    pub fn ranker(&self) -> &TaskRanker {
        &self.ranker
    }

    /// Run one pass for a distro. Every event of the pass is recorded inside
    /// a `ranking_pass` span carrying the distro and pass id.
    pub async fn run(&self, distro: &DistroId, cancel: &CancelSignal) -> PassOutcome {
        let pass_id = PassId::new();
        let span = info_span!("ranking_pass", distro = %distro, pass_id = %pass_id);
        self.run_pass(distro, pass_id, cancel).instrument(span).await
    }

    async fn run_pass(
        &self,
        distro: &DistroId,
        pass_id: PassId,
        cancel: &CancelSignal,
    ) -> PassOutcome {
        let timer = LatencyTimer::start();
        self.metrics.record_start();
        debug!(distro = %distro, pass_id = %pass_id, "Starting ranking pass");

        let deadline = self.config.pass_deadline();
        let prepared = match tokio::time::timeout(deadline, self.prepare(distro)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout {
                stage: "ranking pass",
                elapsed: deadline,
            }),
        };

        let (tasks, ctx) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => return self.retain_previous(distro, pass_id, &timer, e).await,
        };

        if cancel.is_cancelled() {
            return self.cancelled(distro, pass_id, "before sort");
        }

        let ranking = self.ranker.rank(&tasks, &ctx);
        drop(ctx);

        if cancel.is_cancelled() {
            return self.cancelled(distro, pass_id, "before dispatch");
        }

        let anomalies = ranking.anomalies.len();
        let order = DispatchOrder::new(distro.clone(), pass_id, ranking.task_ids);
        self.queue.replace(order.clone()).await;

        if let Err(e) = self.dispatcher.publish(&order).await {
            self.metrics.record_publish_failure();
            error!(distro = %distro, pass_id = %pass_id, "Failed to publish dispatch order: {}", e);
        }

        let duration_ms = timer.elapsed_ms();
        self.metrics.record_success(duration_ms, anomalies as u64);
        info!(
            distro = %distro,
            pass_id = %pass_id,
            tasks = order.len(),
            anomalies,
            duration_ms,
            "Ranking pass completed"
        );

        PassOutcome::Ranked { order, anomalies }
    }

    /// Run passes for several distros concurrently. Each pass builds its
    /// own caches.
    pub async fn run_all(
        &self,
        distros: &[DistroId],
        cancel: &CancelSignal,
    ) -> Vec<(DistroId, PassOutcome)> {
        join_all(distros.iter().map(|distro| async move {
            (distro.clone(), self.run(distro, cancel).await)
        }))
        .await
    }

    async fn prepare(&self, distro: &DistroId) -> Result<(Vec<Task>, RankingContext)> {
        let tasks = self
            .bounded("queued tasks", self.store.queued_tasks(distro))
            .await?;

        let (history, failures, groups) = tokio::try_join!(
            self.bounded(
                "execution history cache",
                ExecutionHistoryCache::build(self.store.as_ref(), &tasks),
            ),
            self.bounded(
                "failure correlation index",
                FailureCorrelationIndex::build(self.store.as_ref(), &tasks),
            ),
            self.bounded(
                "task group index",
                TaskGroupIndex::build(self.configs.as_ref(), &tasks),
            ),
        )?;

        Ok((tasks, RankingContext::new(history, failures, groups)))
    }

    async fn bounded<T>(
        &self,
        stage: &'static str,
        fetch: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let timeout = self.config.fetch_timeout();
        match tokio::time::timeout(timeout, fetch).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout {
                stage,
                elapsed: timeout,
            }),
        }
    }

    async fn retain_previous(
        &self,
        distro: &DistroId,
        pass_id: PassId,
        timer: &LatencyTimer,
        err: Error,
    ) -> PassOutcome {
        let duration_ms = timer.elapsed_ms();
        self.metrics.record_failure(duration_ms);

        let previous = self.queue.get(distro).await;
        error!(
            distro = %distro,
            pass_id = %pass_id,
            duration_ms,
            retained = previous.is_some(),
            "Ranking pass aborted, keeping previous order: {}",
            err
        );

        PassOutcome::RetainedPrevious {
            previous,
            reason: err.to_string(),
        }
    }

    fn cancelled(&self, distro: &DistroId, pass_id: PassId, stage: &'static str) -> PassOutcome {
        self.metrics.record_cancelled();
        warn!(distro = %distro, pass_id = %pass_id, "Ranking pass cancelled {}", stage);
        PassOutcome::Cancelled { stage }
    }
}
