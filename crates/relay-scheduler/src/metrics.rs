//! Metrics for ranking pass observability.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Pass-level counters. Individual anomalies only show up in logs.
#[derive(Debug, Default)]
pub struct PassMetrics {
    /// Total passes started.
    pub passes_started: AtomicU64,
    /// Passes that produced a new dispatch order.
    pub passes_succeeded: AtomicU64,
    /// Passes aborted while building caches; the previous order was kept.
    pub passes_failed: AtomicU64,
    /// Passes stopped by a cancellation signal.
    pub passes_cancelled: AtomicU64,
    /// Distinct ranking anomalies across all passes.
    pub anomalies: AtomicU64,
    /// Failed hand-offs to the dispatcher.
    pub publish_failures: AtomicU64,
    /// Duration of the most recent pass.
    pub last_pass_ms: AtomicU64,
}

impl PassMetrics {
    /// Create new metrics instance.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_start(&self) {
        self.passes_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self, duration_ms: u64, anomalies: u64) {
        self.passes_succeeded.fetch_add(1, Ordering::Relaxed);
        self.anomalies.fetch_add(anomalies, Ordering::Relaxed);
        self.last_pass_ms.store(duration_ms, Ordering::Relaxed);
    }

    pub fn record_failure(&self, duration_ms: u64) {
        self.passes_failed.fetch_add(1, Ordering::Relaxed);
        self.last_pass_ms.store(duration_ms, Ordering::Relaxed);
    }

    pub fn record_cancelled(&self) {
        self.passes_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_publish_failure(&self) {
        self.publish_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            passes_started: self.passes_started.load(Ordering::Relaxed),
            passes_succeeded: self.passes_succeeded.load(Ordering::Relaxed),
            passes_failed: self.passes_failed.load(Ordering::Relaxed),
            passes_cancelled: self.passes_cancelled.load(Ordering::Relaxed),
            anomalies: self.anomalies.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            last_pass_ms: self.last_pass_ms.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of metrics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub passes_started: u64,
    pub passes_succeeded: u64,
    pub passes_failed: u64,
    pub passes_cancelled: u64,
    pub anomalies: u64,
    pub publish_failures: u64,
    pub last_pass_ms: u64,
}

/// Timer for measuring pass latency.
pub struct LatencyTimer {
    start: Instant,
}

impl LatencyTimer {
    /// Start a new latency timer.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed duration in milliseconds.
    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}
