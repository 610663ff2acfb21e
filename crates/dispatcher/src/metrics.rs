//! Runner metrics for observability

use std::sync::atomic::{AtomicU64, Ordering};

use crate::queue::QueueStats;

/// Plugin outcome counters for a single runner
///
/// Queue-side counters (received, dropped, pending, delivered) live in the
/// `EventQueue` itself; these cover what happens after dequeue.
#[derive(Debug, Default)]
pub struct RunnerMetrics {
    /// Total successful process calls
    successes: AtomicU64,
    /// Total failed (or panicked) process calls
    errors: AtomicU64,
    /// Events dequeued but not yet finished
    in_flight: AtomicU64,
}

impl RunnerMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
    }

    /// Record the outcome of one process call
    pub fn finish(&self, success: bool) {
        if success {
            self.successes.fetch_add(1, Ordering::SeqCst);
        } else {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn successes(&self) -> u64 {
        self.successes.load(Ordering::SeqCst)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> u64 {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Combine with queue counters into a snapshot
    pub fn snapshot(&self, queue: QueueStats) -> MetricsSnapshot {
        MetricsSnapshot {
            pending: queue.len,
            dropped: queue.drops,
            received: queue.pushed,
            delivered: queue.popped,
            successes: self.successes(),
            errors: self.errors(),
            in_flight: self.in_flight(),
        }
    }
}

/// Snapshot of runner metrics (for reporting)
///
/// Once the runner is quiescent, `received == dropped + pending + delivered`
/// and `delivered == successes + errors + in_flight`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Events currently buffered
    pub pending: usize,
    /// Events evicted by the drop-oldest policy
    pub dropped: u64,
    /// Events accepted by `write`
    pub received: u64,
    /// Events handed to a worker
    pub delivered: u64,
    pub successes: u64,
    pub errors: u64,
    pub in_flight: u64,
}
