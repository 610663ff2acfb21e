//! PluginRunner - one plugin behind its own queue, worker pool and metrics
//!
//! A slow or failing plugin only ever affects its own runner: `write` never
//! blocks, process failures are counted and logged, and a panic inside the
//! plugin is caught at the worker boundary.

use std::collections::HashSet;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use contracts::{Event, EventKind, Plugin};
use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::error::{DispatcherError, Result};
use crate::metrics::{MetricsSnapshot, RunnerMetrics};
use crate::queue::EventQueue;

/// Runner lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Created,
    Running,
    Stopping,
    Stopped,
}

impl RunnerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for RunnerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle to one plugin and its workers
pub struct PluginRunner {
    name: String,
    plugin: Arc<dyn Plugin>,
    kinds: HashSet<EventKind>,
    worker_count: usize,
    queue: Arc<EventQueue>,
    metrics: Arc<RunnerMetrics>,
    state: Mutex<RunnerState>,
    token: CancellationToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl fmt::Debug for PluginRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRunner")
            .field("name", &self.name)
            .field("plugin", &self.plugin.name())
            .field("state", &self.state())
            .field("worker_count", &self.worker_count)
            .field("queue", &self.queue)
            .finish()
    }
}

impl PluginRunner {
    /// Create a runner in the `Created` state
    ///
    /// `queue_capacity` and `worker_count` are clamped to at least 1.
    pub fn new(
        name: impl Into<String>,
        plugin: Arc<dyn Plugin>,
        kinds: impl IntoIterator<Item = EventKind>,
        queue_capacity: usize,
        worker_count: usize,
    ) -> Self {
        Self {
            name: name.into(),
            plugin,
            kinds: kinds.into_iter().collect(),
            worker_count: worker_count.max(1),
            queue: Arc::new(EventQueue::new(queue_capacity)),
            metrics: Arc::new(RunnerMetrics::new()),
            state: Mutex::new(RunnerState::Created),
            token: CancellationToken::new(),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Get runner name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn plugin_name(&self) -> &str {
        self.plugin.name()
    }

    pub fn kinds(&self) -> &HashSet<EventKind> {
        &self.kinds
    }

    /// Whether this runner subscribes to `kind`
    pub fn accepts(&self, kind: EventKind) -> bool {
        self.kinds.contains(&kind)
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue.capacity()
    }

    pub fn state(&self) -> RunnerState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: RunnerState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    /// Initialize the plugin and spawn the workers
    ///
    /// # Errors
    /// - `PluginInit` if the plugin's init fails; no worker is spawned
    /// - `InvalidState` if the runner is not `Created`
    #[instrument(name = "runner_start", skip(self), fields(runner = %self.name))]
    pub async fn start(&self) -> Result<()> {
        let state = self.state();
        if state != RunnerState::Created {
            return Err(DispatcherError::InvalidState {
                runner: self.name.clone(),
                action: "start",
                state,
            });
        }

        self.plugin
            .init()
            .await
            .map_err(|source| DispatcherError::PluginInit {
                runner: self.name.clone(),
                source,
            })?;

        let mut workers = self.workers.lock().unwrap_or_else(|e| e.into_inner());
        for id in 0..self.worker_count {
            workers.push(tokio::spawn(worker_loop(
                id,
                self.name.clone(),
                self.plugin.clone(),
                self.queue.clone(),
                self.metrics.clone(),
                self.token.clone(),
            )));
        }
        drop(workers);

        self.set_state(RunnerState::Running);
        info!(
            runner = %self.name,
            plugin = self.plugin.name(),
            workers = self.worker_count,
            capacity = self.queue.capacity(),
            "runner started"
        );
        Ok(())
    }

    /// Enqueue an event (non-blocking)
    ///
    /// Returns false if the runner is stopping or stopped. An accepted event
    /// may still evict the oldest buffered one.
    pub fn write(&self, event: Arc<Event>) -> bool {
        match self.state() {
            RunnerState::Created | RunnerState::Running => {}
            state => {
                debug!(runner = %self.name, event_id = %event.id, %state, "write rejected");
                return false;
            }
        }

        observability::record_event_routed(&self.name);
        if let Some(evicted) = self.queue.push(event) {
            observability::record_event_dropped(&self.name);
            warn!(
                runner = %self.name,
                event_id = %evicted.id,
                "queue full, oldest event dropped"
            );
        }
        observability::record_queue_depth(&self.name, self.queue.len());
        true
    }

    /// Stop the workers and close the plugin
    ///
    /// Workers exit without draining the queue. The plugin's close is
    /// invoked exactly once; later calls return `Ok(())` immediately.
    ///
    /// # Errors
    /// Returns `PluginClose` if the plugin's close fails.
    #[instrument(name = "runner_stop", skip(self), fields(runner = %self.name))]
    pub async fn stop(&self) -> Result<()> {
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            match *state {
                RunnerState::Stopping | RunnerState::Stopped => return Ok(()),
                RunnerState::Created | RunnerState::Running => *state = RunnerState::Stopping,
            }
        }

        self.token.cancel();

        let workers = std::mem::take(&mut *self.workers.lock().unwrap_or_else(|e| e.into_inner()));
        for handle in workers {
            if let Err(e) = handle.await {
                error!(runner = %self.name, error = ?e, "worker task panicked");
            }
        }

        let result = self.plugin.close().await;
        self.set_state(RunnerState::Stopped);

        let snapshot = self.metrics();
        info!(
            runner = %self.name,
            received = snapshot.received,
            dropped = snapshot.dropped,
            successes = snapshot.successes,
            errors = snapshot.errors,
            pending = snapshot.pending,
            "runner stopped"
        );

        result.map_err(|source| DispatcherError::PluginClose {
            runner: self.name.clone(),
            source,
        })
    }

    /// Get current metrics
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot(self.queue.stats())
    }
}

/// Worker task that consumes events and calls the plugin
#[instrument(
    name = "runner_worker_loop",
    skip(runner, plugin, queue, metrics, token),
    fields(runner = %runner)
)]
async fn worker_loop(
    id: usize,
    runner: String,
    plugin: Arc<dyn Plugin>,
    queue: Arc<EventQueue>,
    metrics: Arc<RunnerMetrics>,
    token: CancellationToken,
) {
    debug!(worker = id, "worker started");

    loop {
        let event = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            event = queue.pop() => event,
        };

        metrics.begin();
        observability::record_queue_depth(&runner, queue.len());

        let started = Instant::now();
        let outcome = AssertUnwindSafe(plugin.process(&event))
            .catch_unwind()
            .await;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        let success = match outcome {
            Ok(Ok(())) => {
                trace!(event_id = %event.id, kind = %event.kind(), "event processed");
                true
            }
            Ok(Err(e)) => {
                error!(
                    event_id = %event.id,
                    kind = %event.kind(),
                    error = %e,
                    "process failed"
                );
                false
            }
            Err(_) => {
                error!(event_id = %event.id, kind = %event.kind(), "plugin panicked during process");
                false
            }
        };

        metrics.finish(success);
        observability::record_event_processed(&runner, success, latency_ms);
    }

    debug!(worker = id, "worker stopped");
}
