//! Dispatcher - wires the event source to every plugin runner
//!
//! Startup: subscribe to the source, start runners in registration order,
//! spawn the fan-out loop. Shutdown: stop the fan-out loop, stop the
//! source, stop every runner.

use std::collections::HashSet;
use std::sync::Arc;

use async_channel::Receiver;
use contracts::{BridgeBlueprint, Event, EventKind, EventSource, DEFAULT_EVENT_BUFFER};
use ingestion::{EventReceiver, IngestionSnapshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::error::{DispatcherError, Result};
use crate::metrics::MetricsSnapshot;
use crate::registry::PluginRegistry;
use crate::runner::PluginRunner;

/// The main Dispatcher that fans out events to plugin runners
pub struct Dispatcher {
    runners: Vec<Arc<PluginRunner>>,
    source: Arc<dyn EventSource>,
    event_buffer: usize,
    receiver: Option<EventReceiver>,
    token: CancellationToken,
    fan_out: Option<JoinHandle<()>>,
}

impl Dispatcher {
    /// Create a dispatcher over already built runners
    ///
    /// Runner order is the registration order used for startup and
    /// shutdown.
    pub fn new(runners: Vec<Arc<PluginRunner>>, source: Arc<dyn EventSource>) -> Self {
        Self {
            runners,
            source,
            event_buffer: DEFAULT_EVENT_BUFFER,
            receiver: None,
            token: CancellationToken::new(),
            fan_out: None,
        }
    }

    /// Set the capacity of the source -> dispatcher channel
    pub fn with_event_buffer(mut self, event_buffer: usize) -> Self {
        self.event_buffer = event_buffer.max(1);
        self
    }

    /// Resolve runners from a blueprint and build the dispatcher
    ///
    /// # Errors
    /// Fails on unknown plugin types or factory errors.
    #[instrument(name = "dispatcher_create", skip_all)]
    pub fn from_blueprint(
        registry: &PluginRegistry,
        blueprint: &BridgeBlueprint,
        source: Arc<dyn EventSource>,
    ) -> Result<Self> {
        let runners = registry.resolve(blueprint)?;
        Ok(Self::new(runners, source).with_event_buffer(blueprint.agent.event_buffer))
    }

    pub fn runners(&self) -> &[Arc<PluginRunner>] {
        &self.runners
    }

    /// Union of the kinds accepted by every runner
    pub fn wanted_kinds(&self) -> HashSet<EventKind> {
        self.runners
            .iter()
            .flat_map(|runner| runner.kinds().iter().copied())
            .collect()
    }

    /// Get metrics for all runners
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.runners
            .iter()
            .map(|r| (r.name().to_string(), r.metrics()))
            .collect()
    }

    /// Ingestion counters, once started
    pub fn ingestion_metrics(&self) -> Option<IngestionSnapshot> {
        self.receiver.as_ref().map(|r| r.metrics().snapshot())
    }

    /// Start the source, the runners and the fan-out loop
    ///
    /// Runners already started are not rolled back on failure; the caller
    /// must still call `shutdown`.
    ///
    /// # Errors
    /// - `Source` if the subscription fails
    /// - `PluginInit` from the first runner whose plugin fails to initialize
    /// - `AlreadyStarted` on a second call
    #[instrument(name = "dispatcher_start", skip(self), fields(runners = self.runners.len()))]
    pub async fn start(&mut self) -> Result<()> {
        if self.receiver.is_some() {
            return Err(DispatcherError::AlreadyStarted);
        }

        let mut receiver = EventReceiver::new(self.wanted_kinds(), self.event_buffer);
        let Some(rx) = receiver.take_receiver() else {
            return Err(DispatcherError::AlreadyStarted);
        };
        let receiver = self.receiver.insert(receiver);
        receiver.start(self.source.as_ref()).await?;

        for runner in &self.runners {
            runner.start().await?;
        }

        self.fan_out = Some(tokio::spawn(fan_out_loop(
            rx,
            self.runners.clone(),
            self.token.clone(),
        )));

        info!(
            runners = self.runners.len(),
            source = self.source.name(),
            "Dispatcher started"
        );
        Ok(())
    }

    /// Stop everything, in order
    ///
    /// Every runner is stopped even if an earlier one fails.
    ///
    /// # Errors
    /// Returns `StopFailures` with every runner stop failure.
    #[instrument(name = "dispatcher_shutdown", skip(self))]
    pub async fn shutdown(mut self) -> Result<()> {
        self.token.cancel();
        if let Some(handle) = self.fan_out.take() {
            if let Err(e) = handle.await {
                error!(error = ?e, "fan-out task panicked");
            }
        }

        if let Some(receiver) = self.receiver.take() {
            if let Err(e) = receiver.stop(self.source.as_ref()).await {
                warn!(error = %e, "event source stop failed");
            }
        }

        let mut failures = Vec::new();
        for runner in &self.runners {
            if let Err(e) = runner.stop().await {
                error!(runner = runner.name(), error = %e, "runner stop failed");
                failures.push(e);
            }
        }

        info!(failures = failures.len(), "Dispatcher shutdown complete");
        if failures.is_empty() {
            Ok(())
        } else {
            Err(DispatcherError::StopFailures(failures))
        }
    }
}

/// Route one event to every runner accepting its kind
///
/// Returns the number of runners that accepted it.
pub fn route(runners: &[Arc<PluginRunner>], event: &Arc<Event>) -> usize {
    let kind = event.kind();
    runners
        .iter()
        .filter(|runner| runner.accepts(kind))
        .filter(|runner| runner.write(event.clone()))
        .count()
}

#[instrument(name = "dispatcher_fan_out", skip_all)]
async fn fan_out_loop(
    rx: Receiver<Arc<Event>>,
    runners: Vec<Arc<PluginRunner>>,
    token: CancellationToken,
) {
    debug!("fan-out loop started");
    let mut event_count: u64 = 0;

    loop {
        let event = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            next = rx.recv() => match next {
                Ok(event) => event,
                Err(_) => {
                    debug!("source channel closed");
                    break;
                }
            },
        };

        let routed = route(&runners, &event);
        event_count += 1;
        trace!(event_id = %event.id, kind = %event.kind(), routed, "event routed");

        if event_count.is_multiple_of(100) {
            debug!(events = event_count, "Dispatcher progress");
        }
    }

    info!(events = event_count, "fan-out loop stopped");
}
