//! Event receiver - turns source envelopes into dispatchable events
//!
//! Registers the `resource.change` and `ping` handlers on an event source,
//! classifies every envelope and forwards accepted events through a bounded
//! async-channel. Valid events are never dropped here: a full channel blocks
//! the source callback until the dispatcher catches up. Handlers must
//! therefore run on a thread the source owns, not on an async worker.

use std::collections::HashSet;
use std::sync::Arc;

use async_channel::{Receiver, Sender};
use contracts::{
    EnvelopeHandler, Event, EventKind, EventSource, HandlerMap, RawEnvelope, PING,
    RESOURCE_CHANGE,
};
use observability::DiscardReason;
use tracing::{debug, info, instrument, trace, warn};

use crate::classify::{classify, Classification};
use crate::error::{IngestionError, Result};
use crate::metrics::IngestionMetrics;

/// Event receiver
///
/// Owns both ends of the source -> dispatcher channel until the consumer
/// takes the receiving end.
pub struct EventReceiver {
    wanted: Arc<HashSet<EventKind>>,
    sender: Sender<Arc<Event>>,
    receiver: Option<Receiver<Arc<Event>>>,
    metrics: Arc<IngestionMetrics>,
}

impl EventReceiver {
    /// Create a receiver forwarding only the `wanted` kinds
    ///
    /// # Arguments
    /// * `wanted` - union of the kinds accepted by every configured plugin
    /// * `capacity` - channel capacity (must be > 0)
    pub fn new(wanted: impl IntoIterator<Item = EventKind>, capacity: usize) -> Self {
        let (sender, receiver) = async_channel::bounded(capacity.max(1));
        Self {
            wanted: Arc::new(wanted.into_iter().collect()),
            sender,
            receiver: Some(receiver),
            metrics: Arc::new(IngestionMetrics::new()),
        }
    }

    /// Take the receiving end (only once)
    pub fn take_receiver(&mut self) -> Option<Receiver<Arc<Event>>> {
        self.receiver.take()
    }

    /// Get metrics
    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        self.metrics.clone()
    }

    /// Kinds forwarded by this receiver
    pub fn wanted(&self) -> &HashSet<EventKind> {
        &self.wanted
    }

    /// Build the handler table to subscribe with
    pub fn handlers(&self) -> HandlerMap {
        let wanted = self.wanted.clone();
        let sender = self.sender.clone();
        let metrics = self.metrics.clone();

        let on_change: EnvelopeHandler = Arc::new(move |envelope: RawEnvelope| {
            handle_resource_change(&envelope, &wanted, &sender, &metrics);
        });
        let on_ping: EnvelopeHandler = Arc::new(|envelope: RawEnvelope| {
            trace!(id = %envelope.id, "ping");
        });

        HandlerMap::from([
            (RESOURCE_CHANGE.to_string(), on_change),
            (PING.to_string(), on_ping),
        ])
    }

    /// Subscribe to the source
    ///
    /// # Errors
    /// Returns `SubscribeFailed` if the source cannot establish its stream.
    #[instrument(name = "ingestion_start", skip(self, source), fields(source = source.name()))]
    pub async fn start(&self, source: &dyn EventSource) -> Result<()> {
        let mut kinds: Vec<_> = self.wanted.iter().map(EventKind::as_str).collect();
        kinds.sort_unstable();
        info!(kinds = ?kinds, "subscribing to event source");

        source
            .subscribe(self.handlers())
            .await
            .map_err(|source_err| IngestionError::SubscribeFailed {
                source_name: source.name().to_string(),
                source: source_err,
            })
    }

    /// Stop the source and close the channel
    ///
    /// Events already in the channel stay readable; the consumer sees the
    /// channel end once it has drained them.
    #[instrument(name = "ingestion_stop", skip(self, source), fields(source = source.name()))]
    pub async fn stop(&self, source: &dyn EventSource) -> Result<()> {
        // Close first so a callback blocked on a full channel returns
        self.sender.close();
        let result = source
            .stop()
            .await
            .map_err(|source_err| IngestionError::StopFailed {
                source_name: source.name().to_string(),
                source: source_err,
            });
        info!("event source stopped");
        result
    }
}

impl Drop for EventReceiver {
    fn drop(&mut self) {
        self.sender.close();
    }
}

fn handle_resource_change(
    envelope: &RawEnvelope,
    wanted: &HashSet<EventKind>,
    sender: &Sender<Arc<Event>>,
    metrics: &IngestionMetrics,
) {
    metrics.record_received();
    observability::record_event_received(&envelope.resource_type);

    let event = match classify(envelope, wanted) {
        Classification::Event(event) => event,
        Classification::UnknownKind => {
            metrics.record_unknown_kind();
            observability::record_event_discarded(DiscardReason::UnknownKind);
            debug!(
                id = %envelope.id,
                resource_type = %envelope.resource_type,
                "ignoring resource with no event kind"
            );
            return;
        }
        Classification::Unwanted(kind) => {
            metrics.record_unwanted();
            observability::record_event_discarded(DiscardReason::Unwanted);
            trace!(id = %envelope.id, %kind, "no plugin accepts kind");
            return;
        }
        Classification::MissingResource(kind) => {
            metrics.record_decode_error();
            observability::record_event_discarded(DiscardReason::DecodeFailed);
            warn!(id = %envelope.id, %kind, "resource change without resource data");
            return;
        }
        Classification::DecodeFailed(e) => {
            metrics.record_decode_error();
            observability::record_event_discarded(DiscardReason::DecodeFailed);
            warn!(id = %envelope.id, error = %e, "failed to decode resource");
            return;
        }
    };

    trace!(id = %event.id, kind = %event.kind(), name = event.name(), "event classified");

    // Blocks the source callback while the channel is full; overflow is
    // handled per runner, never here
    match sender.send_blocking(Arc::new(event)) {
        Ok(()) => metrics.record_forwarded(),
        Err(err) => {
            metrics.record_after_close();
            observability::record_event_discarded(DiscardReason::ChannelClosed);
            debug!(id = %err.into_inner().id, "dispatcher channel closed, dropping event");
        }
    }
}
