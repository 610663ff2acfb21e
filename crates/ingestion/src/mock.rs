//! Mock event source
//!
//! For tests without a live event stream. Envelopes are pushed in by hand
//! and delivered to the subscribed handler before `emit` returns.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use contracts::{ContractError, EventSource, HandlerMap, RawEnvelope};
use tracing::{debug, warn};

/// Mock event source
pub struct MockEventSource {
    name: String,
    handlers: Mutex<Option<HandlerMap>>,
    subscribe_error: Option<String>,
    stop_count: AtomicU64,
}

impl MockEventSource {
    /// Create a mock source that accepts subscriptions
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handlers: Mutex::new(None),
            subscribe_error: None,
            stop_count: AtomicU64::new(0),
        }
    }

    /// Create a mock source whose subscription always fails
    pub fn failing(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            subscribe_error: Some(message.into()),
            ..Self::new(name)
        }
    }

    /// Deliver an envelope to the handler registered for its type
    ///
    /// The handler runs on the blocking pool, like a live source's own
    /// thread, and is awaited so envelopes are delivered in call order.
    /// Returns `false` if nothing is subscribed or no handler matches.
    pub async fn emit(&self, envelope: RawEnvelope) -> bool {
        let handler = {
            let guard = self.handlers.lock().unwrap_or_else(|e| e.into_inner());
            guard
                .as_ref()
                .and_then(|handlers| handlers.get(&envelope.name).cloned())
        };

        let Some(handler) = handler else {
            debug!(source = %self.name, name = %envelope.name, "no handler for envelope");
            return false;
        };

        match tokio::task::spawn_blocking(move || handler(envelope)).await {
            Ok(()) => true,
            Err(e) => {
                warn!(source = %self.name, error = %e, "envelope handler panicked");
                false
            }
        }
    }

    /// Whether handlers are currently subscribed
    pub fn is_subscribed(&self) -> bool {
        self.handlers
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    /// Number of `stop` calls received
    pub fn stop_count(&self) -> u64 {
        self.stop_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl EventSource for MockEventSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn subscribe(&self, handlers: HandlerMap) -> Result<(), ContractError> {
        if let Some(message) = &self.subscribe_error {
            return Err(ContractError::source_connection(message.clone()));
        }

        let mut guard = self.handlers.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some(handlers);
        debug!(source = %self.name, "mock source subscribed");
        Ok(())
    }

    async fn stop(&self) -> Result<(), ContractError> {
        self.stop_count.fetch_add(1, Ordering::Relaxed);
        let mut guard = self.handlers.lock().unwrap_or_else(|e| e.into_inner());
        guard.take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_emit_routes_by_name() {
        let source = MockEventSource::new("mock");
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        let mut handlers = HandlerMap::new();
        handlers.insert(
            "resource.change".into(),
            Arc::new(move |_: RawEnvelope| {
                counter.fetch_add(1, Ordering::Relaxed);
            }),
        );
        source.subscribe(handlers).await.unwrap();

        let change = RawEnvelope {
            name: "resource.change".into(),
            ..Default::default()
        };
        let other = RawEnvelope {
            name: "other".into(),
            ..Default::default()
        };
        assert!(source.emit(change).await);
        assert!(!source.emit(other).await);
        assert_eq!(hits.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_stop_unsubscribes() {
        let source = MockEventSource::new("mock");
        source.subscribe(HandlerMap::new()).await.unwrap();
        assert!(source.is_subscribed());

        source.stop().await.unwrap();
        assert!(!source.is_subscribed());
        assert_eq!(source.stop_count(), 1);
    }
}
