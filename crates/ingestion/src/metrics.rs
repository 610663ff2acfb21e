//! Ingestion metrics

use std::sync::atomic::{AtomicU64, Ordering};

/// Ingestion metrics
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    /// Total resource change envelopes received
    pub envelopes_received: AtomicU64,

    /// Envelopes turned into events and handed to the dispatcher
    pub events_forwarded: AtomicU64,

    /// Envelopes with an unknown resource type
    pub unknown_kind: AtomicU64,

    /// Events of a kind no plugin accepts
    pub unwanted: AtomicU64,

    /// Envelopes whose resource could not be decoded
    pub decode_errors: AtomicU64,

    /// Events arriving after the dispatcher channel was closed
    pub after_close: AtomicU64,
}

impl IngestionMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.envelopes_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_forwarded(&self) {
        self.events_forwarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unknown_kind(&self) {
        self.unknown_kind.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unwanted(&self) {
        self.unwanted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_after_close(&self) {
        self.after_close.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> IngestionSnapshot {
        IngestionSnapshot {
            envelopes_received: self.envelopes_received.load(Ordering::Relaxed),
            events_forwarded: self.events_forwarded.load(Ordering::Relaxed),
            unknown_kind: self.unknown_kind.load(Ordering::Relaxed),
            unwanted: self.unwanted.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            after_close: self.after_close.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestionSnapshot {
    pub envelopes_received: u64,
    pub events_forwarded: u64,
    pub unknown_kind: u64,
    pub unwanted: u64,
    pub decode_errors: u64,
    pub after_close: u64,
}
