//! Event flow metrics
//!
//! Thin wrappers over the `metrics` facade so every crate records the same
//! metric names and labels. Without an installed recorder these are no-ops.

use metrics::{counter, gauge, histogram};

/// Why an event never reached the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// Resource type has no event kind
    UnknownKind,
    /// No configured plugin accepts the kind
    Unwanted,
    /// Resource attributes could not be decoded
    DecodeFailed,
    /// Arrived after the source -> dispatcher channel closed
    ChannelClosed,
}

impl DiscardReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownKind => "unknown_kind",
            Self::Unwanted => "unwanted",
            Self::DecodeFailed => "decode_failed",
            Self::ChannelClosed => "channel_closed",
        }
    }
}

/// Record a resource change envelope received from the source
pub fn record_event_received(resource_type: &str) {
    counter!(
        "eventbridge_events_received_total",
        "resource_type" => resource_type.to_string()
    )
    .increment(1);
}

/// Record an envelope discarded before dispatch
pub fn record_event_discarded(reason: DiscardReason) {
    counter!(
        "eventbridge_events_discarded_total",
        "reason" => reason.as_str()
    )
    .increment(1);
}

/// Record an event routed into a runner queue
pub fn record_event_routed(plugin: &str) {
    counter!(
        "eventbridge_events_routed_total",
        "plugin" => plugin.to_string()
    )
    .increment(1);
}

/// Record an event evicted from a full runner queue
pub fn record_event_dropped(plugin: &str) {
    counter!(
        "eventbridge_events_dropped_total",
        "plugin" => plugin.to_string()
    )
    .increment(1);
}

/// Record the outcome and latency of one plugin process call
pub fn record_event_processed(plugin: &str, success: bool, latency_ms: f64) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "eventbridge_events_processed_total",
        "plugin" => plugin.to_string(),
        "status" => status
    )
    .increment(1);

    histogram!(
        "eventbridge_process_latency_ms",
        "plugin" => plugin.to_string()
    )
    .record(latency_ms);
}

/// Record the current depth of a runner queue
pub fn record_queue_depth(plugin: &str, depth: usize) {
    gauge!(
        "eventbridge_queue_depth",
        "plugin" => plugin.to_string()
    )
    .set(depth as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discard_reason_labels() {
        assert_eq!(DiscardReason::UnknownKind.as_str(), "unknown_kind");
        assert_eq!(DiscardReason::ChannelClosed.as_str(), "channel_closed");
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_event_received("container");
        record_event_discarded(DiscardReason::Unwanted);
        record_event_routed("console");
        record_event_dropped("console");
        record_event_processed("console", true, 0.4);
        record_queue_depth("console", 3);
    }
}
