//! Run statistics.

use std::time::Duration;

use dispatcher::{Dispatcher, MetricsSnapshot};
use ingestion::IngestionSnapshot;

/// Statistics from a dispatcher run
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    /// Total duration of the run
    pub duration: Duration,

    /// Source-side counters
    pub ingestion: IngestionSnapshot,

    /// Per-runner counters, in registration order
    pub runners: Vec<(String, MetricsSnapshot)>,
}

impl RunStats {
    /// Capture the current counters
    pub fn collect(dispatcher: &Dispatcher, duration: Duration) -> Self {
        Self {
            duration,
            ingestion: dispatcher.ingestion_metrics().unwrap_or_default(),
            runners: dispatcher.metrics(),
        }
    }

    /// Events handed to the dispatcher per second
    pub fn events_per_sec(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.ingestion.events_forwarded as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n=== eventbridge statistics ===\n");

        let ingestion = &self.ingestion;
        println!("Source");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Envelopes received: {}", ingestion.envelopes_received);
        println!("   ├─ Events forwarded: {}", ingestion.events_forwarded);
        println!("   ├─ Events/s: {:.2}", self.events_per_sec());
        println!("   ├─ Unknown kind: {}", ingestion.unknown_kind);
        println!("   ├─ Unwanted kind: {}", ingestion.unwanted);
        println!("   ├─ Decode errors: {}", ingestion.decode_errors);
        println!("   └─ After shutdown: {}", ingestion.after_close);

        println!("\nRunners ({})", self.runners.len());
        for (i, (name, m)) in self.runners.iter().enumerate() {
            let is_last = i + 1 == self.runners.len();
            let prefix = if is_last { "└─" } else { "├─" };
            println!(
                "   {} {}: received {}, dropped {}, ok {}, errors {}, pending {}",
                prefix, name, m.received, m.dropped, m.successes, m.errors, m.pending
            );
        }

        println!();
    }
}
