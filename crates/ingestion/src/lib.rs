//! # Ingestion
//!
//! Event source ingestion.
//!
//! Responsibilities:
//! - Subscribe to an `EventSource` with the resource change and keepalive handlers
//! - Classify raw envelopes into canonical `Event`s
//! - Discard unknown, unwanted and undecodable envelopes (counted, never fatal)
//! - Forward events downstream via a bounded async-channel
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{EventReceiver, MockEventSource};
//! use contracts::EventKind;
//!
//! let source = MockEventSource::new("mock");
//! let mut receiver = EventReceiver::new([EventKind::Container], 100);
//! let rx = receiver.take_receiver().unwrap();
//! receiver.start(&source).await?;
//! while let Ok(event) = rx.recv().await {
//!     // Route event
//! }
//! ```

mod classify;
mod error;
mod metrics;
mod mock;
mod receiver;
mod replay;

// Re-exports
pub use classify::{classify, Classification};
pub use error::{IngestionError, Result};
pub use metrics::{IngestionMetrics, IngestionSnapshot};
pub use mock::MockEventSource;
pub use receiver::EventReceiver;
pub use replay::{ReplayConfig, ReplayEventSource};
