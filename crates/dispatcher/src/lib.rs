//! # Dispatcher
//!
//! Event dispatch engine.
//!
//! Responsibilities:
//! - Consume canonical `Event`s from the ingestion channel
//! - Fan out to every plugin runner accepting the event's kind
//! - Isolate slow or failing plugins behind drop-oldest queues and worker pools

pub mod dispatcher;
pub mod error;
pub mod metrics;
pub mod plugins;
pub mod queue;
pub mod registry;
pub mod runner;

pub use contracts::{Event, EventKind, Plugin};
pub use dispatcher::{route, Dispatcher};
pub use error::{DispatcherError, Result};
pub use metrics::{MetricsSnapshot, RunnerMetrics};
pub use plugins::{FilePlugin, FilePluginConfig, LogPlugin, WebhookPlugin, WebhookPluginConfig};
pub use queue::{EventQueue, QueueStats};
pub use registry::{PluginFactory, PluginRegistry};
pub use runner::{PluginRunner, RunnerState};
