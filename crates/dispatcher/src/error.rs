//! Dispatcher error types

use contracts::ContractError;
use ingestion::IngestionError;
use thiserror::Error;

use crate::runner::RunnerState;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Plugin type registered twice
    #[error("plugin type '{plugin}' is already registered")]
    DuplicatePlugin { plugin: String },

    /// Configured plugin type has no registration
    #[error("runner '{name}' uses unknown plugin type '{plugin}'")]
    UnknownPlugin { name: String, plugin: String },

    /// Plugin factory rejected its configuration
    #[error("failed to create plugin for runner '{name}': {source}")]
    PluginCreation {
        name: String,
        #[source]
        source: ContractError,
    },

    /// Plugin init failed (startup fatal)
    #[error("runner '{runner}' failed to start: {source}")]
    PluginInit {
        runner: String,
        #[source]
        source: ContractError,
    },

    /// Plugin close failed
    #[error("runner '{runner}' failed to close: {source}")]
    PluginClose {
        runner: String,
        #[source]
        source: ContractError,
    },

    /// Lifecycle call in the wrong state
    #[error("runner '{runner}' cannot {action} while {state}")]
    InvalidState {
        runner: String,
        action: &'static str,
        state: RunnerState,
    },

    /// Dispatcher already started
    #[error("dispatcher already started")]
    AlreadyStarted,

    /// Event source subscription failed (startup fatal)
    #[error("event source error: {0}")]
    Source(#[from] IngestionError),

    /// One or more runners failed to stop
    #[error("{} runner(s) failed to stop: {}", .0.len(), join_errors(.0))]
    StopFailures(Vec<DispatcherError>),
}

fn join_errors(errors: &[DispatcherError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl DispatcherError {
    /// Create a plugin creation error
    pub fn plugin_creation(name: impl Into<String>, source: ContractError) -> Self {
        Self::PluginCreation {
            name: name.into(),
            source,
        }
    }
}

/// Dispatcher Result type alias
pub type Result<T> = std::result::Result<T, DispatcherError>;
