//! Ingestion error types

use contracts::ContractError;
use thiserror::Error;

/// Ingestion error
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Subscribing to the event source failed
    #[error("failed to subscribe to event source '{source_name}': {source}")]
    SubscribeFailed {
        /// Event source name
        source_name: String,
        #[source]
        source: ContractError,
    },

    /// Stopping the event source failed
    #[error("failed to stop event source '{source_name}': {source}")]
    StopFailed {
        /// Event source name
        source_name: String,
        #[source]
        source: ContractError,
    },

    /// Replay file could not be loaded
    #[error("failed to load replay file '{path}': {message}")]
    ReplayLoad {
        /// Replay file path
        path: String,
        /// Error message
        message: String,
    },

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Ingestion Result type alias
pub type Result<T> = std::result::Result<T, IngestionError>;
