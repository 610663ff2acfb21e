//! Layered error definitions
//!
//! Categorized by source: config / event / source / plugin

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Event Errors =====
    /// Resource type with no matching event kind
    #[error("unknown event kind: {resource_type}")]
    UnknownEventKind { resource_type: String },

    /// Resource attributes could not be decoded into the kind's payload
    #[error("failed to decode {kind} resource data for event '{event_id}': {message}")]
    PayloadDecode {
        event_id: String,
        kind: String,
        message: String,
    },

    // ===== Event Source Errors =====
    /// Event stream subscription failed
    #[error("event source connection error: {message}")]
    SourceConnection { message: String },

    // ===== Plugin Errors =====
    /// Plugin initialization failed
    #[error("plugin '{plugin}' init error: {message}")]
    PluginInit { plugin: String, message: String },

    /// Plugin failed to process an event
    #[error("plugin '{plugin}' process error: {message}")]
    PluginProcess { plugin: String, message: String },

    /// Plugin failed to close
    #[error("plugin '{plugin}' close error: {message}")]
    PluginClose { plugin: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create payload decode error
    pub fn payload_decode(
        event_id: impl Into<String>,
        kind: impl ToString,
        message: impl Into<String>,
    ) -> Self {
        Self::PayloadDecode {
            event_id: event_id.into(),
            kind: kind.to_string(),
            message: message.into(),
        }
    }

    /// Create event source connection error
    pub fn source_connection(message: impl Into<String>) -> Self {
        Self::SourceConnection {
            message: message.into(),
        }
    }

    /// Create plugin init error
    pub fn plugin_init(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PluginInit {
            plugin: plugin.into(),
            message: message.into(),
        }
    }

    /// Create plugin process error
    pub fn plugin_process(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PluginProcess {
            plugin: plugin.into(),
            message: message.into(),
        }
    }

    /// Create plugin close error
    pub fn plugin_close(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PluginClose {
            plugin: plugin.into(),
            message: message.into(),
        }
    }
}
