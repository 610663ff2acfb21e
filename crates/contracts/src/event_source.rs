//! EventSource trait - external event stream abstraction
//!
//! Decouples the dispatcher from the concrete stream client. The client
//! connects, authenticates and decodes the wire format, then hands each raw
//! envelope to the handler registered for its event type.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::ContractError;

/// Event type carrying resource changes
pub const RESOURCE_CHANGE: &str = "resource.change";

/// Keepalive event type
pub const PING: &str = "ping";

/// Raw event as received from the source
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawEnvelope {
    /// Source event id
    pub id: String,

    /// Event type (e.g. `resource.change`)
    pub name: String,

    /// Id of the changed resource
    pub resource_id: String,

    /// Resource type string (e.g. `container`)
    pub resource_type: String,

    /// Event data; resource attributes live under `resource`
    pub data: serde_json::Value,
}

impl RawEnvelope {
    /// Build a `resource.change` envelope around resource attributes
    pub fn resource_change(
        id: impl Into<String>,
        resource_type: impl Into<String>,
        resource: serde_json::Value,
    ) -> Self {
        let resource_id = resource
            .get("id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        Self {
            id: id.into(),
            name: RESOURCE_CHANGE.to_string(),
            resource_id,
            resource_type: resource_type.into(),
            data: serde_json::json!({ "resource": resource }),
        }
    }

    /// Resource attributes, if present
    pub fn resource(&self) -> Option<&serde_json::Value> {
        self.data.get("resource").filter(|r| r.is_object())
    }
}

/// Envelope handler callback
///
/// Uses `Arc` so the source can invoke it from any of its own threads.
pub type EnvelopeHandler = Arc<dyn Fn(RawEnvelope) + Send + Sync>;

/// Handlers keyed by event type
pub type HandlerMap = HashMap<String, EnvelopeHandler>;

/// Event source collaborator
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Source name (used for logging)
    fn name(&self) -> &str;

    /// Subscribe the handlers to the event stream
    ///
    /// Resolves once the subscription is ready. Envelopes whose type has no
    /// handler are ignored by the source.
    ///
    /// # Errors
    /// Returns a startup error if the stream cannot be established.
    async fn subscribe(&self, handlers: HandlerMap) -> Result<(), ContractError>;

    /// Tear the subscription down
    async fn stop(&self) -> Result<(), ContractError>;
}
