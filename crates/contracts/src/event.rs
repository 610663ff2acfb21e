//! Event - canonical resource change record
//!
//! Produced by ingestion, fanned out by the dispatcher, consumed by plugins.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Container, ContractError, HealthState, Host, InstanceState, Service, Stack};

/// Domain category of an event
///
/// Governs the payload shape and which plugins may subscribe to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Container,
    Host,
    Service,
    Stack,
}

impl EventKind {
    /// Every kind, in declaration order
    pub const ALL: [EventKind; 4] = [
        EventKind::Container,
        EventKind::Host,
        EventKind::Service,
        EventKind::Stack,
    ];

    /// Map a source resource type to an event kind
    ///
    /// Stacks are reported as `environment` by older APIs.
    pub fn from_resource_type(resource_type: &str) -> Option<Self> {
        match resource_type {
            "container" => Some(Self::Container),
            "host" => Some(Self::Host),
            "service" => Some(Self::Service),
            "environment" | "stack" => Some(Self::Stack),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Container => "container",
            Self::Host => "host",
            Self::Service => "service",
            Self::Stack => "stack",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    Container(Container),
    Host(Host),
    Service(Service),
    Stack(Stack),
}

impl EventPayload {
    /// Decode resource attributes into the payload for `kind`
    fn decode(kind: EventKind, resource: &serde_json::Value) -> serde_json::Result<Self> {
        let payload = match kind {
            EventKind::Container => {
                let mut container: Container = Container::deserialize(resource)?;
                container.split_composite_name();
                Self::Container(container)
            }
            EventKind::Host => Self::Host(Host::deserialize(resource)?),
            EventKind::Service => Self::Service(Service::deserialize(resource)?),
            EventKind::Stack => Self::Stack(Stack::deserialize(resource)?),
        };
        Ok(payload)
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::Container(_) => EventKind::Container,
            Self::Host(_) => EventKind::Host,
            Self::Service(_) => EventKind::Service,
            Self::Stack(_) => EventKind::Stack,
        }
    }
}

/// Canonical, immutable resource change event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Source event id
    pub id: String,

    /// Creation time (UTC)
    pub timestamp: DateTime<Utc>,

    /// Kind-specific payload
    pub payload: EventPayload,
}

impl Event {
    /// Build an event of `kind` from raw resource attributes
    ///
    /// # Errors
    /// Returns `PayloadDecode` if the attributes do not fit the kind's payload.
    pub fn new(
        id: impl Into<String>,
        kind: EventKind,
        resource: &serde_json::Value,
    ) -> Result<Self, ContractError> {
        let id = id.into();
        let payload = EventPayload::decode(kind, resource)
            .map_err(|e| ContractError::payload_decode(&id, kind, e.to_string()))?;

        Ok(Self::with_payload(id, payload))
    }

    /// Build an event from a source resource type string
    ///
    /// # Errors
    /// - `UnknownEventKind` if the resource type has no event kind
    /// - `PayloadDecode` if the attributes cannot be decoded
    pub fn from_resource(
        id: impl Into<String>,
        resource_type: &str,
        resource: &serde_json::Value,
    ) -> Result<Self, ContractError> {
        let kind = EventKind::from_resource_type(resource_type).ok_or_else(|| {
            ContractError::UnknownEventKind {
                resource_type: resource_type.to_string(),
            }
        })?;
        Self::new(id, kind, resource)
    }

    /// Wrap an already decoded payload, stamped with the current time
    pub fn with_payload(id: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: id.into(),
            timestamp: Utc::now(),
            payload,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    /// Resource name (display name for containers)
    pub fn name(&self) -> &str {
        match &self.payload {
            EventPayload::Container(c) => &c.name,
            EventPayload::Host(h) => &h.name,
            EventPayload::Service(s) => &s.name,
            EventPayload::Stack(s) => &s.name,
        }
    }

    pub fn state(&self) -> InstanceState {
        match &self.payload {
            EventPayload::Container(c) => c.state,
            EventPayload::Host(h) => h.state,
            EventPayload::Service(s) => s.state,
            EventPayload::Stack(s) => s.state,
        }
    }

    /// Health state; hosts carry none and always report `Unknown`
    pub fn health_state(&self) -> HealthState {
        match &self.payload {
            EventPayload::Container(c) => c.health_state,
            EventPayload::Host(_) => HealthState::Unknown,
            EventPayload::Service(s) => s.health_state,
            EventPayload::Stack(s) => s.health_state,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} '{}' is now in the '{}' state (health: '{}')",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.kind(),
            self.name(),
            self.state(),
            self.health_state()
        )
    }
}
