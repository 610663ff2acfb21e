//! Event classification - raw envelope to canonical event

use std::collections::HashSet;

use contracts::{ContractError, Event, EventKind, RawEnvelope};

/// Outcome of classifying one resource change envelope
#[derive(Debug)]
pub enum Classification {
    /// Decoded event, ready for dispatch
    Event(Event),
    /// Resource type has no event kind
    UnknownKind,
    /// Kind is valid but no plugin accepts it
    Unwanted(EventKind),
    /// Envelope carries no resource attributes
    MissingResource(EventKind),
    /// Resource attributes could not be decoded
    DecodeFailed(ContractError),
}

/// Classify a resource change envelope
///
/// Kind lookup happens first, so unknown resource types never pay for a
/// decode attempt. Container names are split while decoding.
pub fn classify(envelope: &RawEnvelope, wanted: &HashSet<EventKind>) -> Classification {
    let Some(kind) = EventKind::from_resource_type(&envelope.resource_type) else {
        return Classification::UnknownKind;
    };

    if !wanted.contains(&kind) {
        return Classification::Unwanted(kind);
    }

    let Some(resource) = envelope.resource() else {
        return Classification::MissingResource(kind);
    };

    match Event::new(envelope.id.clone(), kind, resource) {
        Ok(event) => Classification::Event(event),
        Err(e) => Classification::DecodeFailed(e),
    }
}
