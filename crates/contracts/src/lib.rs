//! # Contracts
//!
//! Frozen interface contracts shared by every eventbridge crate: the
//! canonical event model, the plugin capability, the event source
//! collaborator and the configuration blueprint.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Event Model
//! - One `Event` per resource change, immutable once built
//! - `EventKind` is derived from the payload variant, so the two can never disagree

mod blueprint;
mod error;
mod event;
mod event_source;
mod plugin;
mod resource;

pub use blueprint::*;
pub use error::*;
pub use event::*;
pub use event_source::*;
pub use plugin::Plugin;
pub use resource::*;
