//! Plugin trait - Dispatcher output interface
//!
//! Defines the capability every event consumer implements.

use async_trait::async_trait;

use crate::{ContractError, Event};

/// Event consumer capability
///
/// One instance is shared by every worker of its runner, so all methods
/// take `&self`; implementations needing mutable state use interior
/// mutability. The event kinds a plugin accepts are declared when it is
/// registered, not by the plugin itself.
#[async_trait]
pub trait Plugin: Send + Sync + 'static {
    /// Plugin name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Called once before any event is delivered
    ///
    /// # Errors
    /// A failure is fatal and aborts startup.
    async fn init(&self) -> Result<(), ContractError>;

    /// Process one delivered event
    ///
    /// # Errors
    /// Failures are counted and logged by the runner; the next event is
    /// still delivered.
    async fn process(&self, event: &Event) -> Result<(), ContractError>;

    /// Called once at shutdown, after every worker has exited
    async fn close(&self) -> Result<(), ContractError>;
}
