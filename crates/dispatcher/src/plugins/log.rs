//! LogPlugin - logs every event via tracing

use async_trait::async_trait;
use contracts::{ContractError, Event, Plugin};
use tracing::{info, instrument};

/// Plugin that logs a one-line summary of each event
pub struct LogPlugin {
    name: String,
}

impl LogPlugin {
    /// Create a new LogPlugin with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Plugin for LogPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    async fn init(&self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(
        name = "log_plugin_process",
        skip(self, event),
        fields(plugin = %self.name, event_id = %event.id)
    )]
    async fn process(&self, event: &Event) -> Result<(), ContractError> {
        info!(plugin = %self.name, kind = %event.kind(), "{}", event);
        Ok(())
    }

    async fn close(&self) -> Result<(), ContractError> {
        info!(plugin = %self.name, "LogPlugin closed");
        Ok(())
    }
}
