//! PluginRegistry - plugin type name -> factory
//!
//! Built once at startup and passed by reference to whatever resolves the
//! configuration. The accepted event kinds are part of the registration,
//! not of the user configuration.

use std::collections::BTreeMap;
use std::sync::Arc;

use contracts::{BridgeBlueprint, ContractError, EventKind, Plugin, PluginConfig};
use tracing::{debug, instrument};

use crate::error::{DispatcherError, Result};
use crate::plugins::{FilePlugin, LogPlugin, WebhookPlugin, WEBHOOK_KINDS};
use crate::runner::PluginRunner;

/// Builds a plugin instance from its configuration block
pub type PluginFactory =
    Box<dyn Fn(&PluginConfig) -> std::result::Result<Arc<dyn Plugin>, ContractError> + Send + Sync>;

struct Registration {
    kinds: Vec<EventKind>,
    factory: PluginFactory,
}

/// Explicit plugin registry
#[derive(Default)]
pub struct PluginRegistry {
    entries: BTreeMap<String, Registration>,
}

impl PluginRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in `log`, `file` and `webhook` plugins
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.insert("log".to_string(), EventKind::ALL, |config| {
            Ok(Arc::new(LogPlugin::new(&config.name)))
        });
        registry.insert("file".to_string(), EventKind::ALL, |config| {
            Ok(Arc::new(FilePlugin::from_params(&config.name, &config.params)))
        });
        registry.insert("webhook".to_string(), WEBHOOK_KINDS, |config| {
            Ok(Arc::new(WebhookPlugin::from_params(&config.name, &config.params)?))
        });
        registry
    }

    /// Register a plugin type
    ///
    /// # Errors
    /// Returns `DuplicatePlugin` if the type is already registered.
    pub fn register<F>(
        &mut self,
        plugin_type: impl Into<String>,
        kinds: impl IntoIterator<Item = EventKind>,
        factory: F,
    ) -> Result<()>
    where
        F: Fn(&PluginConfig) -> std::result::Result<Arc<dyn Plugin>, ContractError>
            + Send
            + Sync
            + 'static,
    {
        let plugin_type = plugin_type.into();
        if self.entries.contains_key(&plugin_type) {
            return Err(DispatcherError::DuplicatePlugin {
                plugin: plugin_type,
            });
        }

        self.insert(plugin_type, kinds, factory);
        Ok(())
    }

    fn insert<F>(
        &mut self,
        plugin_type: String,
        kinds: impl IntoIterator<Item = EventKind>,
        factory: F,
    ) where
        F: Fn(&PluginConfig) -> std::result::Result<Arc<dyn Plugin>, ContractError>
            + Send
            + Sync
            + 'static,
    {
        let mut kinds: Vec<_> = kinds.into_iter().collect();
        kinds.sort_unstable();
        kinds.dedup();

        debug!(plugin = %plugin_type, kinds = ?kinds, "plugin type registered");
        self.entries.insert(
            plugin_type,
            Registration {
                kinds,
                factory: Box::new(factory),
            },
        );
    }

    /// Registered plugin types with their kinds, sorted by type
    pub fn list(&self) -> Vec<(&str, &[EventKind])> {
        self.entries
            .iter()
            .map(|(name, reg)| (name.as_str(), reg.kinds.as_slice()))
            .collect()
    }

    /// Kinds accepted by a plugin type
    pub fn kinds(&self, plugin_type: &str) -> Option<&[EventKind]> {
        self.entries.get(plugin_type).map(|reg| reg.kinds.as_slice())
    }

    pub fn contains(&self, plugin_type: &str) -> bool {
        self.entries.contains_key(plugin_type)
    }

    /// Build one runner from its configuration block
    ///
    /// # Errors
    /// - `UnknownPlugin` if the type is not registered
    /// - `PluginCreation` if the factory fails
    pub fn build(&self, config: &PluginConfig, blueprint: &BridgeBlueprint) -> Result<PluginRunner> {
        let reg = self
            .entries
            .get(&config.plugin)
            .ok_or_else(|| DispatcherError::UnknownPlugin {
                name: config.name.clone(),
                plugin: config.plugin.clone(),
            })?;

        let plugin = (reg.factory)(config)
            .map_err(|e| DispatcherError::plugin_creation(&config.name, e))?;

        Ok(PluginRunner::new(
            &config.name,
            plugin,
            reg.kinds.iter().copied(),
            config.resolved_queue_capacity(&blueprint.agent),
            config.resolved_worker_count(&blueprint.agent),
        ))
    }

    /// Build every configured runner, in configuration order
    ///
    /// # Errors
    /// Returns the first build failure.
    #[instrument(
        name = "registry_resolve",
        skip(self, blueprint),
        fields(plugins = blueprint.plugins.len())
    )]
    pub fn resolve(&self, blueprint: &BridgeBlueprint) -> Result<Vec<Arc<PluginRunner>>> {
        blueprint
            .plugins
            .iter()
            .map(|config| self.build(config, blueprint).map(Arc::new))
            .collect()
    }
}
