//! Configuration validation
//!
//! Rules:
//! - at least one plugin is configured
//! - plugin names are non-empty and unique
//! - plugin type is non-empty
//! - every capacity and worker count is > 0 (global defaults and overrides)

use std::collections::HashSet;

use contracts::{BridgeBlueprint, ContractError};

/// Validate a BridgeBlueprint
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(blueprint: &BridgeBlueprint) -> Result<(), ContractError> {
    validate_agent(blueprint)?;
    validate_plugin_presence(blueprint)?;
    validate_plugin_names(blueprint)?;
    validate_plugin_limits(blueprint)?;
    Ok(())
}

/// Validate global defaults
fn validate_agent(blueprint: &BridgeBlueprint) -> Result<(), ContractError> {
    let agent = &blueprint.agent;
    let limits = [
        ("agent.event_buffer", agent.event_buffer),
        ("agent.queue_capacity", agent.queue_capacity),
        ("agent.worker_count", agent.worker_count),
    ];
    for (field, value) in limits {
        if value == 0 {
            return Err(ContractError::config_validation(field, "must be > 0"));
        }
    }
    Ok(())
}

fn validate_plugin_presence(blueprint: &BridgeBlueprint) -> Result<(), ContractError> {
    if blueprint.plugins.is_empty() {
        return Err(ContractError::config_validation(
            "plugins",
            "no plugins configured",
        ));
    }
    Ok(())
}

/// Validate plugin name uniqueness and plugin type presence
fn validate_plugin_names(blueprint: &BridgeBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, plugin) in blueprint.plugins.iter().enumerate() {
        if plugin.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("plugins[{}].name", idx),
                "plugin name cannot be empty",
            ));
        }
        if plugin.plugin.is_empty() {
            return Err(ContractError::config_validation(
                format!("plugins[{}].plugin", plugin.name),
                "plugin type cannot be empty",
            ));
        }
        if !seen.insert(&plugin.name) {
            return Err(ContractError::config_validation(
                format!("plugins[name={}]", plugin.name),
                "duplicate plugin name",
            ));
        }
    }
    Ok(())
}

/// Validate per-plugin overrides
fn validate_plugin_limits(blueprint: &BridgeBlueprint) -> Result<(), ContractError> {
    for plugin in &blueprint.plugins {
        if plugin.queue_capacity == Some(0) {
            return Err(ContractError::config_validation(
                format!("plugins[{}].queue_capacity", plugin.name),
                "queue_capacity must be > 0",
            ));
        }
        if plugin.worker_count == Some(0) {
            return Err(ContractError::config_validation(
                format!("plugins[{}].worker_count", plugin.name),
                "worker_count must be > 0",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{AgentConfig, PluginConfig};

    fn minimal_blueprint() -> BridgeBlueprint {
        BridgeBlueprint {
            agent: AgentConfig::default(),
            source: None,
            plugins: vec![PluginConfig {
                name: "console".into(),
                plugin: "log".into(),
                queue_capacity: None,
                worker_count: None,
                params: Default::default(),
            }],
        }
    }

    #[test]
    fn test_valid_config() {
        let bp = minimal_blueprint();
        assert!(validate(&bp).is_ok());
    }

    #[test]
    fn test_no_plugins() {
        let mut bp = minimal_blueprint();
        bp.plugins.clear();
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("no plugins configured"), "got: {err}");
    }

    #[test]
    fn test_duplicate_plugin_name() {
        let mut bp = minimal_blueprint();
        bp.plugins.push(bp.plugins[0].clone());
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("duplicate plugin name"), "got: {err}");
    }

    #[test]
    fn test_empty_plugin_name() {
        let mut bp = minimal_blueprint();
        bp.plugins[0].name = String::new();
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("cannot be empty"), "got: {err}");
    }

    #[test]
    fn test_empty_plugin_type() {
        let mut bp = minimal_blueprint();
        bp.plugins[0].plugin = String::new();
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("plugin type cannot be empty"), "got: {err}");
    }

    #[test]
    fn test_zero_queue_capacity_override() {
        let mut bp = minimal_blueprint();
        bp.plugins[0].queue_capacity = Some(0);
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("queue_capacity must be > 0"), "got: {err}");
    }

    #[test]
    fn test_zero_global_worker_count() {
        let mut bp = minimal_blueprint();
        bp.agent.worker_count = 0;
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("agent.worker_count"), "got: {err}");
    }
}
