//! `validate` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use contracts::BridgeBlueprint;
use dispatcher::PluginRegistry;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    event_buffer: usize,
    queue_capacity: usize,
    worker_count: usize,
    plugins: Vec<PluginSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    replay_path: Option<String>,
}

#[derive(Serialize)]
struct PluginSummary {
    name: String,
    plugin: String,
    queue_capacity: usize,
    worker_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let registry = PluginRegistry::with_builtins();
    let result = validate_config(args, &registry);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs, registry: &PluginRegistry) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    let blueprint = match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => blueprint,
        Err(e) => {
            return ValidationResult {
                valid: false,
                config_path,
                error: Some(e.to_string()),
                warnings: None,
                summary: None,
            }
        }
    };

    // Unknown plugin types would fail at startup, so they are errors here too
    if let Err(e) = registry.resolve(&blueprint) {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        };
    }

    let warnings = collect_warnings(&blueprint);
    ValidationResult {
        valid: true,
        config_path,
        error: None,
        warnings: if warnings.is_empty() {
            None
        } else {
            Some(warnings)
        },
        summary: Some(summarize(&blueprint)),
    }
}

fn summarize(blueprint: &BridgeBlueprint) -> ConfigSummary {
    let agent = &blueprint.agent;
    ConfigSummary {
        event_buffer: agent.event_buffer,
        queue_capacity: agent.queue_capacity,
        worker_count: agent.worker_count,
        plugins: blueprint
            .plugins
            .iter()
            .map(|p| PluginSummary {
                name: p.name.clone(),
                plugin: p.plugin.clone(),
                queue_capacity: p.resolved_queue_capacity(agent),
                worker_count: p.resolved_worker_count(agent),
            })
            .collect(),
        replay_path: blueprint
            .source
            .as_ref()
            .map(|s| s.replay_path.display().to_string()),
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &BridgeBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.source.is_none() {
        warnings.push("No [source] section - `run` needs --replay".to_string());
    }

    if let Some(source) = &blueprint.source {
        if !source.replay_path.exists() {
            warnings.push(format!(
                "Replay file '{}' does not exist",
                source.replay_path.display()
            ));
        }
    }

    for plugin in &blueprint.plugins {
        if plugin.plugin == "file" && !plugin.params.contains_key("path") {
            warnings.push(format!(
                "Plugin '{}' has no 'path' parameter and will fail to start",
                plugin.name
            ));
        }
        if plugin.plugin == "webhook"
            && !plugin.params.contains_key("url")
            && !plugin.params.contains_key("webhookurl")
        {
            warnings.push(format!(
                "Plugin '{}' has no 'url' parameter and will fail to start",
                plugin.name
            ));
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Event buffer: {}", summary.event_buffer);
            println!(
                "  Defaults: queue_capacity={}, worker_count={}",
                summary.queue_capacity, summary.worker_count
            );
            if let Some(ref path) = summary.replay_path {
                println!("  Replay: {}", path);
            }
            println!("  Plugins ({}):", summary.plugins.len());
            for p in &summary.plugins {
                println!(
                    "    - {} ({}) capacity={} workers={}",
                    p.name, p.plugin, p.queue_capacity, p.worker_count
                );
            }
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate_content(content: &str) -> ValidationResult {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.toml");
        std::fs::write(&path, content).unwrap();

        let args = ValidateArgs {
            config: path,
            json: false,
        };
        validate_config(&args, &PluginRegistry::with_builtins())
    }

    #[test]
    fn test_valid_config_with_warnings() {
        let result = validate_content(
            r#"
[agent]
queue_capacity = 10

[[plugins]]
name = "audit"
plugin = "file"
worker_count = 3
"#,
        );

        assert!(result.valid);
        let summary = result.summary.unwrap();
        assert_eq!(summary.plugins[0].queue_capacity, 10);
        assert_eq!(summary.plugins[0].worker_count, 3);

        let warnings = result.warnings.unwrap();
        assert!(warnings.iter().any(|w| w.contains("no 'path' parameter")));
        assert!(warnings.iter().any(|w| w.contains("No [source] section")));
    }

    #[test]
    fn test_unknown_plugin_type_is_invalid() {
        let result = validate_content("[[plugins]]\nname = \"pager\"\nplugin = \"pagerduty\"\n");
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("pagerduty"));
    }

    #[test]
    fn test_webhook_without_url_warns() {
        let result = validate_content("[[plugins]]\nname = \"chat\"\nplugin = \"webhook\"\n");
        assert!(result.valid);
        let warnings = result.warnings.unwrap();
        assert!(warnings.iter().any(|w| w.contains("'chat' has no 'url'")));
    }

    #[test]
    fn test_missing_file() {
        let args = ValidateArgs {
            config: "does-not-exist.toml".into(),
            json: true,
        };
        let result = validate_config(&args, &PluginRegistry::with_builtins());
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("File not found"));
    }
}
