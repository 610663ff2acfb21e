//! `plugins` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;

use dispatcher::PluginRegistry;

use crate::cli::PluginsArgs;

#[derive(Serialize)]
struct PluginInfo {
    plugin: String,
    kinds: Vec<String>,
}

/// Execute the `plugins` command
pub fn run_plugins(args: &PluginsArgs) -> Result<()> {
    let registry = PluginRegistry::with_builtins();
    let plugins = describe(&registry);

    if args.json {
        let json =
            serde_json::to_string_pretty(&plugins).context("Failed to serialize plugin list")?;
        println!("{}", json);
    } else {
        println!("Registered plugins ({}):", plugins.len());
        for p in &plugins {
            println!("  - {} [{}]", p.plugin, p.kinds.join(", "));
        }
    }

    Ok(())
}

fn describe(registry: &PluginRegistry) -> Vec<PluginInfo> {
    registry
        .list()
        .into_iter()
        .map(|(plugin, kinds)| PluginInfo {
            plugin: plugin.to_string(),
            kinds: kinds.iter().map(ToString::to_string).collect(),
        })
        .collect()
}
