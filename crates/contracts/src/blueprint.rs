//! BridgeBlueprint - Config Loader output
//!
//! Describes the complete bridge configuration: global defaults, the
//! optional replay source and the plugin runners to build.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Default per-runner queue capacity
pub const DEFAULT_QUEUE_CAPACITY: usize = 50;

/// Default per-runner worker count
pub const DEFAULT_WORKER_COUNT: usize = 1;

/// Default capacity of the source -> dispatcher channel
pub const DEFAULT_EVENT_BUFFER: usize = 100;

/// Complete bridge configuration blueprint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeBlueprint {
    /// Global settings and defaults
    #[serde(default)]
    pub agent: AgentConfig,

    /// Replay source settings (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceConfig>,

    /// Plugin runner definitions, in registration order
    #[serde(default)]
    pub plugins: Vec<PluginConfig>,
}

/// Global settings and per-runner defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Capacity of the channel between event source and dispatcher
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    /// Default queue capacity for every runner
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Default worker count for every runner
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            event_buffer: DEFAULT_EVENT_BUFFER,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            worker_count: DEFAULT_WORKER_COUNT,
        }
    }
}

fn default_event_buffer() -> usize {
    DEFAULT_EVENT_BUFFER
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_worker_count() -> usize {
    DEFAULT_WORKER_COUNT
}

/// Replay source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// JSON-lines file of raw envelopes
    pub replay_path: PathBuf,

    /// Delay between two replayed envelopes (milliseconds)
    #[serde(default)]
    pub interval_ms: u64,

    /// Restart from the first envelope when the file is exhausted
    #[serde(default)]
    pub loop_playback: bool,
}

/// Plugin runner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Runner name, unique across the configuration
    pub name: String,

    /// Registered plugin type (e.g. "log", "file")
    pub plugin: String,

    /// Queue capacity override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_capacity: Option<usize>,

    /// Worker count override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_count: Option<usize>,

    /// Plugin specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

impl PluginConfig {
    /// Queue capacity after applying the global default
    pub fn resolved_queue_capacity(&self, agent: &AgentConfig) -> usize {
        self.queue_capacity.unwrap_or(agent.queue_capacity)
    }

    /// Worker count after applying the global default
    pub fn resolved_worker_count(&self, agent: &AgentConfig) -> usize {
        self.worker_count.unwrap_or(agent.worker_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_fall_back_to_agent_defaults() {
        let agent = AgentConfig {
            queue_capacity: 10,
            worker_count: 3,
            ..Default::default()
        };
        let plugin: PluginConfig =
            serde_json::from_str(r#"{ "name": "audit", "plugin": "file", "queue_capacity": 99 }"#)
                .unwrap();

        assert_eq!(plugin.resolved_queue_capacity(&agent), 99);
        assert_eq!(plugin.resolved_worker_count(&agent), 3);
        assert!(plugin.params.is_empty());
    }

    #[test]
    fn test_blueprint_defaults() {
        let blueprint: BridgeBlueprint = serde_json::from_str(r#"{ "plugins": [] }"#).unwrap();
        assert_eq!(blueprint.agent.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert_eq!(blueprint.agent.worker_count, DEFAULT_WORKER_COUNT);
        assert_eq!(blueprint.agent.event_buffer, DEFAULT_EVENT_BUFFER);
        assert!(blueprint.source.is_none());
    }
}
