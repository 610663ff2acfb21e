//! Resource payloads - kind-specific event data
//!
//! Decoded from the resource attributes of a raw envelope. Decoding is
//! lenient: attribute names are camelCase, a missing or `null` attribute
//! falls back to the field's default, and scalars are weakly typed
//! (`"3"` decodes into an integer, `7` into a string, `"false"` into a bool).

use std::collections::HashMap;
use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Treat an explicit `null` the same as a missing attribute
fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

fn scalar_to_string(value: Value) -> Result<String, String> {
    match value {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(if b { "1" } else { "0" }.to_string()),
        other => Err(format!("expected a string, found {other}")),
    }
}

fn scalar_to_i64(value: &Value) -> Result<i64, String> {
    match value {
        Value::Null => Ok(0),
        Value::Bool(b) => Ok(i64::from(*b)),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| {
                // Fractions are truncated
                n.as_f64()
                    .map(f64::trunc)
                    .filter(|f| *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
                    .map(|f| f as i64)
            })
            .ok_or_else(|| format!("{n} does not fit an integer")),
        Value::String(s) if s.trim().is_empty() => Ok(0),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|e| format!("cannot parse '{s}' as an integer: {e}")),
        other => Err(format!("expected an integer, found {other}")),
    }
}

fn scalar_to_bool(value: &Value) -> Result<bool, String> {
    match value {
        Value::Null => Ok(false),
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => Ok(n.as_f64().is_some_and(|f| f != 0.0)),
        Value::String(s) => match s.trim() {
            "" | "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
            "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
            other => Err(format!("cannot parse '{other}' as a bool")),
        },
        other => Err(format!("expected a bool, found {other}")),
    }
}

/// String field accepting numbers and bools
fn weak_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?.unwrap_or_default();
    scalar_to_string(value).map_err(D::Error::custom)
}

/// Integer field accepting numeric strings, bools and fractions
fn weak_int<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<i64>,
{
    let value = Option::<Value>::deserialize(deserializer)?.unwrap_or_default();
    let n = scalar_to_i64(&value).map_err(D::Error::custom)?;
    T::try_from(n).map_err(|_| D::Error::custom(format!("{n} is out of range")))
}

/// Bool field accepting `"true"`/`"false"`-style strings and numbers
fn weak_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?.unwrap_or_default();
    scalar_to_bool(&value).map_err(D::Error::custom)
}

/// String map whose values may be any scalar
fn weak_string_map<'de, D>(deserializer: D) -> Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<HashMap<String, Value>>::deserialize(deserializer)?
        .unwrap_or_default()
        .into_iter()
        .map(|(key, value)| {
            scalar_to_string(value)
                .map(|value| (key, value))
                .map_err(D::Error::custom)
        })
        .collect()
}

/// String list; a lone scalar becomes a one-element list
fn weak_string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(scalar) => vec![scalar],
    };
    items
        .into_iter()
        .map(|item| scalar_to_string(item).map_err(D::Error::custom))
        .collect()
}

/// Resource lifecycle state
///
/// Services and hosts share the `inactive`/`activating`/`active` names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstanceState {
    Inactive,
    Activating,
    Active,
    UpdatingActive,
    UpdatingInactive,
    Upgraded,
    Stopping,
    Stopped,
    Starting,
    Running,
    Restarting,
    Removed,
    Purged,
    #[default]
    #[serde(other)]
    Unknown,
}

impl InstanceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::Activating => "activating",
            Self::Active => "active",
            Self::UpdatingActive => "updating-active",
            Self::UpdatingInactive => "updating-inactive",
            Self::Upgraded => "upgraded",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Restarting => "restarting",
            Self::Removed => "removed",
            Self::Purged => "purged",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resource health state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HealthState {
    Healthy,
    Unhealthy,
    UpdatingHealthy,
    UpdatingUnhealthy,
    Reconcile,
    Initializing,
    Reinitializing,
    /// Service only
    Degraded,
    /// Service only
    StartedOnce,
    #[default]
    #[serde(other)]
    Unknown,
}

impl HealthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Unhealthy => "unhealthy",
            Self::UpdatingHealthy => "updating-healthy",
            Self::UpdatingUnhealthy => "updating-unhealthy",
            Self::Reconcile => "reconcile",
            Self::Initializing => "initializing",
            Self::Reinitializing => "reinitializing",
            Self::Degraded => "degraded",
            Self::StartedOnce => "started-once",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Container resource
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Container {
    #[serde(deserialize_with = "weak_string")]
    pub id: String,
    #[serde(deserialize_with = "weak_string")]
    pub uuid: String,
    #[serde(deserialize_with = "weak_string")]
    pub version: String,
    /// Display name; `<service>_<instance>` once split
    #[serde(deserialize_with = "weak_string")]
    pub name: String,
    #[serde(deserialize_with = "weak_string")]
    pub description: String,
    #[serde(deserialize_with = "weak_string")]
    pub service_name: String,
    #[serde(deserialize_with = "weak_string")]
    pub stack_name: String,
    #[serde(deserialize_with = "null_default")]
    pub state: InstanceState,
    #[serde(deserialize_with = "null_default")]
    pub health_state: HealthState,
    #[serde(deserialize_with = "weak_bool")]
    pub removed: bool,
    #[serde(deserialize_with = "weak_string_map")]
    pub environment: HashMap<String, String>,
    #[serde(deserialize_with = "weak_string_map")]
    pub labels: HashMap<String, String>,
    #[serde(deserialize_with = "null_default")]
    pub metadata: HashMap<String, serde_json::Value>,
    #[serde(deserialize_with = "weak_string")]
    pub primary_ip_address: String,
    #[serde(deserialize_with = "weak_string_list")]
    pub ports: Vec<String>,
    #[serde(deserialize_with = "weak_string")]
    pub image_uuid: String,
    #[serde(deserialize_with = "weak_string")]
    pub host_id: String,
    #[serde(deserialize_with = "weak_int")]
    pub create_index: i64,
}

impl Container {
    /// Split a composite `<stack>_<service>_<instance>` name
    ///
    /// Names without exactly three underscore-delimited segments are left
    /// untouched. The instance segment keeps any further underscores.
    pub fn split_composite_name(&mut self) {
        let mut parts = self.name.splitn(3, '_');
        let (Some(stack), Some(service), Some(instance)) = (parts.next(), parts.next(), parts.next())
        else {
            return;
        };

        let display = format!("{service}_{instance}");
        self.stack_name = stack.to_string();
        self.service_name = service.to_string();
        self.name = display;
    }
}

/// Host resource
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Host {
    #[serde(deserialize_with = "weak_string")]
    pub id: String,
    #[serde(deserialize_with = "weak_string")]
    pub uuid: String,
    #[serde(deserialize_with = "weak_string")]
    pub name: String,
    #[serde(deserialize_with = "weak_string")]
    pub description: String,
    #[serde(deserialize_with = "null_default")]
    pub state: InstanceState,
    #[serde(deserialize_with = "weak_string")]
    pub agent_state: String,
    #[serde(deserialize_with = "weak_bool")]
    pub removed: bool,
    #[serde(deserialize_with = "weak_string_map")]
    pub labels: HashMap<String, String>,
    #[serde(deserialize_with = "weak_string")]
    pub hostname: String,
    #[serde(deserialize_with = "null_default")]
    pub public_endpoints: Vec<Endpoint>,
}

/// Published host endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Endpoint {
    #[serde(deserialize_with = "weak_string")]
    pub ip_address: String,
    #[serde(deserialize_with = "weak_int")]
    pub port: u16,
}

/// Service resource
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Service {
    #[serde(deserialize_with = "weak_string")]
    pub id: String,
    #[serde(deserialize_with = "weak_string")]
    pub uuid: String,
    #[serde(deserialize_with = "weak_string")]
    pub version: String,
    #[serde(deserialize_with = "weak_string")]
    pub name: String,
    #[serde(deserialize_with = "weak_string")]
    pub description: String,
    #[serde(deserialize_with = "weak_int")]
    pub scale: i64,
    #[serde(deserialize_with = "null_default")]
    pub state: InstanceState,
    #[serde(deserialize_with = "null_default")]
    pub health_state: HealthState,
    #[serde(deserialize_with = "weak_bool")]
    pub removed: bool,
    #[serde(deserialize_with = "null_default")]
    pub metadata: HashMap<String, serde_json::Value>,
    #[serde(deserialize_with = "weak_string")]
    pub fqdn: String,
    #[serde(deserialize_with = "weak_string")]
    pub vip: String,
    #[serde(deserialize_with = "weak_int")]
    pub create_index: i64,
}

/// Stack resource (reported as `environment` by older APIs)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Stack {
    #[serde(deserialize_with = "weak_string")]
    pub id: String,
    #[serde(deserialize_with = "weak_string")]
    pub uuid: String,
    #[serde(deserialize_with = "weak_string")]
    pub name: String,
    #[serde(deserialize_with = "weak_string")]
    pub description: String,
    #[serde(deserialize_with = "null_default")]
    pub state: InstanceState,
    #[serde(deserialize_with = "null_default")]
    pub health_state: HealthState,
    #[serde(deserialize_with = "weak_bool")]
    pub removed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_split_composite_name() {
        let mut container = Container {
            name: "myapp_web_1".to_string(),
            ..Default::default()
        };
        container.split_composite_name();

        assert_eq!(container.stack_name, "myapp");
        assert_eq!(container.service_name, "web");
        assert_eq!(container.name, "web_1");
    }

    #[test]
    fn test_split_leaves_short_names() {
        for name in ["standalone", "web_1", ""] {
            let mut container = Container {
                name: name.to_string(),
                ..Default::default()
            };
            container.split_composite_name();

            assert_eq!(container.name, name);
            assert!(container.stack_name.is_empty());
            assert!(container.service_name.is_empty());
        }
    }

    #[test]
    fn test_split_keeps_extra_underscores_in_instance() {
        let mut container = Container {
            name: "myapp_web_sidekick_2".to_string(),
            ..Default::default()
        };
        container.split_composite_name();

        assert_eq!(container.stack_name, "myapp");
        assert_eq!(container.service_name, "web");
        assert_eq!(container.name, "web_sidekick_2");
    }

    #[test]
    fn test_lenient_decode_nulls_and_unknown_states() {
        let data = json!({
            "id": "1i42",
            "name": null,
            "state": "exploding",
            "healthState": null,
            "primaryIpAddress": "10.42.0.7",
            "ports": null,
            "createIndex": 3,
            "unmodelled": { "nested": true }
        });

        let container: Container = serde_json::from_value(data).unwrap();
        assert_eq!(container.id, "1i42");
        assert_eq!(container.name, "");
        assert_eq!(container.state, InstanceState::Unknown);
        assert_eq!(container.health_state, HealthState::Unknown);
        assert_eq!(container.primary_ip_address, "10.42.0.7");
        assert!(container.ports.is_empty());
        assert_eq!(container.create_index, 3);
    }

    #[test]
    fn test_weakly_typed_scalars() {
        let service: Service = serde_json::from_value(json!({
            "name": 42,
            "scale": "3",
            "removed": "false",
            "createIndex": 7.9
        }))
        .unwrap();
        assert_eq!(service.name, "42");
        assert_eq!(service.scale, 3);
        assert!(!service.removed);
        assert_eq!(service.create_index, 7);

        let container: Container = serde_json::from_value(json!({
            "createIndex": "7",
            "removed": 1,
            "labels": { "io.rancher.scale": 2, "io.rancher.global": true },
            "ports": "8080:80/tcp"
        }))
        .unwrap();
        assert_eq!(container.create_index, 7);
        assert!(container.removed);
        assert_eq!(container.labels["io.rancher.scale"], "2");
        assert_eq!(container.labels["io.rancher.global"], "1");
        assert_eq!(container.ports, ["8080:80/tcp"]);

        let endpoint: Endpoint =
            serde_json::from_value(json!({ "ipAddress": "10.0.0.1", "port": "80" })).unwrap();
        assert_eq!(endpoint.port, 80);
    }

    #[test]
    fn test_weak_decoding_still_rejects_garbage() {
        assert!(serde_json::from_value::<Service>(json!({ "scale": "three" })).is_err());
        assert!(serde_json::from_value::<Endpoint>(json!({ "port": "70000" })).is_err());
        assert!(serde_json::from_value::<Stack>(json!({ "removed": "maybe" })).is_err());
        assert!(serde_json::from_value::<Host>(json!({ "name": { "nested": 1 } })).is_err());
    }

    #[test]
    fn test_state_names() {
        let state: InstanceState = serde_json::from_value(json!("updating-active")).unwrap();
        assert_eq!(state, InstanceState::UpdatingActive);
        assert_eq!(state.to_string(), "updating-active");

        let health: HealthState = serde_json::from_value(json!("started-once")).unwrap();
        assert_eq!(health, HealthState::StartedOnce);
        assert_eq!(HealthState::default().to_string(), "unknown");
    }
}
