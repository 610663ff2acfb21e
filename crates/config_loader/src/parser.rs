//! Configuration parsing
//!
//! TOML (primary) and JSON, with `${VAR}` expansion from the process
//! environment applied before parsing.

use contracts::{BridgeBlueprint, ContractError};

/// Configuration file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML (recommended)
    Toml,
    /// JSON
    Json,
}

impl ConfigFormat {
    /// Infer format from a file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Expand `$VAR` / `${VAR}` references from the process environment
///
/// An unset variable is a parse error rather than a silent empty string.
pub fn expand_env(content: &str) -> Result<String, ContractError> {
    shellexpand::env(content)
        .map(|expanded| expanded.into_owned())
        .map_err(|e| ContractError::ConfigParse {
            message: format!("environment expansion error: {e}"),
            source: Some(Box::new(e)),
        })
}

/// Parse TOML configuration
pub fn parse_toml(content: &str) -> Result<BridgeBlueprint, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Parse JSON configuration
pub fn parse_json(content: &str) -> Result<BridgeBlueprint, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Expand environment references, then parse according to format
pub fn parse(content: &str, format: ConfigFormat) -> Result<BridgeBlueprint, ContractError> {
    let content = expand_env(content)?;
    match format {
        ConfigFormat::Toml => parse_toml(&content),
        ConfigFormat::Json => parse_json(&content),
    }
}
