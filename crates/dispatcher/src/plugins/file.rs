//! FilePlugin - appends events to a JSON-lines file

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use contracts::{ContractError, Event, Plugin};
use tracing::{debug, instrument};

/// Configuration for FilePlugin
#[derive(Debug, Clone, Default)]
pub struct FilePluginConfig {
    /// Output file; required before `init`
    pub path: Option<PathBuf>,
}

impl FilePluginConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        Self {
            path: params.get("path").map(PathBuf::from),
        }
    }
}

/// Plugin that writes one JSON line per event
///
/// Workers of the same runner share the writer; each line is written under
/// the lock, so lines never interleave.
pub struct FilePlugin {
    name: String,
    config: FilePluginConfig,
    writer: Mutex<Option<BufWriter<File>>>,
}

impl FilePlugin {
    /// Create a new FilePlugin
    pub fn new(name: impl Into<String>, config: FilePluginConfig) -> Self {
        Self {
            name: name.into(),
            config,
            writer: Mutex::new(None),
        }
    }

    /// Create from params map (for factory)
    pub fn from_params(name: impl Into<String>, params: &HashMap<String, String>) -> Self {
        Self::new(name, FilePluginConfig::from_params(params))
    }

    fn writer(&self) -> MutexGuard<'_, Option<BufWriter<File>>> {
        self.writer.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn open(&self) -> Result<BufWriter<File>, ContractError> {
        let path = self
            .config
            .path
            .as_ref()
            .ok_or_else(|| ContractError::plugin_init(&self.name, "missing 'path' parameter"))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| ContractError::plugin_init(&self.name, e.to_string()))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                ContractError::plugin_init(&self.name, format!("{}: {}", path.display(), e))
            })?;

        debug!(plugin = %self.name, path = %path.display(), "FilePlugin opened");
        Ok(BufWriter::new(file))
    }

    fn append(&self, event: &Event) -> std::io::Result<()> {
        let mut guard = self.writer();
        let writer = guard
            .as_mut()
            .ok_or_else(|| std::io::Error::other("file plugin is not open"))?;

        serde_json::to_writer(&mut *writer, event)?;
        writer.write_all(b"\n")
    }
}

#[async_trait]
impl Plugin for FilePlugin {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "file_plugin_init", skip(self), fields(plugin = %self.name))]
    async fn init(&self) -> Result<(), ContractError> {
        let writer = self.open()?;
        *self.writer() = Some(writer);
        Ok(())
    }

    #[instrument(
        name = "file_plugin_process",
        skip(self, event),
        fields(plugin = %self.name, event_id = %event.id)
    )]
    async fn process(&self, event: &Event) -> Result<(), ContractError> {
        self.append(event)
            .map_err(|e| ContractError::plugin_process(&self.name, e.to_string()))
    }

    #[instrument(name = "file_plugin_close", skip(self), fields(plugin = %self.name))]
    async fn close(&self) -> Result<(), ContractError> {
        let writer = self.writer().take();
        if let Some(mut writer) = writer {
            writer
                .flush()
                .map_err(|e| ContractError::plugin_close(&self.name, e.to_string()))?;
        }
        debug!(plugin = %self.name, "FilePlugin closed");
        Ok(())
    }
}
