//! Replay event source
//!
//! Plays back recorded envelopes from a JSON-lines file, one envelope per
//! line, on a dedicated thread. Used by the CLI when no live stream is
//! available and by end-to-end tests.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use async_trait::async_trait;
use contracts::{ContractError, EventSource, HandlerMap, RawEnvelope, SourceConfig};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::error::{IngestionError, Result};

/// Replay playback settings
#[derive(Debug, Clone, Default)]
pub struct ReplayConfig {
    /// Delay between two envelopes
    pub interval: Duration,
    /// Restart from the first envelope when exhausted
    pub loop_playback: bool,
}

impl From<&SourceConfig> for ReplayConfig {
    fn from(source: &SourceConfig) -> Self {
        Self {
            interval: Duration::from_millis(source.interval_ms),
            loop_playback: source.loop_playback,
        }
    }
}

/// Replay event source
pub struct ReplayEventSource {
    name: String,
    envelopes: Arc<Vec<RawEnvelope>>,
    config: ReplayConfig,
    listening: Arc<AtomicBool>,
    finished: Arc<Notify>,
    thread_handle: Mutex<Option<JoinHandle<()>>>,
}

impl ReplayEventSource {
    /// Load envelopes from a JSON-lines file
    ///
    /// # Errors
    /// Returns `ReplayLoad` if the file cannot be read or a line is not a
    /// valid envelope.
    pub fn load(path: &Path, config: ReplayConfig) -> Result<Self> {
        let file = File::open(path).map_err(|e| replay_error(path, e))?;
        let reader = BufReader::new(file);

        let mut envelopes = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| replay_error(path, e))?;
            if line.trim().is_empty() {
                continue;
            }

            let envelope: RawEnvelope = serde_json::from_str(&line)
                .map_err(|e| replay_error(path, format!("line {}: {}", idx + 1, e)))?;
            envelopes.push(envelope);
        }

        info!(
            path = %path.display(),
            envelopes = envelopes.len(),
            "loaded replay file"
        );

        Ok(Self::from_envelopes(
            path.display().to_string(),
            envelopes,
            config,
        ))
    }

    /// Build a replay source from in-memory envelopes
    pub fn from_envelopes(
        name: impl Into<String>,
        envelopes: Vec<RawEnvelope>,
        config: ReplayConfig,
    ) -> Self {
        Self {
            name: name.into(),
            envelopes: Arc::new(envelopes),
            config,
            listening: Arc::new(AtomicBool::new(false)),
            finished: Arc::new(Notify::new()),
            thread_handle: Mutex::new(None),
        }
    }

    /// Number of loaded envelopes
    pub fn len(&self) -> usize {
        self.envelopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.envelopes.is_empty()
    }

    /// Resolves once a non-looping playback has delivered every envelope
    pub async fn finished(&self) {
        self.finished.notified().await;
    }

    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Relaxed)
    }
}

fn replay_error(path: &Path, message: impl ToString) -> IngestionError {
    IngestionError::ReplayLoad {
        path: PathBuf::from(path).display().to_string(),
        message: message.to_string(),
    }
}

/// Playback loop, run on the replay thread
fn play(
    name: &str,
    envelopes: &[RawEnvelope],
    handlers: &HandlerMap,
    config: &ReplayConfig,
    listening: &AtomicBool,
) {
    if envelopes.is_empty() {
        warn!(source = %name, "no envelopes to replay");
        return;
    }

    loop {
        for envelope in envelopes {
            if !listening.load(Ordering::Relaxed) {
                debug!(source = %name, "replay stopped");
                return;
            }

            match handlers.get(&envelope.name) {
                Some(handler) => handler(envelope.clone()),
                None => debug!(source = %name, name = %envelope.name, "no handler for envelope"),
            }

            if !config.interval.is_zero() {
                // Woken early by `stop`
                thread::park_timeout(config.interval);
            }
        }

        if !config.loop_playback {
            info!(source = %name, "replay completed");
            return;
        }
        debug!(source = %name, "looping replay");
    }
}

#[async_trait]
impl EventSource for ReplayEventSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn subscribe(&self, handlers: HandlerMap) -> std::result::Result<(), ContractError> {
        if self.listening.swap(true, Ordering::SeqCst) {
            return Err(ContractError::source_connection(format!(
                "replay source '{}' is already subscribed",
                self.name
            )));
        }

        let name = self.name.clone();
        let envelopes = self.envelopes.clone();
        let config = self.config.clone();
        let listening = self.listening.clone();
        let finished = self.finished.clone();

        let handle = thread::Builder::new()
            .name("replay-source".to_string())
            .spawn(move || {
                debug!(source = %name, "replay thread started");
                play(&name, &envelopes, &handlers, &config, &listening);
                listening.store(false, Ordering::SeqCst);
                finished.notify_one();
            })
            .map_err(|e| {
                self.listening.store(false, Ordering::SeqCst);
                ContractError::source_connection(format!("failed to spawn replay thread: {e}"))
            })?;

        let mut guard = self.thread_handle.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some(handle);
        Ok(())
    }

    async fn stop(&self) -> std::result::Result<(), ContractError> {
        self.listening.store(false, Ordering::SeqCst);

        let handle = {
            let mut guard = self.thread_handle.lock().unwrap_or_else(|e| e.into_inner());
            guard.take()
        };

        if let Some(handle) = handle {
            handle.thread().unpark();
            tokio::task::spawn_blocking(move || handle.join())
                .await
                .map_err(|e| ContractError::Other(format!("replay join failed: {e}")))?
                .map_err(|_| ContractError::Other("replay thread panicked".to_string()))?;
        }
        Ok(())
    }
}
