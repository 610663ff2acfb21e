//! `run` command implementation.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use contracts::BridgeBlueprint;
use dispatcher::{Dispatcher, PluginRegistry};
use ingestion::{ReplayConfig, ReplayEventSource};

use crate::cli::RunArgs;
use crate::stats::RunStats;

/// How long to wait for queues to empty once a replay has finished
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Execute the `run` command
pub async fn run_bridge(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    info!(
        plugins = blueprint.plugins.len(),
        event_buffer = blueprint.agent.event_buffer,
        queue_capacity = blueprint.agent.queue_capacity,
        worker_count = blueprint.agent.worker_count,
        "Configuration loaded"
    );

    let (source, replay_config) = build_source(args, &blueprint)?;
    let registry = PluginRegistry::with_builtins();
    let mut dispatcher = Dispatcher::from_blueprint(&registry, &blueprint, source.clone())
        .context("Failed to build plugin runners")?;

    let started = Instant::now();
    if let Err(e) = dispatcher.start().await {
        // Runners started before the failure still need closing
        if let Err(stop_err) = dispatcher.shutdown().await {
            warn!(error = %stop_err, "Shutdown after failed start reported errors");
        }
        return Err(e).context("Failed to start dispatcher");
    }

    info!(envelopes = source.len(), "Dispatcher running");

    let replay_finished = tokio::select! {
        _ = setup_shutdown_signal() => {
            warn!("Received shutdown signal, stopping dispatcher...");
            false
        }
        _ = run_timeout(args.timeout) => {
            info!(timeout_secs = args.timeout, "Timeout reached, stopping dispatcher...");
            false
        }
        _ = source.finished(), if !replay_config.loop_playback => {
            info!("Replay finished");
            true
        }
    };

    if replay_finished {
        wait_for_idle(&dispatcher, DRAIN_TIMEOUT).await;
    }

    let stats = RunStats::collect(&dispatcher, started.elapsed());
    let result = dispatcher.shutdown().await;
    stats.print_summary();

    result.context("Dispatcher shutdown reported errors")?;
    info!("eventbridge finished");
    Ok(())
}

/// Build the replay source from CLI overrides and the `[source]` section
fn build_source(
    args: &RunArgs,
    blueprint: &BridgeBlueprint,
) -> Result<(Arc<ReplayEventSource>, ReplayConfig)> {
    let mut config = blueprint
        .source
        .as_ref()
        .map(ReplayConfig::from)
        .unwrap_or_default();

    if let Some(interval_ms) = args.replay_interval_ms {
        config.interval = Duration::from_millis(interval_ms);
    }
    if args.replay_loop {
        config.loop_playback = true;
    }

    let path = args
        .replay
        .clone()
        .or_else(|| blueprint.source.as_ref().map(|s| s.replay_path.clone()))
        .context("No event source configured: pass --replay or add a [source] section")?;

    info!(
        path = %path.display(),
        interval = ?config.interval,
        loop_playback = config.loop_playback,
        "Using replay source"
    );

    let source = ReplayEventSource::load(&path, config.clone())
        .with_context(|| format!("Failed to load replay file {}", path.display()))?;
    Ok((Arc::new(source), config))
}

/// Wait until every runner has an empty queue and nothing in flight
async fn wait_for_idle(dispatcher: &Dispatcher, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    let mut idle_polls = 0;

    while Instant::now() < deadline {
        let idle = dispatcher
            .metrics()
            .iter()
            .all(|(_, m)| m.pending == 0 && m.in_flight == 0);

        // Two consecutive idle polls, so events still in the fan-out channel land
        idle_polls = if idle { idle_polls + 1 } else { 0 };
        if idle_polls >= 2 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    warn!(timeout_secs = timeout.as_secs(), "Queues did not drain before timeout");
}

async fn run_timeout(timeout_secs: u64) {
    if timeout_secs == 0 {
        std::future::pending::<()>().await;
    }
    tokio::time::sleep(Duration::from_secs(timeout_secs)).await;
}

/// Setup Ctrl+C and SIGTERM signal handlers
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn run_args(config: &std::path::Path) -> RunArgs {
        RunArgs {
            config: config.to_path_buf(),
            replay: None,
            replay_interval_ms: None,
            replay_loop: false,
            timeout: 0,
            metrics_port: 0,
        }
    }

    #[tokio::test]
    async fn test_run_replays_file_and_exits() {
        let dir = tempfile::tempdir().unwrap();
        let replay = dir.path().join("events.jsonl");
        let output = dir.path().join("out.jsonl");

        let mut file = std::fs::File::create(&replay).unwrap();
        for i in 0..3 {
            writeln!(
                file,
                r#"{{"id":"ev-{i}","name":"resource.change","resourceType":"container","data":{{"resource":{{"name":"app_web_{i}","state":"running"}}}}}}"#
            )
            .unwrap();
        }

        let config = dir.path().join("bridge.toml");
        std::fs::write(
            &config,
            format!(
                "[source]\nreplay_path = {:?}\n\n[[plugins]]\nname = \"audit\"\nplugin = \"file\"\n[plugins.params]\npath = {:?}\n",
                replay.display().to_string(),
                output.display().to_string()
            ),
        )
        .unwrap();

        run_bridge(&run_args(&config)).await.unwrap();

        let written = std::fs::read_to_string(&output).unwrap();
        assert_eq!(written.lines().count(), 3);
    }

    #[tokio::test]
    async fn test_run_without_source_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("bridge.toml");
        std::fs::write(&config, "[[plugins]]\nname = \"console\"\nplugin = \"log\"\n").unwrap();

        let err = run_bridge(&run_args(&config)).await.unwrap_err();
        assert!(err.to_string().contains("No event source"), "got: {err}");
    }

    #[tokio::test]
    async fn test_run_fails_on_plugin_init() {
        let dir = tempfile::tempdir().unwrap();
        let replay = dir.path().join("events.jsonl");
        std::fs::write(&replay, "").unwrap();

        let config = dir.path().join("bridge.toml");
        std::fs::write(
            &config,
            format!(
                "[source]\nreplay_path = {:?}\n\n[[plugins]]\nname = \"audit\"\nplugin = \"file\"\n",
                replay.display().to_string()
            ),
        )
        .unwrap();

        let err = run_bridge(&run_args(&config)).await.unwrap_err();
        assert!(err.to_string().contains("Failed to start dispatcher"), "got: {err}");
    }
}
