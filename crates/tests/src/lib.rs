//! # Integration Tests
//!
//! End-to-end tests across crates.
//!
//! Covers:
//! - Config -> registry -> dispatcher wiring
//! - Mock source e2e flows (classification, fan-out, isolation)
//! - Shutdown guarantees

#[cfg(test)]
mod contract_tests {
    #[test]
    fn test_contracts_compile() {
        assert_eq!(contracts::EventKind::ALL.len(), 4);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{ContractError, Event, EventKind, Plugin, RawEnvelope};
    use dispatcher::{Dispatcher, DispatcherError, MetricsSnapshot, PluginRegistry, PluginRunner};
    use ingestion::{MockEventSource, ReplayConfig, ReplayEventSource};
    use serde_json::json;
    use tokio::time::sleep;

    /// Plugin recording what it sees; fails on every `fail_every`-th call
    #[derive(Default)]
    struct RecordingPlugin {
        seen: std::sync::Mutex<Vec<String>>,
        calls: AtomicU64,
        closes: AtomicU64,
        fail_every: u64,
        delay: Duration,
    }

    impl RecordingPlugin {
        fn seen(&self) -> Vec<String> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Plugin for RecordingPlugin {
        fn name(&self) -> &str {
            "recording"
        }

        async fn init(&self) -> Result<(), ContractError> {
            Ok(())
        }

        async fn process(&self, event: &Event) -> Result<(), ContractError> {
            if !self.delay.is_zero() {
                sleep(self.delay).await;
            }
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.seen.lock().unwrap().push(event.id.clone());
            if self.fail_every > 0 && call % self.fail_every == 0 {
                return Err(ContractError::plugin_process("recording", "scheduled failure"));
            }
            Ok(())
        }

        async fn close(&self) -> Result<(), ContractError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn runner(
        name: &str,
        plugin: Arc<RecordingPlugin>,
        kinds: &[EventKind],
        capacity: usize,
        workers: usize,
    ) -> Arc<PluginRunner> {
        Arc::new(PluginRunner::new(
            name,
            plugin,
            kinds.iter().copied(),
            capacity,
            workers,
        ))
    }

    fn change(id: &str, resource_type: &str, name: &str) -> RawEnvelope {
        RawEnvelope::resource_change(id, resource_type, json!({ "name": name, "state": "active" }))
    }

    async fn wait_until(mut done: impl FnMut() -> bool) {
        for _ in 0..400 {
            if done() {
                return;
            }
            sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached in time");
    }

    fn assert_conserved(m: &MetricsSnapshot) {
        assert_eq!(m.received, m.dropped + m.pending as u64 + m.delivered, "{m:?}");
        assert_eq!(m.delivered, m.successes + m.errors + m.in_flight, "{m:?}");
    }

    /// Unknown and undecodable events never reach a runner
    #[tokio::test]
    async fn test_e2e_invalid_events_never_delivered() {
        let source = Arc::new(MockEventSource::new("mock"));
        let plugin = Arc::new(RecordingPlugin::default());
        let mut dispatcher = Dispatcher::new(
            vec![runner("all", plugin.clone(), &EventKind::ALL, 10, 1)],
            source.clone(),
        );
        dispatcher.start().await.unwrap();

        source.emit(change("unknown", "volume", "data")).await;
        source.emit(RawEnvelope::resource_change(
            "broken",
            "service",
            json!({ "scale": "three" }),
        )).await;
        source.emit(change("good", "service", "web")).await;

        wait_until(|| plugin.seen().len() == 1).await;
        sleep(Duration::from_millis(20)).await;

        assert_eq!(plugin.seen(), ["good"]);
        let (_, metrics) = &dispatcher.metrics()[0];
        assert_eq!(metrics.received, 1);

        let ingestion = dispatcher.ingestion_metrics().unwrap();
        assert_eq!(ingestion.unknown_kind, 1);
        assert_eq!(ingestion.decode_errors, 1);

        dispatcher.shutdown().await.unwrap();
    }

    /// Container runner sees container events only; host runner stays untouched
    #[tokio::test]
    async fn test_e2e_kind_filtering() {
        let source = Arc::new(MockEventSource::new("mock"));
        let containers = Arc::new(RecordingPlugin::default());
        let hosts = Arc::new(RecordingPlugin::default());
        let mut dispatcher = Dispatcher::new(
            vec![
                runner("a", containers.clone(), &[EventKind::Container], 10, 1),
                runner("b", hosts.clone(), &[EventKind::Host], 10, 1),
            ],
            source.clone(),
        );
        dispatcher.start().await.unwrap();

        source.emit(change("c1", "container", "myapp_web_1")).await;
        wait_until(|| containers.seen().len() == 1).await;

        let metrics = dispatcher.metrics();
        assert_eq!(metrics[0].1.received, 1);
        assert_eq!(metrics[1].1.received, 0);
        assert!(hosts.seen().is_empty());

        dispatcher.shutdown().await.unwrap();
    }

    /// Per-runner FIFO with a single worker, every event processed once
    #[tokio::test]
    async fn test_e2e_fifo_exactly_once() {
        let source = Arc::new(MockEventSource::new("mock"));
        let plugin = Arc::new(RecordingPlugin::default());
        let mut dispatcher = Dispatcher::new(
            vec![runner("ordered", plugin.clone(), &EventKind::ALL, 100, 1)],
            source.clone(),
        );
        dispatcher.start().await.unwrap();

        let ids: Vec<String> = (0..40).map(|i| format!("ev-{i}")).collect();
        for id in &ids {
            source.emit(change(id, "host", "node")).await;
        }
        wait_until(|| plugin.seen().len() == ids.len()).await;

        assert_eq!(plugin.seen(), ids);
        let (_, metrics) = &dispatcher.metrics()[0];
        assert_eq!(metrics.successes, 40);
        assert_eq!(metrics.dropped, 0);
        assert_conserved(metrics);

        dispatcher.shutdown().await.unwrap();
    }

    /// A slow runner drops its oldest events without affecting a fast one
    #[tokio::test]
    async fn test_e2e_slow_runner_isolated() {
        let source = Arc::new(MockEventSource::new("mock"));
        let slow = Arc::new(RecordingPlugin {
            delay: Duration::from_millis(20),
            ..Default::default()
        });
        let fast = Arc::new(RecordingPlugin::default());
        let mut dispatcher = Dispatcher::new(
            vec![
                runner("slow", slow.clone(), &EventKind::ALL, 3, 1),
                runner("fast", fast.clone(), &EventKind::ALL, 100, 2),
            ],
            source.clone(),
        );
        dispatcher.start().await.unwrap();

        for i in 0..30 {
            source.emit(change(&format!("ev-{i}"), "stack", "myapp")).await;
        }
        wait_until(|| fast.seen().len() == 30).await;

        wait_until(|| {
            let (_, m) = &dispatcher.metrics()[0];
            m.pending == 0 && m.in_flight == 0
        })
        .await;

        let metrics = dispatcher.metrics();
        let (_, slow_metrics) = &metrics[0];
        assert_eq!(slow_metrics.received, 30);
        assert!(slow_metrics.dropped > 0);
        assert_conserved(slow_metrics);
        assert_eq!(metrics[1].1.dropped, 0);

        // Evictions hit the oldest events, so the newest one always survives
        let seen = slow.seen();
        assert!(seen.len() < 30);
        assert_eq!(seen.last().map(String::as_str), Some("ev-29"));

        dispatcher.shutdown().await.unwrap();
        assert_eq!(slow.closes.load(Ordering::SeqCst), 1);
    }

    /// Shutdown closes every plugin exactly once, even after process errors
    #[tokio::test]
    async fn test_e2e_shutdown_after_errors() {
        let source = Arc::new(MockEventSource::new("mock"));
        let flaky = Arc::new(RecordingPlugin {
            fail_every: 2,
            ..Default::default()
        });
        let steady = Arc::new(RecordingPlugin::default());
        let mut dispatcher = Dispatcher::new(
            vec![
                runner("flaky", flaky.clone(), &EventKind::ALL, 50, 3),
                runner("steady", steady.clone(), &EventKind::ALL, 50, 1),
            ],
            source.clone(),
        );
        dispatcher.start().await.unwrap();

        for i in 0..10 {
            source.emit(change(&format!("ev-{i}"), "container", "a_b_c")).await;
        }
        wait_until(|| flaky.seen().len() == 10 && steady.seen().len() == 10).await;

        let (_, m) = &dispatcher.metrics()[0];
        assert_eq!(m.errors, 5);
        assert_eq!(m.successes, 5);

        let runners: Vec<_> = dispatcher.runners().to_vec();
        dispatcher.shutdown().await.unwrap();

        for runner in &runners {
            assert_eq!(runner.state(), dispatcher::RunnerState::Stopped);
        }
        assert_eq!(flaky.closes.load(Ordering::SeqCst), 1);
        assert_eq!(steady.closes.load(Ordering::SeqCst), 1);
        assert_eq!(source.stop_count(), 1);
    }

    /// Close failures are aggregated; every runner is still stopped
    #[tokio::test]
    async fn test_e2e_close_failures_aggregated() {
        struct FailingClose;

        #[async_trait]
        impl Plugin for FailingClose {
            fn name(&self) -> &str {
                "failing-close"
            }
            async fn init(&self) -> Result<(), ContractError> {
                Ok(())
            }
            async fn process(&self, _event: &Event) -> Result<(), ContractError> {
                Ok(())
            }
            async fn close(&self) -> Result<(), ContractError> {
                Err(ContractError::plugin_close("failing-close", "flush failed"))
            }
        }

        let source = Arc::new(MockEventSource::new("mock"));
        let after = Arc::new(RecordingPlugin::default());
        let mut dispatcher = Dispatcher::new(
            vec![
                Arc::new(PluginRunner::new("x", Arc::new(FailingClose), EventKind::ALL, 5, 1)),
                Arc::new(PluginRunner::new("y", Arc::new(FailingClose), EventKind::ALL, 5, 1)),
                runner("z", after.clone(), &EventKind::ALL, 5, 1),
            ],
            source,
        );
        dispatcher.start().await.unwrap();

        let err = dispatcher.shutdown().await.unwrap_err();
        let DispatcherError::StopFailures(failures) = err else {
            panic!("expected aggregated stop failures");
        };
        assert_eq!(failures.len(), 2);
        assert_eq!(after.closes.load(Ordering::SeqCst), 1);
    }

    /// A full source channel slows the source down instead of losing events
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_e2e_unthrottled_replay_is_lossless() {
        const TOTAL: usize = 5_000;
        let envelopes = (0..TOTAL)
            .map(|i| change(&format!("ev-{i}"), "host", "node"))
            .collect();
        let source = Arc::new(ReplayEventSource::from_envelopes(
            "burst",
            envelopes,
            ReplayConfig::default(),
        ));
        let plugin = Arc::new(RecordingPlugin::default());
        let mut dispatcher = Dispatcher::new(
            vec![runner("hosts", plugin.clone(), &[EventKind::Host], 2 * TOTAL, 1)],
            source.clone(),
        )
        .with_event_buffer(8);
        dispatcher.start().await.unwrap();

        source.finished().await;
        wait_until(|| dispatcher.metrics()[0].1.received == TOTAL as u64).await;

        let (_, metrics) = &dispatcher.metrics()[0];
        assert_eq!(metrics.dropped, 0);
        let ingestion = dispatcher.ingestion_metrics().unwrap();
        assert_eq!(ingestion.events_forwarded, TOTAL as u64);
        assert_eq!(ingestion.after_close, 0);

        dispatcher.shutdown().await.unwrap();
    }

    /// More events than the source channel holds all reach the runner
    #[tokio::test]
    async fn test_e2e_burst_beyond_event_buffer() {
        let source = Arc::new(MockEventSource::new("mock"));
        let plugin = Arc::new(RecordingPlugin::default());
        let mut dispatcher = Dispatcher::new(
            vec![runner("all", plugin.clone(), &EventKind::ALL, 1_000, 1)],
            source.clone(),
        )
        .with_event_buffer(4);
        dispatcher.start().await.unwrap();

        for i in 0..300 {
            source.emit(change(&format!("ev-{i}"), "service", "web")).await;
        }
        wait_until(|| dispatcher.metrics()[0].1.received == 300).await;
        assert_eq!(dispatcher.metrics()[0].1.dropped, 0);

        dispatcher.shutdown().await.unwrap();
    }

    /// Config text -> registry -> running dispatcher
    #[tokio::test]
    async fn test_e2e_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("audit.jsonl");
        let content = format!(
            r#"
[agent]
event_buffer = 16
queue_capacity = 8

[[plugins]]
name = "console"
plugin = "log"

[[plugins]]
name = "audit"
plugin = "file"
worker_count = 2
[plugins.params]
path = {:?}
"#,
            output.display().to_string()
        );
        let blueprint = ConfigLoader::load_from_str(&content, ConfigFormat::Toml).unwrap();

        let source = Arc::new(MockEventSource::new("mock"));
        let registry = PluginRegistry::with_builtins();
        let mut dispatcher =
            Dispatcher::from_blueprint(&registry, &blueprint, source.clone()).unwrap();
        assert_eq!(dispatcher.runners()[1].worker_count(), 2);
        assert_eq!(dispatcher.runners()[1].queue_capacity(), 8);

        dispatcher.start().await.unwrap();
        source.emit(change("c1", "container", "myapp_web_1")).await;
        source.emit(change("h1", "host", "node-1")).await;

        wait_until(|| {
            dispatcher
                .metrics()
                .iter()
                .all(|(_, m)| m.successes == 2)
        })
        .await;
        dispatcher.shutdown().await.unwrap();

        let written = std::fs::read_to_string(&output).unwrap();
        let events: Vec<Event> = written
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(events.len(), 2);

        let container = events.iter().find(|e| e.id == "c1").unwrap();
        assert_eq!(container.kind(), EventKind::Container);
        assert_eq!(container.name(), "web_1");
    }
}
