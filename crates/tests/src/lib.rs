//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 覆盖：
//! - 配置文件 → dispatcher → engine → file sink
//! - HTTP 端点 → engine → sinks
//! - 并发：高负载下记录不丢失、不重复

#[cfg(test)]
mod contract_tests {
    use contracts::{FlushTrigger, GatewayBlueprint};

    #[test]
    fn test_contracts_compile() {
        let _ = contracts::ConfigVersion::V1;
        assert_eq!(FlushTrigger::Shutdown.as_str(), "shutdown");
    }

    #[test]
    fn test_blueprint_json_snapshot() {
        let bp: GatewayBlueprint = serde_json::from_str(
            r#"{ "window": { "max_batch_size": 2, "interval_ms": 10 } }"#,
        )
        .unwrap();
        let value = serde_json::to_value(&bp).unwrap();

        assert_eq!(value["version"], "V1");
        assert_eq!(value["window"]["overflow_policy"], "drop_newest");
        assert_eq!(value["window"]["shutdown"], "flush_pending");
        assert_eq!(value["server"]["bind_addr"], "0.0.0.0:8000");
        assert!(value["window"].get("max_buffered_records").is_none());
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::HashSet;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use batcher::{Batcher, BatcherConfig};
    use bytes::Bytes;
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{Batch, BatchSink, ContractError, FlushTrigger};
    use dispatcher::{create_dispatcher, Dispatcher, SinkHandle};
    use ingestion::{router, AppState, LoadConfig, LoadGenerator};
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    /// Forwards every batch to a channel
    struct CaptureSink {
        tx: mpsc::UnboundedSender<Batch>,
    }

    impl BatchSink for CaptureSink {
        fn name(&self) -> &str {
            "capture"
        }

        async fn write(&mut self, batch: &Batch) -> Result<(), ContractError> {
            let _ = self.tx.send(batch.clone());
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    /// Panics on its first write
    struct PanickingSink;

    impl BatchSink for PanickingSink {
        fn name(&self) -> &str {
            "panicky"
        }

        async fn write(&mut self, _batch: &Batch) -> Result<(), ContractError> {
            panic!("sink bug");
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    fn capture() -> (SinkHandle, mpsc::UnboundedReceiver<Batch>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (SinkHandle::spawn(CaptureSink { tx }), rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Batch>) -> Vec<Batch> {
        let mut batches = Vec::new();
        while let Ok(batch) = rx.try_recv() {
            batches.push(batch);
        }
        batches
    }

    /// Config file → dispatcher → engine → file sink
    #[tokio::test]
    async fn test_e2e_config_to_file_sink() {
        let dir = tempfile::tempdir().unwrap();
        let config = format!(
            r#"
[window]
max_batch_size = 4
interval_ms = 3600000

[[sinks]]
name = "archive"
sink_type = "file"
params = {{ base_path = "{}", prefix = "e2e" }}

[[sinks]]
name = "log"
sink_type = "log"
"#,
            dir.path().display()
        );

        let blueprint = ConfigLoader::load_from_str(&config, ConfigFormat::Toml).unwrap();
        let dispatcher = create_dispatcher(blueprint.sinks.clone()).await.unwrap();
        let engine =
            Batcher::new(BatcherConfig::try_from(&blueprint.window).unwrap(), dispatcher).unwrap();
        let handle = engine.handle();
        let cancel = CancellationToken::new();
        let running = engine.run(cancel.clone());

        for i in 0..10 {
            handle.append(Bytes::from(format!("{{\"n\":{i}}}")));
        }
        cancel.cancel();
        let summary = running.join().await.unwrap();

        // Two size flushes of four, one shutdown flush of two
        assert_eq!(summary.metrics.records_flushed, 10);
        assert_eq!(summary.flushes.shutdown_flushes, 1);
        assert_eq!(summary.sinks.len(), 2);

        let file = std::fs::read_dir(dir.path())
            .unwrap()
            .next()
            .unwrap()
            .unwrap()
            .path();
        assert!(file.file_name().unwrap().to_string_lossy().starts_with("e2e-"));

        let lines: Vec<String> = std::fs::read_to_string(file)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect();
        let expected: Vec<String> = (0..10).map(|i| format!("{{\"n\":{i}}}")).collect();
        assert_eq!(lines, expected);
    }

    /// HTTP endpoint → engine → sinks
    #[tokio::test]
    async fn test_e2e_http_to_sink() {
        let (sink, mut rx) = capture();
        let config = BatcherConfig::new(3, Duration::from_secs(3600)).unwrap();
        let engine = Batcher::new(config, Dispatcher::with_handles(vec![sink])).unwrap();
        let app = router(AppState::new(engine.handle()), 1024);
        let cancel = CancellationToken::new();
        let running = engine.run(cancel.clone());

        let response = app
            .clone()
            .oneshot(
                Request::post("/events/batch")
                    .body(Body::from("a\nb\nc\n"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let batch = rx.recv().await.unwrap();
        assert_eq!(batch.trigger, FlushTrigger::SizeExceeded);
        assert_eq!(
            batch.records().to_vec(),
            vec![Bytes::from_static(b"a"), Bytes::from_static(b"b"), Bytes::from_static(b"c")]
        );

        let response = app
            .oneshot(Request::post("/events").body(Body::from("d")).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        cancel.cancel();
        running.join().await.unwrap();
        let last = rx.recv().await.unwrap();
        assert_eq!(last.trigger, FlushTrigger::Shutdown);
        assert_eq!(last.records().to_vec(), vec![Bytes::from_static(b"d")]);
    }

    /// Many producers, small windows: every record delivered exactly once
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_e2e_load_exactly_once() {
        let (sink, mut rx) = capture();
        let config = BatcherConfig::new(37, Duration::from_millis(5)).unwrap();
        let engine = Batcher::new(config, Dispatcher::with_handles(vec![sink])).unwrap();
        let handle = engine.handle();
        let cancel = CancellationToken::new();
        let running = engine.run(cancel.clone());

        let report = LoadGenerator::new(LoadConfig {
            producers: 16,
            records_per_producer: 400,
            pace: None,
        })
        .run(handle, CancellationToken::new())
        .await;
        assert_eq!(report.sent, 6400);

        cancel.cancel();
        let summary = running.join().await.unwrap();

        let batches = drain(&mut rx);
        let mut seen = HashSet::new();
        for batch in &batches {
            for record in batch.records() {
                assert!(seen.insert(record.clone()), "record delivered twice");
            }
        }
        assert_eq!(seen.len(), 6400);
        assert_eq!(summary.metrics.records_flushed, 6400);

        let seqs: Vec<u64> = batches.iter().map(|b| b.seq).collect();
        let mut sorted = seqs.clone();
        sorted.sort_unstable();
        assert_eq!(seqs, sorted);
    }

    /// A panicking sink is isolated; its siblings keep receiving
    #[tokio::test]
    async fn test_e2e_sink_panic_isolated() {
        let (sink, mut rx) = capture();
        let dispatcher = Dispatcher::with_handles(vec![SinkHandle::spawn(PanickingSink), sink]);
        let config = BatcherConfig::new(1, Duration::from_secs(3600)).unwrap();
        let engine = Batcher::new(config, dispatcher).unwrap();
        let handle = engine.handle();
        let cancel = CancellationToken::new();
        let running = engine.run(cancel.clone());

        for i in 0..3u8 {
            handle.append(Bytes::from(vec![i]));
            let batch = rx.recv().await.unwrap();
            assert_eq!(batch.records().to_vec(), vec![Bytes::from(vec![i])]);
        }

        cancel.cancel();
        let summary = running.join().await.unwrap();
        assert_eq!(summary.metrics.flushes, 3);
        assert_eq!(summary.metrics.sink_failures, 3);
        let (name, panicky) = &summary.sinks[0];
        assert_eq!(name, "panicky");
        assert_eq!(panicky.write_count, 0);
    }

    /// Interval-only flushing with no producers emits empty batches
    #[tokio::test(start_paused = true)]
    async fn test_e2e_idle_interval_flushes() {
        let (sink, mut rx) = capture();
        let config = BatcherConfig::new(10, Duration::from_millis(200)).unwrap();
        let engine = Batcher::new(config, Dispatcher::with_handles(vec![sink])).unwrap();
        let cancel = CancellationToken::new();
        let running = engine.run(cancel.clone());

        for expected_seq in 0..3 {
            let batch = rx.recv().await.unwrap();
            assert_eq!(batch.seq, expected_seq);
            assert_eq!(batch.trigger, FlushTrigger::IntervalElapsed);
            assert!(batch.is_empty());
        }

        cancel.cancel();
        let summary = running.join().await.unwrap();
        assert_eq!(summary.metrics.empty_flushes, summary.metrics.flushes);
    }
}
