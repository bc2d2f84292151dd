//! Dispatcher - fans each detached batch out to every sink

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument};

use contracts::{Batch, FlushTrigger, SinkConfig, SinkType};

use crate::error::DispatcherError;
use crate::handle::{DeliveryResult, SinkHandle};
use crate::metrics::MetricsSnapshot;
use crate::sinks::{FileSink, LogSink, NetworkSink};

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Sink configurations, in registration order
    pub sinks: Vec<SinkConfig>,
}

/// Builder for creating a Dispatcher
pub struct DispatcherBuilder {
    config: DispatcherConfig,
}

impl DispatcherBuilder {
    /// Create a new DispatcherBuilder
    pub fn new(config: DispatcherConfig) -> Self {
        Self { config }
    }

    /// Build the dispatcher and start one worker per sink
    #[instrument(name = "dispatcher_builder_build", skip(self))]
    pub async fn build(self) -> Result<Dispatcher, DispatcherError> {
        let handles = Self::initialize_handles(&self.config).await?;
        Ok(Dispatcher { handles })
    }

    #[instrument(
        name = "dispatcher_initialize_handles",
        skip(config),
        fields(sink_count = config.sinks.len())
    )]
    async fn initialize_handles(
        config: &DispatcherConfig,
    ) -> Result<Vec<SinkHandle>, DispatcherError> {
        let mut handles = Vec::with_capacity(config.sinks.len());
        for sink_config in &config.sinks {
            handles.push(create_sink_handle(sink_config).await?);
        }
        Ok(handles)
    }
}

/// Create a SinkHandle from configuration
#[instrument(
    name = "dispatcher_create_sink_handle",
    skip(config),
    fields(sink = %config.name, sink_type = ?config.sink_type)
)]
async fn create_sink_handle(config: &SinkConfig) -> Result<SinkHandle, DispatcherError> {
    match config.sink_type {
        SinkType::Log => {
            let sink = LogSink::new(&config.name);
            Ok(SinkHandle::spawn(sink))
        }
        SinkType::File => {
            let sink = FileSink::from_params(&config.name, &config.params)
                .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?;
            Ok(SinkHandle::spawn(sink))
        }
        SinkType::Network => {
            let sink = NetworkSink::from_params(&config.name, &config.params)
                .await
                .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?;
            Ok(SinkHandle::spawn(sink))
        }
    }
}

/// Outcome of one sink for one flush
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkOutcome {
    pub sink: String,
    pub result: DeliveryResult,
}

/// Everything the flush worker needs to know about one dispatch
#[derive(Debug, Clone)]
pub struct DispatchReport {
    /// Batch sequence number
    pub seq: u64,
    /// Trigger that caused the flush
    pub trigger: FlushTrigger,
    /// Records in the batch
    pub records: usize,
    /// Payload bytes in the batch
    pub bytes: usize,
    /// Per-sink outcomes, in registration order
    pub outcomes: Vec<SinkOutcome>,
    /// Wall time from hand-over to the last sink finishing
    pub elapsed: Duration,
}

impl DispatchReport {
    /// Sinks that did not accept the batch
    pub fn failures(&self) -> impl Iterator<Item = &SinkOutcome> {
        self.outcomes.iter().filter(|o| !o.result.is_success())
    }

    /// Number of sinks that did not accept the batch
    pub fn failed_count(&self) -> usize {
        self.failures().count()
    }

    /// Whether every sink accepted the batch
    pub fn all_succeeded(&self) -> bool {
        self.failed_count() == 0
    }
}

/// The Dispatcher that fans out batches to sinks
pub struct Dispatcher {
    handles: Vec<SinkHandle>,
}

impl Dispatcher {
    /// Create a dispatcher with custom sink handles (for testing or embedding)
    pub fn with_handles(handles: Vec<SinkHandle>) -> Self {
        Self { handles }
    }

    /// Number of registered sinks
    pub fn sink_count(&self) -> usize {
        self.handles.len()
    }

    /// Get metrics for all sinks
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.handles
            .iter()
            .map(|h| (h.name().to_string(), h.metrics().snapshot()))
            .collect()
    }

    /// Deliver one batch to every sink
    ///
    /// All sinks receive the batch before any outcome is awaited, so a slow
    /// sink delays the report but not its siblings' writes. Failures are
    /// reported, never propagated.
    #[instrument(
        name = "dispatcher_dispatch",
        skip(self, batch),
        fields(seq = batch.seq, trigger = %batch.trigger, records = batch.len())
    )]
    pub async fn dispatch(&self, batch: Batch) -> DispatchReport {
        let started = Instant::now();
        let (seq, trigger, records, bytes) =
            (batch.seq, batch.trigger, batch.len(), batch.total_bytes());

        let batch = Arc::new(batch);
        let pending: Vec<_> = self
            .handles
            .iter()
            .map(|handle| (handle.name(), handle.deliver(Arc::clone(&batch))))
            .collect();
        drop(batch);

        let mut outcomes = Vec::with_capacity(pending.len());
        for (name, delivery) in pending {
            outcomes.push(SinkOutcome {
                sink: name.to_string(),
                result: delivery.outcome().await,
            });
        }

        let report = DispatchReport {
            seq,
            trigger,
            records,
            bytes,
            outcomes,
            elapsed: started.elapsed(),
        };

        debug!(
            failed = report.failed_count(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Batch dispatched"
        );

        report
    }

    /// Stop all sink workers, closing every sink
    #[instrument(name = "dispatcher_shutdown", skip(self), fields(sinks = self.handles.len()))]
    pub async fn shutdown(self) {
        for handle in self.handles {
            handle.shutdown().await;
        }
        info!("Dispatcher shutdown complete");
    }
}

/// Convenience function to create a dispatcher from sink configs
#[instrument(name = "dispatcher_create", skip(sink_configs))]
pub async fn create_dispatcher(
    sink_configs: Vec<SinkConfig>,
) -> Result<Dispatcher, DispatcherError> {
    let config = DispatcherConfig {
        sinks: sink_configs,
    };
    DispatcherBuilder::new(config).build().await
}
