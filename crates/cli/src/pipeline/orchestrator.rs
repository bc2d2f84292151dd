//! Pipeline orchestrator - coordinates all components.
//!
//! Start order: metrics → sinks → engine → HTTP endpoint (→ synthetic load).
//! Stop order is the reverse of the data flow: the endpoint stops accepting
//! first, then the engine drains into the sinks, then the sinks close.

use std::time::Instant;

use anyhow::{Context, Result};
use batcher::{Batcher, BatcherConfig, BatcherHandle, BatcherSummary, RunningBatcher};
use contracts::GatewayBlueprint;
use dispatcher::create_dispatcher;
use ingestion::{
    IngestionConfig, IngestionMetricsSnapshot, LoadConfig, LoadGenerator, LoadReport,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::PipelineStats;
use crate::error::CliError;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Validated gateway configuration
    pub blueprint: GatewayBlueprint,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,

    /// Synthetic producers; the run ends once they finish
    pub synthetic: Option<LoadConfig>,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until `shutdown` fires (or synthetic load completes)
    pub async fn run(self, shutdown: CancellationToken) -> Result<PipelineStats> {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        // Initialize Metrics (optional)
        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        // Build engine
        let batcher_config = BatcherConfig::try_from(&blueprint.window)
            .map_err(|e| CliError::startup("batcher", e.to_string()))?;
        let dispatcher = create_dispatcher(blueprint.sinks.clone())
            .await
            .context("Failed to create sinks")?;
        let active_sinks = dispatcher.sink_count();

        let engine = Batcher::new(batcher_config, dispatcher)
            .map_err(|e| CliError::startup("batcher", e.to_string()))?;
        let handle = engine.handle();

        let engine_cancel = CancellationToken::new();
        let running = engine.run(engine_cancel.clone());

        // Endpoint and load run in their own scope so the engine is drained
        // whatever happens to them
        let served = Self::serve_until_shutdown(
            blueprint,
            handle,
            active_sinks,
            self.config.synthetic.clone(),
            shutdown,
        )
        .await;

        let ((ingestion, load), summary) = drain_engine(served, engine_cancel, running).await?;

        if summary.metrics.records_dropped > 0 || summary.metrics.appends_rejected > 0 {
            warn!(
                dropped = summary.metrics.records_dropped,
                rejected = summary.metrics.appends_rejected,
                "Records lost at the hard cap"
            );
        }

        info!(
            flushes = summary.metrics.flushes,
            records = summary.metrics.records_flushed,
            "Pipeline shutdown complete"
        );

        Ok(PipelineStats {
            duration: start_time.elapsed(),
            active_sinks,
            ingestion,
            load,
            summary,
        })
    }

    /// Bind the HTTP endpoint and serve until `shutdown` fires
    ///
    /// A synthetic load, when configured, cancels `shutdown` once it finishes.
    async fn serve_until_shutdown(
        blueprint: &GatewayBlueprint,
        handle: BatcherHandle,
        active_sinks: usize,
        synthetic: Option<LoadConfig>,
        shutdown: CancellationToken,
    ) -> Result<(IngestionMetricsSnapshot, Option<LoadReport>)> {
        let ingestion_config = IngestionConfig::try_from(&blueprint.server)
            .map_err(|e| CliError::startup("ingestion", e.to_string()))?;
        let listener = TcpListener::bind(ingestion_config.bind_addr)
            .await
            .map_err(|e| {
                CliError::startup(
                    "ingestion",
                    format!("bind {}: {}", ingestion_config.bind_addr, e),
                )
            })?;

        info!(
            addr = %ingestion_config.bind_addr,
            sinks = active_sinks,
            "Gateway running"
        );

        let server = tokio::spawn({
            let handle = handle.clone();
            let cancel = shutdown.clone();
            async move { ingestion::serve(listener, handle, &ingestion_config, cancel).await }
        });

        // Synthetic load ends the run on its own
        let load = match synthetic {
            Some(load_config) => {
                let report = LoadGenerator::new(load_config)
                    .run(handle, shutdown.clone())
                    .await;
                shutdown.cancel();
                Some(report)
            }
            None => None,
        };

        let ingestion = server
            .await
            .map_err(|e| CliError::shutdown(format!("ingestion task: {e}")))?
            .context("HTTP endpoint failed")?;

        Ok((ingestion, load))
    }
}

/// Cancel and join the engine once the front end is done, then report the
/// front end's own failure first
async fn drain_engine<T>(
    served: Result<T>,
    engine_cancel: CancellationToken,
    running: RunningBatcher,
) -> Result<(T, BatcherSummary)> {
    if let Err(e) = &served {
        warn!(error = %e, "Front end failed; draining engine before exit");
    }

    engine_cancel.cancel();
    let joined = running
        .join()
        .await
        .map_err(|e| CliError::shutdown(e.to_string()));

    let served = served?;
    Ok((served, joined?))
}
