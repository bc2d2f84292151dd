//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use contracts::GatewayBlueprint;
use ingestion::LoadConfig;

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        return Err(CliError::config_not_found(&args.config).into());
    }

    let mut blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    apply_overrides(&mut blueprint, args);
    config_loader::ConfigLoader::validate(&blueprint)
        .context("Configuration invalid after CLI overrides")?;

    info!(
        max_batch_size = blueprint.window.max_batch_size,
        interval_ms = blueprint.window.interval_ms,
        bind = %blueprint.server.bind_addr,
        sinks = blueprint.sinks.len(),
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let pipeline = Pipeline::new(PipelineConfig {
        blueprint,
        metrics_port: (args.metrics_port != 0).then_some(args.metrics_port),
        synthetic: synthetic_load(args),
    });

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            wait_for_shutdown_signal().await;
            warn!("Received shutdown signal, stopping gateway...");
            shutdown.cancel();
        }
    });

    info!("Starting gateway...");
    let stats = pipeline.run(shutdown).await.context("Gateway execution failed")?;

    info!(
        records = stats.throughput_records(),
        duration_secs = stats.duration.as_secs_f64(),
        rate = format!("{:.2}", stats.records_per_sec()),
        "Gateway stopped"
    );
    stats.print_summary();

    Ok(())
}

/// Apply CLI overrides on top of the file configuration
fn apply_overrides(blueprint: &mut GatewayBlueprint, args: &RunArgs) {
    if let Some(ref bind) = args.bind {
        info!(bind = %bind, "Overriding bind address from CLI");
        blueprint.server.bind_addr = bind.clone();
    }
    if let Some(size) = args.max_batch_size {
        info!(max_batch_size = size, "Overriding max_batch_size from CLI");
        blueprint.window.max_batch_size = size;
    }
    if let Some(interval) = args.interval_ms {
        info!(interval_ms = interval, "Overriding interval_ms from CLI");
        blueprint.window.interval_ms = interval;
    }
}

fn synthetic_load(args: &RunArgs) -> Option<LoadConfig> {
    (args.synthetic_producers > 0).then(|| LoadConfig {
        producers: args.synthetic_producers,
        records_per_producer: args.synthetic_records,
        pace: (args.synthetic_pace_ms > 0).then(|| Duration::from_millis(args.synthetic_pace_ms)),
    })
}

/// Resolve on Ctrl+C or SIGTERM
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
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
                warn!(error = %e, "Failed to install SIGTERM handler");
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

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &GatewayBlueprint) {
    let window = &blueprint.window;

    println!("\n=== Configuration Summary ===\n");
    println!("Window:");
    println!("  Max batch size: {}", window.max_batch_size);
    println!("  Interval: {} ms", window.interval_ms);
    match window.max_buffered_records {
        Some(cap) => println!("  Hard cap: {} ({:?})", cap, window.overflow_policy),
        None => println!("  Hard cap: none"),
    }
    println!("  Shutdown: {:?}", window.shutdown);

    println!("\nServer:");
    println!("  Bind: {}", blueprint.server.bind_addr);
    println!("  Max body: {} bytes", blueprint.server.max_body_bytes);

    if !blueprint.sinks.is_empty() {
        println!("\nSinks ({}):", blueprint.sinks.len());
        for sink in &blueprint.sinks {
            println!("  - {} ({:?})", sink.name, sink.sink_type);
        }
    }

    println!();
}
