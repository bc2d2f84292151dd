//! `info` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashMap;
use tracing::info;

use contracts::GatewayBlueprint;

use crate::cli::InfoArgs;
use crate::error::CliError;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    window: WindowInfo,
    server: ServerInfo,
    sinks: Vec<SinkInfo>,
}

#[derive(Serialize)]
struct WindowInfo {
    max_batch_size: i64,
    interval_ms: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_buffered_records: Option<u64>,
    overflow_policy: String,
    reset_timer_on_flush: bool,
    shutdown: String,
}

#[derive(Serialize)]
struct ServerInfo {
    bind_addr: String,
    max_body_bytes: usize,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    params: HashMap<String, String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        return Err(CliError::config_not_found(&args.config).into());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&blueprint, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint, args);
    }

    Ok(())
}

fn build_config_info(blueprint: &GatewayBlueprint, args: &InfoArgs) -> ConfigInfo {
    let window = &blueprint.window;

    let sinks = blueprint
        .sinks
        .iter()
        .map(|s| SinkInfo {
            name: s.name.clone(),
            sink_type: format!("{:?}", s.sink_type),
            params: if args.sinks {
                s.params.clone()
            } else {
                HashMap::new()
            },
        })
        .collect();

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        window: WindowInfo {
            max_batch_size: window.max_batch_size,
            interval_ms: window.interval_ms,
            max_buffered_records: window.max_buffered_records,
            overflow_policy: format!("{:?}", window.overflow_policy),
            reset_timer_on_flush: window.reset_timer_on_flush,
            shutdown: format!("{:?}", window.shutdown),
        },
        server: ServerInfo {
            bind_addr: blueprint.server.bind_addr.clone(),
            max_body_bytes: blueprint.server.max_body_bytes,
        },
        sinks,
    }
}

fn print_config_info(blueprint: &GatewayBlueprint, args: &InfoArgs) {
    let window = &blueprint.window;

    println!("=== Bulkline Configuration ===\n");

    println!("Window");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!("   ├─ Max batch size: {}", window.max_batch_size);
    println!("   ├─ Interval: {} ms", window.interval_ms);
    match window.max_buffered_records {
        Some(cap) => println!("   ├─ Hard cap: {} ({:?})", cap, window.overflow_policy),
        None => println!("   ├─ Hard cap: none"),
    }
    println!("   ├─ Reset timer on flush: {}", window.reset_timer_on_flush);
    println!("   └─ Shutdown: {:?}", window.shutdown);

    println!("\nServer");
    println!("   ├─ Bind: {}", blueprint.server.bind_addr);
    println!("   └─ Max body: {} bytes", blueprint.server.max_body_bytes);

    println!("\nSinks ({})", blueprint.sinks.len());
    for (i, sink) in blueprint.sinks.iter().enumerate() {
        let is_last = i == blueprint.sinks.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child_prefix = if is_last { "   " } else { "│  " };
        println!("   {} {} ({:?})", prefix, sink.name, sink.sink_type);

        if args.sinks {
            let mut params: Vec<_> = sink.params.iter().collect();
            params.sort();
            for (key, value) in params {
                println!("   {}  {} = {}", child_prefix, key, value);
            }
        }
    }

    println!();
}
