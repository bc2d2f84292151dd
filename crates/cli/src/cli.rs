//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Bulkline - size/time windowed batching gateway
#[derive(Parser, Debug)]
#[command(
    name = "bulkline",
    author,
    version,
    about = "Size/time windowed batching gateway",
    long_about = "Accepts events over HTTP, groups them into batches bounded by record \n\
                  count and window interval, and hands every batch to the configured sinks."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "BULKLINE_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "BULKLINE_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Log level used when RUST_LOG is unset
    pub fn default_log_level(&self) -> &'static str {
        if self.quiet {
            return "warn";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the gateway
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "bulkline.toml", env = "BULKLINE_CONFIG")]
    pub config: PathBuf,

    /// Override the HTTP listen address
    #[arg(long, env = "BULKLINE_BIND")]
    pub bind: Option<String>,

    /// Override the record count that triggers a flush
    #[arg(long, env = "BULKLINE_MAX_BATCH_SIZE")]
    pub max_batch_size: Option<i64>,

    /// Override the window interval in milliseconds
    #[arg(long, env = "BULKLINE_INTERVAL_MS")]
    pub interval_ms: Option<i64>,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "9000", env = "BULKLINE_METRICS_PORT")]
    pub metrics_port: u16,

    /// Run synthetic producers instead of waiting for a signal (0 = disabled)
    #[arg(long, default_value = "0")]
    pub synthetic_producers: usize,

    /// Records appended by each synthetic producer
    #[arg(long, default_value = "1000")]
    pub synthetic_records: usize,

    /// Delay between appends of one synthetic producer, in milliseconds (0 = unpaced)
    #[arg(long, default_value = "0")]
    pub synthetic_pace_ms: u64,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "bulkline.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "bulkline.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show sink parameters
    #[arg(long)]
    pub sinks: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
