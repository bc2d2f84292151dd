//! # Ingestion
//!
//! Producer-side glue in front of the batching engine.
//!
//! Responsibilities:
//! - HTTP endpoint that turns request bodies into records
//! - Synthetic load generator for soak runs and tests

mod config;
mod error;
mod load;
mod server;

pub use config::{IngestionConfig, IngestionMetrics, IngestionMetricsSnapshot};
pub use error::{IngestionError, Result};
pub use load::{LoadConfig, LoadGenerator, LoadReport};
pub use server::{router, serve, AppState};
