//! # Batcher
//!
//! Size/time windowed batching engine.
//!
//! Responsibilities:
//! - Accumulate records from concurrent producers
//! - Request a flush when the record count or the window interval is reached
//! - Detach the open batch and hand it to the `Dispatcher`, one flush at a time
//! - Stop cleanly on cancellation
//!
//! ## Usage Example
//!
//! ```ignore
//! use batcher::{Batcher, BatcherConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let config = BatcherConfig::new(500, Duration::from_secs(5))?;
//! let engine = Batcher::new(config, dispatcher)?;
//! let handle = engine.handle();
//!
//! let cancel = CancellationToken::new();
//! let running = engine.run(cancel.clone());
//!
//! handle.append(Bytes::from_static(b"{\"event\":\"app_open\"}"));
//!
//! cancel.cancel();
//! let summary = running.join().await?;
//! ```

mod accumulator;
mod config;
mod coordinator;
mod engine;
mod error;
mod metrics;
mod timer;
mod trigger;

pub use accumulator::Accumulator;
pub use config::{BatcherConfig, MAX_INTERVAL};
pub use coordinator::{CoordinatorState, FlushCoordinator};
pub use engine::{Batcher, BatcherHandle, BatcherSummary, RunningBatcher};
pub use error::{BatcherError, Result};
pub use metrics::{BatcherMetrics, BatcherMetricsSnapshot};
pub use timer::WindowTimer;
pub use trigger::{trigger_channel, TriggerReceiver, TriggerSender};

// Re-export contracts types
pub use contracts::{Batch, FlushTrigger, OverflowPolicy, Record, ShutdownPolicy};
