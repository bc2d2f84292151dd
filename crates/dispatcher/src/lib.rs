//! # Dispatcher
//!
//! 数据分发模块。
//!
//! 负责：
//! - Hand every detached `Batch` to all registered sinks
//! - Isolate sink failures (and panics) per sink and per flush
//! - Report per-sink outcomes back to the flush worker

pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod sinks;

pub use contracts::{Batch, BatchSink};
pub use dispatcher::{
    create_dispatcher, DispatchReport, Dispatcher, DispatcherBuilder, DispatcherConfig,
    SinkOutcome,
};
pub use error::DispatcherError;
pub use handle::{DeliveryResult, PendingDelivery, SinkHandle};
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use sinks::{FileSink, LogSink, NetworkSink};
