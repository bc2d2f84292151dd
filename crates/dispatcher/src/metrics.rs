//! Sink metrics for observability

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for a single sink
#[derive(Debug, Default)]
pub struct SinkMetrics {
    /// Total successful batch writes
    write_count: AtomicU64,
    /// Total records in successful writes
    records_written: AtomicU64,
    /// Total write failures
    failure_count: AtomicU64,
    /// Deliveries that never reached the sink (worker gone)
    unavailable_count: AtomicU64,
    /// Sequence number of the last batch handed to the sink
    last_seq: AtomicU64,
}

impl SinkMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Get total write count
    pub fn write_count(&self) -> u64 {
        self.write_count.load(Ordering::Relaxed)
    }

    /// Record a successful write of `records` records
    pub fn record_write(&self, records: usize) {
        self.write_count.fetch_add(1, Ordering::Relaxed);
        self.records_written
            .fetch_add(records as u64, Ordering::Relaxed);
    }

    /// Get records written
    pub fn records_written(&self) -> u64 {
        self.records_written.load(Ordering::Relaxed)
    }

    /// Get failure count
    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    /// Increment failure count
    pub fn inc_failure_count(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get unavailable count
    pub fn unavailable_count(&self) -> u64 {
        self.unavailable_count.load(Ordering::Relaxed)
    }

    /// Increment unavailable count
    pub fn inc_unavailable_count(&self) {
        self.unavailable_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Remember the last batch handed over
    pub fn set_last_seq(&self, seq: u64) {
        self.last_seq.store(seq, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            write_count: self.write_count(),
            records_written: self.records_written(),
            failure_count: self.failure_count(),
            unavailable_count: self.unavailable_count(),
            last_seq: self.last_seq.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of sink metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub write_count: u64,
    pub records_written: u64,
    pub failure_count: u64,
    pub unavailable_count: u64,
    pub last_seq: u64,
}
