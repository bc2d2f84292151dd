//! Engine metrics for observability

use std::sync::atomic::{AtomicU64, Ordering};

use contracts::FlushTrigger;

/// Counters shared by producers, the timer and the flush worker
#[derive(Debug, Default)]
pub struct BatcherMetrics {
    /// Records accepted into an open batch
    records_appended: AtomicU64,
    /// Records discarded by the overflow policy
    records_dropped: AtomicU64,
    /// `try_append` calls rejected at the hard cap
    appends_rejected: AtomicU64,
    /// Size triggers delivered to the worker
    size_triggers: AtomicU64,
    /// Interval triggers delivered to the worker
    interval_triggers: AtomicU64,
    /// Triggers dropped because one was already pending
    triggers_coalesced: AtomicU64,
    /// Completed flushes
    flushes: AtomicU64,
    /// Flushes that carried no records
    empty_flushes: AtomicU64,
    /// Records handed to the dispatcher
    records_flushed: AtomicU64,
    /// Failed sink deliveries
    sink_failures: AtomicU64,
}

impl BatcherMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_appended(&self) {
        self.records_appended.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_dropped(&self) {
        self.records_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rejected(&self) {
        self.appends_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a delivered trigger by kind
    pub fn inc_trigger(&self, trigger: FlushTrigger) {
        match trigger {
            FlushTrigger::SizeExceeded => self.size_triggers.fetch_add(1, Ordering::Relaxed),
            FlushTrigger::IntervalElapsed => {
                self.interval_triggers.fetch_add(1, Ordering::Relaxed)
            }
            FlushTrigger::Shutdown => 0,
        };
    }

    pub fn inc_coalesced(&self) {
        self.triggers_coalesced.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one completed flush
    pub fn record_flush(&self, records: usize, failed_sinks: usize) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        if records == 0 {
            self.empty_flushes.fetch_add(1, Ordering::Relaxed);
        }
        self.records_flushed
            .fetch_add(records as u64, Ordering::Relaxed);
        self.sink_failures
            .fetch_add(failed_sinks as u64, Ordering::Relaxed);
    }

    /// Get total flush count
    pub fn flushes(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> BatcherMetricsSnapshot {
        BatcherMetricsSnapshot {
            records_appended: self.records_appended.load(Ordering::Relaxed),
            records_dropped: self.records_dropped.load(Ordering::Relaxed),
            appends_rejected: self.appends_rejected.load(Ordering::Relaxed),
            size_triggers: self.size_triggers.load(Ordering::Relaxed),
            interval_triggers: self.interval_triggers.load(Ordering::Relaxed),
            triggers_coalesced: self.triggers_coalesced.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            empty_flushes: self.empty_flushes.load(Ordering::Relaxed),
            records_flushed: self.records_flushed.load(Ordering::Relaxed),
            sink_failures: self.sink_failures.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of engine metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatcherMetricsSnapshot {
    pub records_appended: u64,
    pub records_dropped: u64,
    pub appends_rejected: u64,
    pub size_triggers: u64,
    pub interval_triggers: u64,
    pub triggers_coalesced: u64,
    pub flushes: u64,
    pub empty_flushes: u64,
    pub records_flushed: u64,
    pub sink_failures: u64,
}
