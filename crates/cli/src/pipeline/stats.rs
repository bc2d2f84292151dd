//! Pipeline statistics.

use std::time::Duration;

use batcher::BatcherSummary;
use ingestion::{IngestionMetricsSnapshot, LoadReport};

/// Statistics from a pipeline run
#[derive(Debug, Clone)]
pub struct PipelineStats {
    /// Total duration of the run
    pub duration: Duration,

    /// Number of sinks batches were dispatched to
    pub active_sinks: usize,

    /// HTTP endpoint counters
    pub ingestion: IngestionMetricsSnapshot,

    /// Synthetic load outcome, when enabled
    pub load: Option<LoadReport>,

    /// Engine, flush and per-sink statistics
    pub summary: BatcherSummary,
}

impl PipelineStats {
    /// Records handed to the sinks
    pub fn throughput_records(&self) -> u64 {
        self.summary.metrics.records_flushed
    }

    /// Flushed records per second
    pub fn records_per_sec(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.throughput_records() as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        let metrics = &self.summary.metrics;

        println!("\n=== Bulkline Statistics ===\n");
        println!("Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Records appended: {}", metrics.records_appended);
        println!("   ├─ Records flushed: {}", metrics.records_flushed);
        println!("   ├─ Throughput: {:.2} records/s", self.records_per_sec());
        println!(
            "   ├─ Dropped / rejected: {} / {}",
            metrics.records_dropped, metrics.appends_rejected
        );
        println!("   └─ Active sinks: {}", self.active_sinks);

        println!("\nIngestion");
        println!("   ├─ HTTP requests: {}", self.ingestion.requests);
        println!("   ├─ Bad requests: {}", self.ingestion.bad_requests);
        match &self.load {
            Some(load) => {
                println!("   ├─ Records via HTTP: {}", self.ingestion.records_accepted);
                println!("   └─ Synthetic records: {}", load.sent);
            }
            None => println!("   └─ Records via HTTP: {}", self.ingestion.records_accepted),
        }

        println!("\nTriggers");
        println!("   ├─ Size: {}", metrics.size_triggers);
        println!("   ├─ Interval: {}", metrics.interval_triggers);
        println!("   └─ Coalesced: {}", metrics.triggers_coalesced);

        println!("\n{}", self.summary.flushes);

        if !self.summary.sinks.is_empty() {
            println!("Sinks");
            let last = self.summary.sinks.len() - 1;
            for (i, (name, sink)) in self.summary.sinks.iter().enumerate() {
                let prefix = if i == last { "└─" } else { "├─" };
                println!(
                    "   {} {}: writes={}, records={}, failures={}, unavailable={}",
                    prefix,
                    name,
                    sink.write_count,
                    sink.records_written,
                    sink.failure_count,
                    sink.unavailable_count
                );
            }
        }

        println!();
    }
}
