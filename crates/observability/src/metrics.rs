//! 批处理指标收集模块
//!
//! Free functions feed the global `metrics` recorder (Prometheus when
//! installed, a no-op otherwise). `FlushStatsAggregator` keeps in-memory
//! statistics for the summary printed at the end of a run.

use std::collections::HashMap;

use contracts::FlushTrigger;
use metrics::{counter, gauge, histogram};

/// One completed flush, as seen by the flush worker
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlushSample {
    pub trigger: FlushTrigger,
    pub records: usize,
    pub bytes: usize,
    /// Sinks that did not accept the batch
    pub failed_sinks: usize,
    /// Hand-over to last sink outcome
    pub dispatch_ms: f64,
    /// Time the window was open before detach
    pub window_ms: f64,
}

/// Record a flush request from a producer or the timer
pub fn record_trigger(trigger: FlushTrigger, coalesced: bool) {
    let status = if coalesced { "coalesced" } else { "queued" };
    counter!(
        "bulkline_triggers_total",
        "trigger" => trigger.as_str(),
        "status" => status
    )
    .increment(1);
}

/// Record one append attempt
pub fn record_append(accepted: bool) {
    if accepted {
        counter!("bulkline_records_appended_total").increment(1);
    } else {
        counter!("bulkline_records_dropped_total").increment(1);
    }
}

/// Record the open batch depth
pub fn record_buffered(depth: usize) {
    gauge!("bulkline_buffered_records").set(depth as f64);
}

/// 记录一次完成的 flush
pub fn record_flush(sample: &FlushSample) {
    counter!("bulkline_flushes_total", "trigger" => sample.trigger.as_str()).increment(1);
    counter!("bulkline_records_flushed_total").increment(sample.records as u64);
    histogram!("bulkline_batch_records").record(sample.records as f64);
    histogram!("bulkline_batch_bytes").record(sample.bytes as f64);
    histogram!("bulkline_dispatch_latency_ms").record(sample.dispatch_ms);
    histogram!("bulkline_window_age_ms").record(sample.window_ms);

    if sample.failed_sinks > 0 {
        counter!("bulkline_flushes_with_failures_total").increment(1);
    }
}

/// 记录一次 sink 写入
pub fn record_sink_write(sink_name: &str, success: bool, records: usize, latency_ms: f64) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "bulkline_sink_writes_total",
        "sink" => sink_name.to_string(),
        "status" => status
    )
    .increment(1);

    if success {
        counter!("bulkline_sink_records_total", "sink" => sink_name.to_string())
            .increment(records as u64);
    }

    histogram!("bulkline_sink_write_latency_ms", "sink" => sink_name.to_string())
        .record(latency_ms);
}

/// Record one ingestion HTTP request
pub fn record_http_request(route: &'static str, status: u16) {
    counter!(
        "bulkline_http_requests_total",
        "route" => route,
        "status" => status.to_string()
    )
    .increment(1);
}

/// Flush 统计聚合器
///
/// 在内存中聚合指标，便于统计和输出摘要。
#[derive(Debug, Clone, Default)]
pub struct FlushStatsAggregator {
    pub total_flushes: u64,
    pub empty_flushes: u64,
    pub flushes_with_failures: u64,
    pub total_records: u64,
    pub total_bytes: u64,
    pub trigger_counts: HashMap<FlushTrigger, u64>,
    pub batch_size_stats: RunningStats,
    pub dispatch_stats: RunningStats,
    pub window_stats: RunningStats,
}

impl FlushStatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新聚合统计
    pub fn update(&mut self, sample: &FlushSample) {
        self.total_flushes += 1;
        if sample.records == 0 {
            self.empty_flushes += 1;
        }
        if sample.failed_sinks > 0 {
            self.flushes_with_failures += 1;
        }
        self.total_records += sample.records as u64;
        self.total_bytes += sample.bytes as u64;
        *self.trigger_counts.entry(sample.trigger).or_insert(0) += 1;

        self.batch_size_stats.push(sample.records as f64);
        self.dispatch_stats.push(sample.dispatch_ms);
        self.window_stats.push(sample.window_ms);
    }

    /// 生成摘要报告
    pub fn summary(&self) -> FlushStatsSummary {
        let count = |t: FlushTrigger| self.trigger_counts.get(&t).copied().unwrap_or(0);
        FlushStatsSummary {
            total_flushes: self.total_flushes,
            empty_flushes: self.empty_flushes,
            flushes_with_failures: self.flushes_with_failures,
            total_records: self.total_records,
            total_bytes: self.total_bytes,
            size_flushes: count(FlushTrigger::SizeExceeded),
            interval_flushes: count(FlushTrigger::IntervalElapsed),
            shutdown_flushes: count(FlushTrigger::Shutdown),
            failure_rate: if self.total_flushes > 0 {
                self.flushes_with_failures as f64 / self.total_flushes as f64 * 100.0
            } else {
                0.0
            },
            batch_records: StatsSummary::from(&self.batch_size_stats),
            dispatch_ms: StatsSummary::from(&self.dispatch_stats),
            window_ms: StatsSummary::from(&self.window_stats),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Flush statistics summary
#[derive(Debug, Clone, Default)]
pub struct FlushStatsSummary {
    pub total_flushes: u64,
    pub empty_flushes: u64,
    pub flushes_with_failures: u64,
    pub total_records: u64,
    pub total_bytes: u64,
    pub size_flushes: u64,
    pub interval_flushes: u64,
    pub shutdown_flushes: u64,
    pub failure_rate: f64,
    pub batch_records: StatsSummary,
    pub dispatch_ms: StatsSummary,
    pub window_ms: StatsSummary,
}

impl std::fmt::Display for FlushStatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Flush Summary ===")?;
        writeln!(
            f,
            "Flushes: {} (size={}, interval={}, shutdown={}, empty={})",
            self.total_flushes,
            self.size_flushes,
            self.interval_flushes,
            self.shutdown_flushes,
            self.empty_flushes
        )?;
        writeln!(
            f,
            "Records: {} ({} bytes)",
            self.total_records, self.total_bytes
        )?;
        writeln!(
            f,
            "Flushes with sink failures: {} ({:.2}%)",
            self.flushes_with_failures, self.failure_rate
        )?;
        writeln!(f, "Batch records: {}", self.batch_records)?;
        writeln!(f, "Dispatch latency (ms): {}", self.dispatch_ms)?;
        writeln!(f, "Window age (ms): {}", self.window_ms)?;
        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计 (Welford 算法)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// Add a value
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
