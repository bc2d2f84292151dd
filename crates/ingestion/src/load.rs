//! Synthetic load generator
//!
//! Spawns `producers` tasks that each append `records_per_producer` JSON
//! records through a `BatcherHandle`, optionally paced.

use std::time::{Duration, Instant};

use bytes::Bytes;
use serde::Serialize;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use batcher::BatcherHandle;

/// Load generator configuration
#[derive(Debug, Clone)]
pub struct LoadConfig {
    /// Concurrent producer tasks
    pub producers: usize,
    /// Records appended by each producer
    pub records_per_producer: usize,
    /// Delay between two appends of one producer (None = as fast as possible)
    pub pace: Option<Duration>,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            producers: 4,
            records_per_producer: 1000,
            pace: None,
        }
    }
}

#[derive(Serialize)]
struct SyntheticEvent {
    producer: usize,
    seq: usize,
    event: &'static str,
}

/// Outcome of one load run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    /// Records appended
    pub sent: u64,
    /// Whether cancellation cut the run short
    pub cancelled: bool,
    pub elapsed: Duration,
}

/// Synthetic producers
pub struct LoadGenerator {
    config: LoadConfig,
}

impl LoadGenerator {
    pub fn new(config: LoadConfig) -> Self {
        Self { config }
    }

    /// Run every producer to completion or until `cancel` fires
    #[instrument(
        name = "load_generator",
        skip(self, handle, cancel),
        fields(producers = self.config.producers, records = self.config.records_per_producer)
    )]
    pub async fn run(&self, handle: BatcherHandle, cancel: CancellationToken) -> LoadReport {
        let started = Instant::now();
        let mut tasks = JoinSet::new();

        for producer in 0..self.config.producers {
            let handle = handle.clone();
            let cancel = cancel.clone();
            let records = self.config.records_per_producer;
            let pace = self.config.pace;
            tasks.spawn(produce(producer, records, pace, handle, cancel));
        }

        let mut sent = 0;
        while let Some(result) = tasks.join_next().await {
            match result {
                Ok(count) => sent += count,
                Err(e) => warn!(error = %e, "Producer task failed"),
            }
        }

        let report = LoadReport {
            sent,
            cancelled: cancel.is_cancelled(),
            elapsed: started.elapsed(),
        };
        info!(
            sent = report.sent,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Load generation finished"
        );
        report
    }
}

async fn produce(
    producer: usize,
    records: usize,
    pace: Option<Duration>,
    handle: BatcherHandle,
    cancel: CancellationToken,
) -> u64 {
    let mut ticker = pace.map(|period| {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });

    let mut sent = 0;
    for seq in 0..records {
        if cancel.is_cancelled() {
            break;
        }
        if let Some(ticker) = ticker.as_mut() {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
        }

        let event = SyntheticEvent {
            producer,
            seq,
            event: "synthetic",
        };
        match serde_json::to_vec(&event) {
            Ok(payload) => {
                handle.append(Bytes::from(payload));
                sent += 1;
            }
            Err(e) => warn!(producer, seq, error = %e, "Failed to encode event"),
        }

        // Unpaced producers still let the runtime breathe
        if ticker.is_none() && seq % 256 == 255 {
            tokio::task::yield_now().await;
        }
    }

    debug!(producer, sent, "Producer done");
    sent
}

#[cfg(test)]
mod tests {
    use super::*;
    use batcher::{Batcher, BatcherConfig};
    use dispatcher::Dispatcher;

    fn engine() -> Batcher {
        let config = BatcherConfig::new(1_000_000, Duration::from_secs(3600)).unwrap();
        Batcher::new(config, Dispatcher::with_handles(Vec::new())).unwrap()
    }

    #[tokio::test]
    async fn test_generates_all_records() {
        let batcher = engine();
        let handle = batcher.handle();
        let generator = LoadGenerator::new(LoadConfig {
            producers: 3,
            records_per_producer: 100,
            pace: None,
        });

        let report = generator.run(handle.clone(), CancellationToken::new()).await;
        assert_eq!(report.sent, 300);
        assert!(!report.cancelled);
        assert_eq!(handle.buffered_len(), 300);
    }

    #[tokio::test(start_paused = true)]
    async fn test_paced_run_stops_on_cancel() {
        let batcher = engine();
        let handle = batcher.handle();
        let generator = LoadGenerator::new(LoadConfig {
            producers: 2,
            records_per_producer: 1000,
            pace: Some(Duration::from_millis(10)),
        });
        let cancel = CancellationToken::new();

        let stopper = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(95)).await;
                cancel.cancel();
            })
        };

        let report = generator.run(handle, cancel).await;
        stopper.await.unwrap();
        assert!(report.cancelled);
        assert!(report.sent > 0 && report.sent < 2000);
    }

    #[tokio::test]
    async fn test_single_producer_single_record() {
        let batcher = engine();
        let handle = batcher.handle();
        let generator = LoadGenerator::new(LoadConfig {
            producers: 1,
            records_per_producer: 1,
            pace: None,
        });
        generator.run(handle.clone(), CancellationToken::new()).await;
        assert_eq!(handle.metrics().records_appended, 1);
    }
}
