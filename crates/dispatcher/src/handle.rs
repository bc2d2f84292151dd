//! SinkHandle - manages a sink with an isolated worker task

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use contracts::{Batch, BatchSink, ContractError};

use crate::metrics::SinkMetrics;

/// One batch on its way to a sink worker
struct DeliveryJob {
    batch: Arc<Batch>,
    done: oneshot::Sender<Result<(), ContractError>>,
}

/// Result of handing one batch to one sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryResult {
    /// The sink reported success
    Written,
    /// The sink reported a write error
    Failed(String),
    /// The sink worker is gone (panicked or stopped); nothing was written
    Unavailable(String),
}

impl DeliveryResult {
    /// Whether the sink accepted the batch
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Written)
    }
}

/// Receipt for an in-progress delivery
pub struct PendingDelivery {
    state: PendingState,
}

enum PendingState {
    Waiting(oneshot::Receiver<Result<(), ContractError>>),
    Rejected(String),
}

impl PendingDelivery {
    /// Wait for the sink to finish with the batch
    pub async fn outcome(self) -> DeliveryResult {
        match self.state {
            PendingState::Waiting(rx) => match rx.await {
                Ok(Ok(())) => DeliveryResult::Written,
                Ok(Err(e)) => DeliveryResult::Failed(e.to_string()),
                Err(_) => DeliveryResult::Unavailable("sink worker terminated".to_string()),
            },
            PendingState::Rejected(reason) => DeliveryResult::Unavailable(reason),
        }
    }
}

/// Handle to a running sink worker
pub struct SinkHandle {
    /// Sink name
    name: String,
    /// Channel to send batches to worker
    tx: mpsc::Sender<DeliveryJob>,
    /// Shared metrics
    metrics: Arc<SinkMetrics>,
    /// Worker task handle
    worker_handle: JoinHandle<()>,
}

impl SinkHandle {
    /// Create a new SinkHandle and spawn the worker task
    ///
    /// The queue holds a single job: the dispatcher waits for every
    /// delivery before handing over the next batch.
    pub fn spawn<S: BatchSink + Send + 'static>(sink: S) -> Self {
        let name = sink.name().to_string();
        let (tx, rx) = mpsc::channel(1);
        let metrics = Arc::new(SinkMetrics::new());

        let worker_metrics = Arc::clone(&metrics);
        let worker_name = name.clone();

        let worker_handle = tokio::spawn(async move {
            sink_worker(sink, rx, worker_metrics, worker_name).await;
        });

        Self {
            name,
            tx,
            metrics,
            worker_handle,
        }
    }

    /// Get sink name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get current metrics
    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Hand a batch to the worker (non-blocking)
    pub fn deliver(&self, batch: Arc<Batch>) -> PendingDelivery {
        let seq = batch.seq;
        let (done, rx) = oneshot::channel();

        let state = match self.tx.try_send(DeliveryJob { batch, done }) {
            Ok(()) => {
                self.metrics.set_last_seq(seq);
                PendingState::Waiting(rx)
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.metrics.inc_unavailable_count();
                warn!(sink = %self.name, seq, "Sink still busy with previous batch");
                PendingState::Rejected("sink busy".to_string())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.metrics.inc_unavailable_count();
                error!(sink = %self.name, seq, "Sink worker closed unexpectedly");
                PendingState::Rejected("sink worker closed".to_string())
            }
        };

        PendingDelivery { state }
    }

    /// Shutdown the sink worker gracefully
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) {
        // Drop sender to signal worker to stop
        drop(self.tx);
        // Wait for worker to finish
        if let Err(e) = self.worker_handle.await {
            error!(sink = %self.name, error = ?e, "Worker task panicked");
        }
        debug!(sink = %self.name, "SinkHandle shutdown complete");
    }
}

/// Worker task that consumes batches and writes to sink
#[instrument(
    name = "sink_worker_loop",
    skip(sink, rx, metrics),
    fields(sink = %name)
)]
async fn sink_worker<S: BatchSink>(
    mut sink: S,
    mut rx: mpsc::Receiver<DeliveryJob>,
    metrics: Arc<SinkMetrics>,
    name: String,
) {
    debug!(sink = %name, "Sink worker started");

    while let Some(job) = rx.recv().await {
        let started = Instant::now();
        let records = job.batch.len();
        let result = sink.write(&job.batch).await;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        match &result {
            Ok(()) => {
                metrics.record_write(records);
            }
            Err(e) => {
                metrics.inc_failure_count();
                error!(
                    sink = %name,
                    seq = job.batch.seq,
                    records,
                    error = %e,
                    "Write failed"
                );
                // Continue processing - don't crash on single failure
            }
        }
        observability::record_sink_write(&name, result.is_ok(), records, latency_ms);

        // Dispatcher may have stopped waiting; the write already happened
        let _ = job.done.send(result);
    }

    // Cleanup
    if let Err(e) = sink.close().await {
        error!(sink = %name, error = %e, "Close failed on shutdown");
    }

    debug!(sink = %name, "Sink worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use contracts::FlushTrigger;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tokio::time::{sleep, Duration};

    /// Mock sink for testing
    struct MockSink {
        name: String,
        write_count: Arc<AtomicU64>,
        closed: Arc<AtomicU64>,
        should_fail: bool,
        should_panic: bool,
        delay_ms: u64,
    }

    impl MockSink {
        fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                write_count: Arc::new(AtomicU64::new(0)),
                closed: Arc::new(AtomicU64::new(0)),
                should_fail: false,
                should_panic: false,
                delay_ms: 0,
            }
        }
    }

    impl BatchSink for MockSink {
        fn name(&self) -> &str {
            &self.name
        }

        async fn write(&mut self, _batch: &Batch) -> Result<(), ContractError> {
            if self.delay_ms > 0 {
                sleep(Duration::from_millis(self.delay_ms)).await;
            }
            if self.should_panic {
                panic!("mock sink panic");
            }
            if self.should_fail {
                return Err(ContractError::sink_write(&self.name, "mock failure"));
            }
            self.write_count.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            self.closed.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
    }

    fn batch(seq: u64, n: usize) -> Arc<Batch> {
        let records = (0..n).map(|i| Bytes::from(format!("r{i}"))).collect();
        Arc::new(Batch::new(
            seq,
            FlushTrigger::SizeExceeded,
            std::time::Instant::now(),
            records,
        ))
    }

    #[tokio::test]
    async fn test_sink_handle_basic() {
        let sink = MockSink::new("test");
        let write_count = Arc::clone(&sink.write_count);
        let closed = Arc::clone(&sink.closed);

        let handle = SinkHandle::spawn(sink);

        for seq in 0..5 {
            let outcome = handle.deliver(batch(seq, 3)).outcome().await;
            assert_eq!(outcome, DeliveryResult::Written);
        }

        let snap = handle.metrics().snapshot();
        assert_eq!(snap.write_count, 5);
        assert_eq!(snap.records_written, 15);
        assert_eq!(snap.last_seq, 4);

        handle.shutdown().await;
        assert_eq!(write_count.load(Ordering::Relaxed), 5);
        assert_eq!(closed.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_sink_handle_failure_reported() {
        let mut sink = MockSink::new("failing");
        sink.should_fail = true;

        let handle = SinkHandle::spawn(sink);

        for seq in 0..3 {
            let outcome = handle.deliver(batch(seq, 1)).outcome().await;
            assert!(matches!(outcome, DeliveryResult::Failed(ref msg) if msg.contains("mock failure")));
        }

        assert_eq!(handle.metrics().failure_count(), 3);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_sink_handle_busy_while_writing() {
        let mut sink = MockSink::new("slow");
        sink.delay_ms = 100;

        let handle = SinkHandle::spawn(sink);

        let first = handle.deliver(batch(0, 1));
        // Let the worker pick the first job up
        sleep(Duration::from_millis(10)).await;
        let second = handle.deliver(batch(1, 1));
        let third = handle.deliver(batch(2, 1));

        assert_eq!(first.outcome().await, DeliveryResult::Written);
        assert_eq!(second.outcome().await, DeliveryResult::Written);
        assert!(matches!(third.outcome().await, DeliveryResult::Unavailable(_)));
        assert_eq!(handle.metrics().unavailable_count(), 1);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_sink_handle_panic_isolated() {
        let mut sink = MockSink::new("panicky");
        sink.should_panic = true;

        let handle = SinkHandle::spawn(sink);

        let outcome = handle.deliver(batch(0, 1)).outcome().await;
        assert!(matches!(outcome, DeliveryResult::Unavailable(_)));

        // Worker is gone: later deliveries fail fast
        sleep(Duration::from_millis(10)).await;
        let outcome = handle.deliver(batch(1, 1)).outcome().await;
        assert!(matches!(outcome, DeliveryResult::Unavailable(_)));

        handle.shutdown().await;
    }
}
