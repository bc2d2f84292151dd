//! Flush coordinator - the worker loop that turns triggers into flushes
//!
//! ```text
//!            trigger                    dispatch returns
//!   Idle ───────────────▶ Dispatching ───────────────────▶ Idle
//!    │
//!    └── cancellation ──▶ (shutdown drain) ──▶ Stopped
//! ```
//!
//! Flushes are strictly sequential: the next trigger is only received once
//! the current dispatch has completed. Cancellation is checked between
//! flushes, never in the middle of one.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use contracts::{FlushTrigger, ShutdownPolicy};
use dispatcher::{DispatchReport, Dispatcher};
use observability::{FlushSample, FlushStatsAggregator, FlushStatsSummary};

use crate::accumulator::Accumulator;
use crate::metrics::BatcherMetrics;
use crate::trigger::TriggerReceiver;

/// Where the flush worker is in its loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    /// Waiting for a trigger
    Idle,
    /// A detached batch is being handed to the sinks
    Dispatching,
    /// The worker loop has exited
    Stopped,
}

impl CoordinatorState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Idle,
            1 => Self::Dispatching,
            _ => Self::Stopped,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Dispatching => 1,
            Self::Stopped => 2,
        }
    }
}

impl fmt::Display for CoordinatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Dispatching => "dispatching",
            Self::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Coordinator state readable from outside the worker task
#[derive(Debug, Default)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn get(&self) -> CoordinatorState {
        CoordinatorState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: CoordinatorState) {
        self.0.store(state.as_u8(), Ordering::Release);
    }
}

/// What the worker hands back once it stops
pub(crate) struct CoordinatorExit {
    pub dispatcher: Dispatcher,
    pub stats: FlushStatsSummary,
}

/// The single flush worker
pub struct FlushCoordinator {
    accumulator: Arc<Accumulator>,
    dispatcher: Dispatcher,
    triggers: TriggerReceiver,
    state: Arc<StateCell>,
    metrics: Arc<BatcherMetrics>,
    timer_reset: Option<Arc<Notify>>,
    shutdown_policy: ShutdownPolicy,
    stats: FlushStatsAggregator,
}

impl FlushCoordinator {
    pub(crate) fn new(
        accumulator: Arc<Accumulator>,
        dispatcher: Dispatcher,
        triggers: TriggerReceiver,
        state: Arc<StateCell>,
        metrics: Arc<BatcherMetrics>,
        shutdown_policy: ShutdownPolicy,
    ) -> Self {
        Self {
            accumulator,
            dispatcher,
            triggers,
            state,
            metrics,
            timer_reset: None,
            shutdown_policy,
            stats: FlushStatsAggregator::new(),
        }
    }

    /// Notify `reset` after every flush
    pub(crate) fn with_timer_reset(mut self, reset: Arc<Notify>) -> Self {
        self.timer_reset = Some(reset);
        self
    }

    /// Current state
    pub fn state(&self) -> CoordinatorState {
        self.state.get()
    }

    /// Run the worker loop until cancelled, then apply the shutdown policy
    #[instrument(name = "flush_coordinator", skip_all)]
    pub(crate) async fn run(mut self, cancel: CancellationToken) -> CoordinatorExit {
        self.state.set(CoordinatorState::Idle);
        debug!("Flush worker started");

        loop {
            let trigger = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                received = self.triggers.recv() => match received {
                    Some(trigger) => trigger,
                    None => break,
                },
            };

            self.flush(trigger).await;
        }

        self.drain_on_shutdown().await;
        self.state.set(CoordinatorState::Stopped);

        let stats = self.stats.summary();
        info!(
            flushes = stats.total_flushes,
            records = stats.total_records,
            "Flush worker stopped"
        );

        CoordinatorExit {
            dispatcher: self.dispatcher,
            stats,
        }
    }

    /// Detach the open batch and dispatch it to every sink
    async fn flush(&mut self, trigger: FlushTrigger) -> DispatchReport {
        self.state.set(CoordinatorState::Dispatching);

        let batch = self.accumulator.detach(trigger);
        let window_ms = batch.opened_at.elapsed().as_secs_f64() * 1000.0;
        observability::record_buffered(self.accumulator.len());

        let started = Instant::now();
        let report = self.dispatcher.dispatch(batch).await;

        self.record(&report, started, window_ms);

        if let Some(reset) = &self.timer_reset {
            reset.notify_one();
        }

        self.state.set(CoordinatorState::Idle);
        report
    }

    fn record(&mut self, report: &DispatchReport, started: Instant, window_ms: f64) {
        let failed_sinks = report.failed_count();
        self.metrics.record_flush(report.records, failed_sinks);

        let sample = FlushSample {
            trigger: report.trigger,
            records: report.records,
            bytes: report.bytes,
            failed_sinks,
            dispatch_ms: started.elapsed().as_secs_f64() * 1000.0,
            window_ms,
        };
        observability::record_flush(&sample);
        self.stats.update(&sample);

        for failure in report.failures() {
            warn!(
                seq = report.seq,
                sink = %failure.sink,
                result = ?failure.result,
                "Sink did not accept batch"
            );
        }

        debug!(
            seq = report.seq,
            trigger = %report.trigger,
            records = report.records,
            failed = failed_sinks,
            "Flush complete"
        );
    }

    async fn drain_on_shutdown(&mut self) {
        let pending = self.accumulator.len();
        if pending == 0 {
            return;
        }

        match self.shutdown_policy {
            ShutdownPolicy::FlushPending => {
                info!(records = pending, "Flushing open batch on shutdown");
                self.flush(FlushTrigger::Shutdown).await;
            }
            ShutdownPolicy::Discard => {
                warn!(records = pending, "Discarding open batch on shutdown");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BatcherConfig;
    use crate::trigger::{trigger_channel, TriggerSender};
    use bytes::Bytes;
    use contracts::{Batch, BatchSink, ContractError};
    use dispatcher::SinkHandle;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::Semaphore;

    /// Sink that blocks each write until a permit is released
    struct GatedSink {
        gate: Arc<Semaphore>,
        seen: Arc<Mutex<Vec<(u64, FlushTrigger, usize)>>>,
    }

    impl BatchSink for GatedSink {
        fn name(&self) -> &str {
            "gated"
        }

        async fn write(&mut self, batch: &Batch) -> Result<(), ContractError> {
            let permit = self.gate.acquire().await.map_err(|e| ContractError::Other(e.to_string()))?;
            permit.forget();
            self.seen
                .lock()
                .unwrap()
                .push((batch.seq, batch.trigger, batch.len()));
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    struct Fixture {
        coordinator: FlushCoordinator,
        accumulator: Arc<Accumulator>,
        trigger: TriggerSender,
        state: Arc<StateCell>,
        gate: Arc<Semaphore>,
        seen: Arc<Mutex<Vec<(u64, FlushTrigger, usize)>>>,
    }

    fn fixture(policy: ShutdownPolicy) -> Fixture {
        let config = BatcherConfig::new(100, Duration::from_secs(60)).unwrap();
        let metrics = Arc::new(BatcherMetrics::new());
        let (tx, rx) = trigger_channel(Arc::clone(&metrics));
        let accumulator = Arc::new(Accumulator::new(&config, tx.clone(), Arc::clone(&metrics)));

        let gate = Arc::new(Semaphore::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = GatedSink {
            gate: Arc::clone(&gate),
            seen: Arc::clone(&seen),
        };
        let dispatcher = Dispatcher::with_handles(vec![SinkHandle::spawn(sink)]);

        let state = Arc::new(StateCell::default());
        let coordinator = FlushCoordinator::new(
            Arc::clone(&accumulator),
            dispatcher,
            rx,
            Arc::clone(&state),
            metrics,
            policy,
        );

        Fixture {
            coordinator,
            accumulator,
            trigger: tx,
            state,
            gate,
            seen,
        }
    }

    async fn wait_for(state: &StateCell, wanted: CoordinatorState) {
        while state.get() != wanted {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_dispatching_state_and_cancel_waits_for_flush() {
        let f = fixture(ShutdownPolicy::Discard);
        let cancel = CancellationToken::new();

        f.accumulator.append(Bytes::from_static(b"a"));
        let worker = tokio::spawn(f.coordinator.run(cancel.clone()));
        f.trigger.fire(FlushTrigger::IntervalElapsed);

        wait_for(&f.state, CoordinatorState::Dispatching).await;

        // Records appended mid-dispatch land in the next window
        f.accumulator.append(Bytes::from_static(b"b"));
        cancel.cancel();
        tokio::task::yield_now().await;
        assert_eq!(f.state.get(), CoordinatorState::Dispatching);

        f.gate.add_permits(1);
        let exit = worker.await.unwrap();

        assert_eq!(f.state.get(), CoordinatorState::Stopped);
        assert_eq!(exit.stats.total_flushes, 1);
        assert_eq!(*f.seen.lock().unwrap(), vec![(0, FlushTrigger::IntervalElapsed, 1)]);
        // Discard leaves the open batch alone
        assert_eq!(f.accumulator.len(), 1);
        exit.dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_flush_pending_on_shutdown() {
        let f = fixture(ShutdownPolicy::FlushPending);
        let cancel = CancellationToken::new();
        f.gate.add_permits(10);

        f.accumulator.append(Bytes::from_static(b"x"));
        f.accumulator.append(Bytes::from_static(b"y"));
        cancel.cancel();

        let exit = f.coordinator.run(cancel).await;
        assert_eq!(exit.stats.shutdown_flushes, 1);
        assert_eq!(*f.seen.lock().unwrap(), vec![(0, FlushTrigger::Shutdown, 2)]);
        assert!(f.accumulator.is_empty());
        exit.dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_no_shutdown_flush_when_empty() {
        let f = fixture(ShutdownPolicy::FlushPending);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let exit = f.coordinator.run(cancel).await;
        assert_eq!(exit.stats.total_flushes, 0);
        assert!(f.seen.lock().unwrap().is_empty());
        exit.dispatcher.shutdown().await;
    }

    #[test]
    fn test_state_cell_roundtrip() {
        let cell = StateCell::default();
        assert_eq!(cell.get(), CoordinatorState::Idle);
        cell.set(CoordinatorState::Dispatching);
        assert_eq!(cell.get(), CoordinatorState::Dispatching);
        cell.set(CoordinatorState::Stopped);
        assert_eq!(cell.get().to_string(), "stopped");
    }
}
