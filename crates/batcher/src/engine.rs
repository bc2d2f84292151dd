//! Batcher engine - wires the accumulator, timer and flush worker together

use std::sync::Arc;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

use contracts::Record;
use dispatcher::{Dispatcher, MetricsSnapshot};
use observability::FlushStatsSummary;

use crate::accumulator::Accumulator;
use crate::config::BatcherConfig;
use crate::coordinator::{CoordinatorExit, CoordinatorState, FlushCoordinator, StateCell};
use crate::error::{BatcherError, Result};
use crate::metrics::{BatcherMetrics, BatcherMetricsSnapshot};
use crate::timer::WindowTimer;
use crate::trigger::{trigger_channel, TriggerReceiver};

/// A constructed, not yet running engine
pub struct Batcher {
    config: BatcherConfig,
    accumulator: Arc<Accumulator>,
    triggers: TriggerReceiver,
    dispatcher: Dispatcher,
    metrics: Arc<BatcherMetrics>,
}

impl Batcher {
    /// Build an engine around a dispatcher
    ///
    /// # Errors
    /// `InvalidConfig` if the window parameters are out of range.
    pub fn new(config: BatcherConfig, dispatcher: Dispatcher) -> Result<Self> {
        config.validate()?;

        let metrics = Arc::new(BatcherMetrics::new());
        let (trigger, triggers) = trigger_channel(Arc::clone(&metrics));
        let accumulator = Arc::new(Accumulator::new(&config, trigger, Arc::clone(&metrics)));

        Ok(Self {
            config,
            accumulator,
            triggers,
            dispatcher,
            metrics,
        })
    }

    /// Producer handle; appends are accepted before `run` as well
    pub fn handle(&self) -> BatcherHandle {
        BatcherHandle {
            accumulator: Arc::clone(&self.accumulator),
            metrics: Arc::clone(&self.metrics),
        }
    }

    pub fn config(&self) -> &BatcherConfig {
        &self.config
    }

    /// Spawn the window timer and the flush worker
    ///
    /// Both stop when `cancel` fires; await `RunningBatcher::join` afterwards.
    #[instrument(
        name = "batcher_run",
        skip(self, cancel),
        fields(
            max_batch_size = self.config.max_batch_size,
            interval_ms = self.config.interval.as_millis() as u64,
            sinks = self.dispatcher.sink_count()
        )
    )]
    pub fn run(self, cancel: CancellationToken) -> RunningBatcher {
        let handle = self.handle();
        let state = Arc::new(StateCell::default());

        let mut timer = WindowTimer::new(self.config.interval, self.accumulator.trigger());
        let mut coordinator = FlushCoordinator::new(
            Arc::clone(&self.accumulator),
            self.dispatcher,
            self.triggers,
            Arc::clone(&state),
            Arc::clone(&self.metrics),
            self.config.shutdown_policy,
        );

        if self.config.reset_timer_on_flush {
            let reset = Arc::new(Notify::new());
            timer = timer.with_reset(Arc::clone(&reset));
            coordinator = coordinator.with_timer_reset(reset);
        }

        let timer_task = tokio::spawn(timer.run(cancel.clone()));
        let worker_task = tokio::spawn(coordinator.run(cancel));

        info!("Batcher started");

        RunningBatcher {
            handle,
            state,
            timer_task,
            worker_task,
        }
    }
}

/// Cheap, cloneable producer handle
#[derive(Debug, Clone)]
pub struct BatcherHandle {
    accumulator: Arc<Accumulator>,
    metrics: Arc<BatcherMetrics>,
}

impl BatcherHandle {
    /// Fire-and-forget append
    pub fn append(&self, record: impl Into<Record>) {
        self.accumulator.append(record.into());
    }

    /// Append, refusing at the hard cap
    pub fn try_append(&self, record: impl Into<Record>) -> Result<()> {
        self.accumulator.try_append(record.into())
    }

    /// Records waiting in the open batch
    pub fn buffered_len(&self) -> usize {
        self.accumulator.len()
    }

    pub fn metrics(&self) -> BatcherMetricsSnapshot {
        self.metrics.snapshot()
    }
}

/// A running engine
pub struct RunningBatcher {
    handle: BatcherHandle,
    state: Arc<StateCell>,
    timer_task: JoinHandle<()>,
    worker_task: JoinHandle<CoordinatorExit>,
}

impl RunningBatcher {
    pub fn handle(&self) -> BatcherHandle {
        self.handle.clone()
    }

    /// Current flush worker state
    pub fn state(&self) -> CoordinatorState {
        self.state.get()
    }

    /// Wait for the timer and worker to exit, then close every sink
    ///
    /// Only returns once the cancellation token passed to `run` has fired.
    /// Both tasks are awaited even when one has failed; the first failure is
    /// returned after the sinks are closed.
    #[instrument(name = "batcher_join", skip(self))]
    pub async fn join(self) -> Result<BatcherSummary> {
        let timer = self.timer_task.await.map_err(|e| BatcherError::TaskFailed {
            task: "window_timer",
            message: e.to_string(),
        });
        let worker = self.worker_task.await.map_err(|e| BatcherError::TaskFailed {
            task: "flush_worker",
            message: e.to_string(),
        });

        let exit = match worker {
            Ok(exit) => exit,
            Err(e) => {
                error!(error = %e, "Flush worker failed; open batch lost");
                return Err(e);
            }
        };

        let sinks = exit.dispatcher.metrics();
        exit.dispatcher.shutdown().await;

        if let Err(e) = timer {
            error!(error = %e, "Window timer failed");
            return Err(e);
        }

        let summary = BatcherSummary {
            metrics: self.handle.metrics(),
            sinks,
            flushes: exit.stats,
        };
        info!(
            flushes = summary.metrics.flushes,
            records = summary.metrics.records_flushed,
            "Batcher stopped"
        );
        Ok(summary)
    }
}

/// Final report of one engine run
#[derive(Debug, Clone)]
pub struct BatcherSummary {
    pub metrics: BatcherMetricsSnapshot,
    /// Per-sink metrics, in registration order
    pub sinks: Vec<(String, MetricsSnapshot)>,
    pub flushes: FlushStatsSummary,
}
