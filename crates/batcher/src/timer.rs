//! Window timer - periodic interval trigger

use std::future;
use std::sync::Arc;
use std::time::Duration;

use contracts::FlushTrigger;
use tokio::sync::Notify;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::config::MAX_INTERVAL;
use crate::trigger::TriggerSender;

/// Fires `IntervalElapsed` every `interval`, whatever the accumulator holds
///
/// The first tick comes one full interval after start. With a reset handle,
/// every notification restarts the period from that instant. Periods longer
/// than [`MAX_INTERVAL`] are clamped to it.
#[derive(Debug)]
pub struct WindowTimer {
    interval: Duration,
    trigger: TriggerSender,
    reset: Option<Arc<Notify>>,
}

impl WindowTimer {
    /// Create a fixed-cadence timer
    pub fn new(interval: Duration, trigger: TriggerSender) -> Self {
        Self {
            interval: interval.min(MAX_INTERVAL),
            trigger,
            reset: None,
        }
    }

    /// Restart the period whenever `reset` is notified
    pub fn with_reset(mut self, reset: Arc<Notify>) -> Self {
        self.reset = Some(reset);
        self
    }

    /// Run until cancelled
    #[instrument(name = "window_timer", skip(self, cancel), fields(interval_ms = self.interval.as_millis() as u64))]
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!("Window timer started");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = Self::reset_requested(self.reset.as_deref()) => {
                    ticker.reset();
                }
                _ = ticker.tick() => {
                    self.trigger.fire(FlushTrigger::IntervalElapsed);
                }
            }
        }

        debug!("Window timer stopped");
    }

    async fn reset_requested(reset: Option<&Notify>) {
        match reset {
            Some(notify) => notify.notified().await,
            None => future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::BatcherMetrics;
    use crate::trigger::trigger_channel;

    #[tokio::test(start_paused = true)]
    async fn test_fires_each_interval() {
        let metrics = Arc::new(BatcherMetrics::new());
        let (tx, mut rx) = trigger_channel(Arc::clone(&metrics));
        let cancel = CancellationToken::new();

        let timer = WindowTimer::new(Duration::from_secs(1), tx);
        let task = tokio::spawn(timer.run(cancel.clone()));

        let start = Instant::now();
        for n in 1..=3u64 {
            assert_eq!(rx.recv().await, Some(FlushTrigger::IntervalElapsed));
            assert_eq!(start.elapsed().as_secs(), n);
        }

        cancel.cancel();
        task.await.unwrap();
        assert_eq!(metrics.snapshot().interval_triggers, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_tick_before_first_interval() {
        let metrics = Arc::new(BatcherMetrics::new());
        let (tx, _rx) = trigger_channel(Arc::clone(&metrics));
        let cancel = CancellationToken::new();

        let task = tokio::spawn(WindowTimer::new(Duration::from_secs(5), tx).run(cancel.clone()));
        tokio::time::sleep(Duration::from_millis(4900)).await;
        assert_eq!(metrics.snapshot().interval_triggers, 0);

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_on_cancel() {
        let metrics = Arc::new(BatcherMetrics::new());
        let (tx, _rx) = trigger_channel(Arc::clone(&metrics));
        let cancel = CancellationToken::new();

        let task = tokio::spawn(WindowTimer::new(Duration::from_secs(1), tx).run(cancel.clone()));
        cancel.cancel();
        task.await.unwrap();

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(metrics.snapshot().interval_triggers, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_interval_is_clamped() {
        let metrics = Arc::new(BatcherMetrics::new());
        let (tx, _rx) = trigger_channel(Arc::clone(&metrics));
        let cancel = CancellationToken::new();
        let reset = Arc::new(Notify::new());

        let timer = WindowTimer::new(Duration::MAX, tx).with_reset(Arc::clone(&reset));
        assert_eq!(timer.interval, MAX_INTERVAL);
        let task = tokio::spawn(timer.run(cancel.clone()));

        tokio::time::sleep(Duration::from_secs(60)).await;
        reset.notify_one();
        tokio::time::sleep(Duration::from_secs(60)).await;
        cancel.cancel();

        // A panic here would surface as a JoinError
        task.await.unwrap();
        assert_eq!(metrics.snapshot().interval_triggers, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_restarts_period() {
        let metrics = Arc::new(BatcherMetrics::new());
        let (tx, mut rx) = trigger_channel(Arc::clone(&metrics));
        let cancel = CancellationToken::new();
        let reset = Arc::new(Notify::new());

        let timer = WindowTimer::new(Duration::from_secs(2), tx).with_reset(Arc::clone(&reset));
        let task = tokio::spawn(timer.run(cancel.clone()));

        let start = Instant::now();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        reset.notify_one();

        assert_eq!(rx.recv().await, Some(FlushTrigger::IntervalElapsed));
        assert_eq!(start.elapsed().as_millis(), 3500);

        cancel.cancel();
        task.await.unwrap();
    }
}
