//! Flush trigger channel
//!
//! A single-slot, non-blocking, coalescing signal from producers and the
//! window timer to the flush worker. While a trigger is pending any further
//! trigger is dropped: the pending one already guarantees a flush.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::trace;

use contracts::FlushTrigger;

use crate::metrics::BatcherMetrics;

/// Create a connected trigger sender/receiver pair
pub fn trigger_channel(metrics: Arc<BatcherMetrics>) -> (TriggerSender, TriggerReceiver) {
    let (tx, rx) = mpsc::channel(1);
    (TriggerSender { tx, metrics }, TriggerReceiver { rx })
}

/// Sending half, cloned into the accumulator and the timer
#[derive(Debug, Clone)]
pub struct TriggerSender {
    tx: mpsc::Sender<FlushTrigger>,
    metrics: Arc<BatcherMetrics>,
}

impl TriggerSender {
    /// Request a flush without ever waiting
    ///
    /// Returns true if the trigger was queued, false if it was coalesced into
    /// a pending one or the worker is gone.
    pub fn fire(&self, trigger: FlushTrigger) -> bool {
        match self.tx.try_send(trigger) {
            Ok(()) => {
                self.metrics.inc_trigger(trigger);
                observability::record_trigger(trigger, false);
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.metrics.inc_coalesced();
                observability::record_trigger(trigger, true);
                trace!(%trigger, "Trigger coalesced into pending one");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                trace!(%trigger, "Flush worker stopped, trigger ignored");
                false
            }
        }
    }

    /// Whether a trigger is waiting for the worker
    pub fn is_pending(&self) -> bool {
        self.tx.capacity() == 0
    }
}

/// Receiving half, owned by the flush worker
#[derive(Debug)]
pub struct TriggerReceiver {
    rx: mpsc::Receiver<FlushTrigger>,
}

impl TriggerReceiver {
    /// Wait for the next trigger
    ///
    /// Returns None once every sender is dropped.
    pub async fn recv(&mut self) -> Option<FlushTrigger> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fire_delivers() {
        let metrics = Arc::new(BatcherMetrics::new());
        let (tx, mut rx) = trigger_channel(Arc::clone(&metrics));

        assert!(tx.fire(FlushTrigger::SizeExceeded));
        assert!(tx.is_pending());
        assert_eq!(rx.recv().await, Some(FlushTrigger::SizeExceeded));
        assert!(!tx.is_pending());
    }

    #[tokio::test]
    async fn test_second_trigger_coalesced() {
        let metrics = Arc::new(BatcherMetrics::new());
        let (tx, mut rx) = trigger_channel(Arc::clone(&metrics));

        assert!(tx.fire(FlushTrigger::IntervalElapsed));
        // Never blocks, even with nobody receiving
        assert!(!tx.fire(FlushTrigger::SizeExceeded));
        assert!(!tx.fire(FlushTrigger::SizeExceeded));

        assert_eq!(rx.recv().await, Some(FlushTrigger::IntervalElapsed));
        let snap = metrics.snapshot();
        assert_eq!(snap.interval_triggers, 1);
        assert_eq!(snap.size_triggers, 0);
        assert_eq!(snap.triggers_coalesced, 2);

        // Slot is free again
        assert!(tx.fire(FlushTrigger::SizeExceeded));
        assert_eq!(rx.recv().await, Some(FlushTrigger::SizeExceeded));
    }

    #[tokio::test]
    async fn test_fire_after_receiver_dropped() {
        let metrics = Arc::new(BatcherMetrics::new());
        let (tx, rx) = trigger_channel(metrics);
        drop(rx);
        assert!(!tx.fire(FlushTrigger::SizeExceeded));
    }
}
