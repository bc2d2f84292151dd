//! Accumulator - the open batch shared by all producers.
//!
//! One mutex guards the open window. `append` holds it only for the
//! insert + size check, `detach` only for swapping in a fresh window, so
//! every append lands in exactly one batch. Triggers are fired after the
//! lock is released and never wait.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use contracts::{Batch, FlushTrigger, OverflowPolicy, Record};

use crate::config::BatcherConfig;
use crate::error::{BatcherError, Result};
use crate::metrics::BatcherMetrics;
use crate::trigger::TriggerSender;

/// The window currently accepting appends
struct OpenWindow {
    records: VecDeque<Record>,
    opened_at: Instant,
    /// Sequence number the next detached batch gets
    next_seq: u64,
}

impl OpenWindow {
    fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity),
            opened_at: Instant::now(),
            next_seq: 0,
        }
    }
}

/// Concurrency-safe record accumulator
pub struct Accumulator {
    window: Mutex<OpenWindow>,
    max_batch_size: usize,
    hard_cap: Option<usize>,
    overflow_policy: OverflowPolicy,
    trigger: TriggerSender,
    metrics: Arc<BatcherMetrics>,
}

impl fmt::Debug for Accumulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Accumulator")
            .field("len", &self.len())
            .field("max_batch_size", &self.max_batch_size)
            .field("hard_cap", &self.hard_cap)
            .finish()
    }
}

impl Accumulator {
    /// Create an empty accumulator
    pub fn new(config: &BatcherConfig, trigger: TriggerSender, metrics: Arc<BatcherMetrics>) -> Self {
        Self {
            window: Mutex::new(OpenWindow::new(Self::initial_capacity(config.max_batch_size))),
            max_batch_size: config.max_batch_size,
            hard_cap: config.max_buffered_records,
            overflow_policy: config.overflow_policy,
            trigger,
            metrics,
        }
    }

    /// Add a record to the open batch (fire-and-forget)
    ///
    /// With a hard cap configured and reached, the overflow policy decides
    /// which record is lost; the caller is never told.
    pub fn append(&self, record: Record) {
        let crossed = {
            let mut window = self.lock();
            if self.is_full(&window) {
                match self.overflow_policy {
                    OverflowPolicy::DropNewest => {
                        drop(window);
                        self.metrics.inc_dropped();
                        observability::record_append(false);
                        return;
                    }
                    OverflowPolicy::DropOldest => {
                        window.records.pop_front();
                        self.metrics.inc_dropped();
                    }
                }
            }
            window.records.push_back(record);
            window.records.len() >= self.max_batch_size
        };

        self.metrics.inc_appended();
        observability::record_append(true);
        if crossed {
            self.trigger.fire(FlushTrigger::SizeExceeded);
        }
    }

    /// Add a record, refusing instead of dropping when the hard cap is reached
    ///
    /// # Errors
    /// `Overflow` if the open batch already holds `max_buffered_records`.
    pub fn try_append(&self, record: Record) -> Result<()> {
        let crossed = {
            let mut window = self.lock();
            if self.is_full(&window) {
                drop(window);
                self.metrics.inc_rejected();
                observability::record_append(false);
                return Err(BatcherError::Overflow {
                    capacity: self.hard_cap.unwrap_or_default(),
                });
            }
            window.records.push_back(record);
            window.records.len() >= self.max_batch_size
        };

        self.metrics.inc_appended();
        observability::record_append(true);
        if crossed {
            self.trigger.fire(FlushTrigger::SizeExceeded);
        }
        Ok(())
    }

    /// Atomically take the open batch and start a fresh, empty window
    pub fn detach(&self, trigger: FlushTrigger) -> Batch {
        let fresh = VecDeque::with_capacity(Self::initial_capacity(self.max_batch_size));

        let (seq, opened_at, records) = {
            let mut window = self.lock();
            let records = std::mem::replace(&mut window.records, fresh);
            let opened_at = std::mem::replace(&mut window.opened_at, Instant::now());
            let seq = window.next_seq;
            window.next_seq += 1;
            (seq, opened_at, records)
        };

        Batch::new(seq, trigger, opened_at, Vec::from(records))
    }

    /// Records currently in the open batch
    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    /// Whether the open batch is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured size threshold
    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    /// Another sender on the same trigger channel
    pub(crate) fn trigger(&self) -> TriggerSender {
        self.trigger.clone()
    }

    fn is_full(&self, window: &OpenWindow) -> bool {
        self.hard_cap
            .is_some_and(|cap| window.records.len() >= cap)
    }

    // The window only holds plain records; a producer panicking mid-push
    // cannot leave it inconsistent, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, OpenWindow> {
        self.window.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn initial_capacity(max_batch_size: usize) -> usize {
        max_batch_size.min(4096)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trigger::{trigger_channel, TriggerReceiver};
    use bytes::Bytes;
    use std::collections::HashSet;
    use std::time::Duration;

    fn setup(config: BatcherConfig) -> (Arc<Accumulator>, TriggerReceiver, Arc<BatcherMetrics>) {
        let metrics = Arc::new(BatcherMetrics::new());
        let (tx, rx) = trigger_channel(Arc::clone(&metrics));
        let acc = Arc::new(Accumulator::new(&config, tx, Arc::clone(&metrics)));
        (acc, rx, metrics)
    }

    fn config(size: usize) -> BatcherConfig {
        BatcherConfig::new(size, Duration::from_secs(60)).unwrap()
    }

    fn rec(s: &str) -> Record {
        Bytes::copy_from_slice(s.as_bytes())
    }

    #[tokio::test]
    async fn test_size_trigger_at_threshold() {
        let (acc, mut rx, _) = setup(config(3));

        acc.append(rec("r1"));
        acc.append(rec("r2"));
        assert!(!acc.trigger.is_pending());

        acc.append(rec("r3"));
        assert_eq!(rx.recv().await, Some(FlushTrigger::SizeExceeded));

        let batch = acc.detach(FlushTrigger::SizeExceeded);
        assert_eq!(batch.records(), &[rec("r1"), rec("r2"), rec("r3")]);
        assert_eq!(batch.seq, 0);
        assert!(acc.is_empty());
    }

    #[test]
    fn test_detach_resets_window() {
        let (acc, _rx, _) = setup(config(100));

        acc.append(rec("a"));
        acc.append(rec("b"));
        let first = acc.detach(FlushTrigger::IntervalElapsed);

        acc.append(rec("c"));
        let second = acc.detach(FlushTrigger::IntervalElapsed);

        assert_eq!(first.records(), &[rec("a"), rec("b")]);
        assert_eq!(second.records(), &[rec("c")]);
        assert_eq!(second.seq, first.seq + 1);
        assert!(second.opened_at >= first.opened_at);
    }

    #[test]
    fn test_detach_empty() {
        let (acc, _rx, _) = setup(config(5));
        let batch = acc.detach(FlushTrigger::IntervalElapsed);
        assert!(batch.is_empty());
        assert_eq!(batch.trigger, FlushTrigger::IntervalElapsed);
    }

    #[test]
    fn test_overrun_past_threshold_is_kept() {
        let (acc, _rx, metrics) = setup(config(2));

        for i in 0..5 {
            acc.append(rec(&format!("r{i}")));
        }

        // Threshold is advisory: nothing is lost while a trigger is pending
        assert_eq!(acc.len(), 5);
        let snap = metrics.snapshot();
        assert_eq!(snap.size_triggers, 1);
        assert_eq!(snap.triggers_coalesced, 3);
    }

    #[test]
    fn test_hard_cap_drop_newest() {
        let (acc, _rx, metrics) = setup(config(2).with_hard_cap(3, OverflowPolicy::DropNewest));

        for s in ["a", "b", "c", "d"] {
            acc.append(rec(s));
        }

        let batch = acc.detach(FlushTrigger::SizeExceeded);
        assert_eq!(batch.records(), &[rec("a"), rec("b"), rec("c")]);
        assert_eq!(metrics.snapshot().records_dropped, 1);
    }

    #[test]
    fn test_hard_cap_drop_oldest() {
        let (acc, _rx, metrics) = setup(config(2).with_hard_cap(3, OverflowPolicy::DropOldest));

        for s in ["a", "b", "c", "d"] {
            acc.append(rec(s));
        }

        let batch = acc.detach(FlushTrigger::SizeExceeded);
        assert_eq!(batch.records(), &[rec("b"), rec("c"), rec("d")]);
        assert_eq!(metrics.snapshot().records_dropped, 1);
    }

    #[test]
    fn test_try_append_rejects_at_cap() {
        let (acc, _rx, metrics) = setup(config(1).with_hard_cap(2, OverflowPolicy::DropNewest));

        acc.try_append(rec("a")).unwrap();
        acc.try_append(rec("b")).unwrap();
        let err = acc.try_append(rec("c")).unwrap_err();
        assert!(matches!(err, BatcherError::Overflow { capacity: 2 }));
        assert_eq!(metrics.snapshot().appends_rejected, 1);

        acc.detach(FlushTrigger::SizeExceeded);
        assert!(acc.try_append(rec("c")).is_ok());
    }

    #[test]
    fn test_try_append_without_cap_never_fails() {
        let (acc, _rx, _) = setup(config(1));
        for i in 0..50 {
            assert!(acc.try_append(rec(&i.to_string())).is_ok());
        }
        assert_eq!(acc.len(), 50);
    }

    #[test]
    fn test_concurrent_append_and_detach_no_loss() {
        let (acc, _rx, _) = setup(config(16));
        let producers = 8;
        let per_producer = 500;

        let handles: Vec<_> = (0..producers)
            .map(|p| {
                let acc = Arc::clone(&acc);
                std::thread::spawn(move || {
                    for i in 0..per_producer {
                        acc.append(rec(&format!("{p}-{i}")));
                    }
                })
            })
            .collect();

        let mut batches = Vec::new();
        while handles.iter().any(|h| !h.is_finished()) {
            batches.push(acc.detach(FlushTrigger::SizeExceeded));
            std::thread::yield_now();
        }
        for handle in handles {
            handle.join().unwrap();
        }
        batches.push(acc.detach(FlushTrigger::Shutdown));

        let all: Vec<Record> = batches.into_iter().flat_map(Batch::into_records).collect();
        let unique: HashSet<_> = all.iter().cloned().collect();
        assert_eq!(all.len(), producers * per_producer);
        assert_eq!(unique.len(), producers * per_producer);
    }
}
