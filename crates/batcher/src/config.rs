//! Engine construction parameters

use std::time::Duration;

use contracts::{OverflowPolicy, ShutdownPolicy, WindowSettings};

use crate::error::{BatcherError, Result};

/// Longest accepted window interval (one year)
///
/// tokio deadlines are `Instant + interval`; anything much larger overflows.
pub const MAX_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Batching window configuration
///
/// Fixed at construction; the engine never changes it afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatcherConfig {
    /// Record count that requests a flush (advisory, not a hard cap)
    pub max_batch_size: usize,
    /// Maximum time between flushes
    pub interval: Duration,
    /// Hard cap on records held by the open batch
    pub max_buffered_records: Option<usize>,
    /// Policy for `append` once the hard cap is reached
    pub overflow_policy: OverflowPolicy,
    /// Restart the interval clock after every flush
    pub reset_timer_on_flush: bool,
    /// What happens to the open batch on shutdown
    pub shutdown_policy: ShutdownPolicy,
}

impl BatcherConfig {
    /// Create a validated configuration with default policies
    ///
    /// # Errors
    /// `InvalidConfig` when the size or the interval is zero, or the interval
    /// exceeds [`MAX_INTERVAL`].
    pub fn new(max_batch_size: usize, interval: Duration) -> Result<Self> {
        let config = Self {
            max_batch_size,
            interval,
            max_buffered_records: None,
            overflow_policy: OverflowPolicy::default(),
            reset_timer_on_flush: false,
            shutdown_policy: ShutdownPolicy::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Bound the open batch
    pub fn with_hard_cap(mut self, max_buffered_records: usize, policy: OverflowPolicy) -> Self {
        self.max_buffered_records = Some(max_buffered_records);
        self.overflow_policy = policy;
        self
    }

    /// Restart the interval clock after every flush
    pub fn with_timer_reset(mut self, reset: bool) -> Self {
        self.reset_timer_on_flush = reset;
        self
    }

    /// Choose what happens to the open batch on shutdown
    pub fn with_shutdown_policy(mut self, policy: ShutdownPolicy) -> Self {
        self.shutdown_policy = policy;
        self
    }

    /// Check every parameter, returning the first violation
    pub fn validate(&self) -> Result<()> {
        if self.max_batch_size == 0 {
            return Err(BatcherError::invalid_config(
                "max_batch_size",
                "max_batch_size must be > 0",
            ));
        }
        if self.interval.is_zero() {
            return Err(BatcherError::invalid_config(
                "interval",
                "interval must be > 0",
            ));
        }
        if self.interval > MAX_INTERVAL {
            return Err(BatcherError::invalid_config(
                "interval",
                format!(
                    "interval must be <= {}s, got {}s",
                    MAX_INTERVAL.as_secs(),
                    self.interval.as_secs()
                ),
            ));
        }
        if let Some(cap) = self.max_buffered_records {
            if cap < self.max_batch_size {
                return Err(BatcherError::invalid_config(
                    "max_buffered_records",
                    format!(
                        "max_buffered_records ({}) must be >= max_batch_size ({})",
                        cap, self.max_batch_size
                    ),
                ));
            }
        }
        Ok(())
    }
}

impl TryFrom<&WindowSettings> for BatcherConfig {
    type Error = BatcherError;

    fn try_from(window: &WindowSettings) -> Result<Self> {
        if window.max_batch_size <= 0 {
            return Err(BatcherError::invalid_config(
                "max_batch_size",
                format!("max_batch_size must be > 0, got {}", window.max_batch_size),
            ));
        }
        if window.interval_ms <= 0 {
            return Err(BatcherError::invalid_config(
                "interval_ms",
                format!("interval_ms must be > 0, got {}", window.interval_ms),
            ));
        }

        let config = Self {
            max_batch_size: window.max_batch_size as usize,
            interval: Duration::from_millis(window.interval_ms as u64),
            max_buffered_records: window.max_buffered_records.map(|cap| cap as usize),
            overflow_policy: window.overflow_policy,
            reset_timer_on_flush: window.reset_timer_on_flush,
            shutdown_policy: window.shutdown,
        };
        config.validate()?;
        Ok(config)
    }
}
