//! Record and Batch - the unit of ingestion and the unit of flushing

use std::fmt;
use std::time::Instant;

use bytes::Bytes;

/// One opaque event payload
///
/// Cloning is a reference-count bump; the bytes themselves are never mutated.
pub type Record = Bytes;

/// Why a batch was flushed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlushTrigger {
    /// The open batch reached the configured record count
    SizeExceeded,
    /// The window interval elapsed
    IntervalElapsed,
    /// Final drain of the open batch while the engine stops
    Shutdown,
}

impl FlushTrigger {
    /// Stable label for logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SizeExceeded => "size",
            Self::IntervalElapsed => "interval",
            Self::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for FlushTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A detached batch of records
///
/// Records keep their append order. Once detached the batch is read-only.
#[derive(Debug, Clone)]
pub struct Batch {
    /// Flush sequence number (monotonically increasing per engine, starting at 0)
    pub seq: u64,

    /// Trigger that caused this flush
    pub trigger: FlushTrigger,

    /// When this window started accepting appends
    pub opened_at: Instant,

    /// Records in append order
    pub records: Vec<Record>,
}

impl Batch {
    /// Create a batch from already collected records
    pub fn new(seq: u64, trigger: FlushTrigger, opened_at: Instant, records: Vec<Record>) -> Self {
        Self {
            seq,
            trigger,
            opened_at,
            records,
        }
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the batch holds no records (interval flush of an idle window)
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sum of payload sizes in bytes
    pub fn total_bytes(&self) -> usize {
        self.records.iter().map(Bytes::len).sum()
    }

    /// Borrow the records
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Take ownership of the records
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}
