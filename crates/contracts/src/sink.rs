//! BatchSink trait - Dispatcher output interface
//!
//! Defines the abstract bulk-write contract for sinks.

use crate::{Batch, ContractError};

/// Bulk-write trait
///
/// All sink implementations must implement this trait.
#[trait_variant::make(BatchSink: Send)]
pub trait LocalBatchSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Write one detached batch
    ///
    /// An empty batch is valid and should be a cheap no-op.
    ///
    /// # Errors
    /// Returns write error (should include context). The engine does not retry.
    async fn write(&mut self, batch: &Batch) -> Result<(), ContractError>;

    /// Close sink
    async fn close(&mut self) -> Result<(), ContractError>;
}
