//! LogSink - logs batch summary via tracing

use contracts::{Batch, BatchSink, ContractError};
use tracing::{info, instrument};

/// Sink that logs batch summaries for debugging
pub struct LogSink {
    name: String,
}

impl LogSink {
    /// Create a new LogSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn log_batch_summary(&self, batch: &Batch) {
        info!(
            sink = %self.name,
            seq = batch.seq,
            trigger = %batch.trigger,
            records = batch.len(),
            bytes = batch.total_bytes(),
            window_ms = batch.opened_at.elapsed().as_millis() as u64,
            "Batch received"
        );
    }
}

impl BatchSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_write",
        skip(self, batch),
        fields(sink = %self.name, seq = batch.seq)
    )]
    async fn write(&mut self, batch: &Batch) -> Result<(), ContractError> {
        self.log_batch_summary(batch);
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(sink = %self.name, "LogSink closed");
        Ok(())
    }
}
