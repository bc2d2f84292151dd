//! Batcher error types

use thiserror::Error;

/// Batcher errors
#[derive(Debug, Error)]
pub enum BatcherError {
    /// Invalid construction parameters; the engine never starts
    #[error("invalid batcher configuration at '{field}': {message}")]
    InvalidConfig {
        /// Offending parameter
        field: String,
        /// What is wrong with it
        message: String,
    },

    /// Open batch is at its hard cap and the caller asked to be told
    #[error("open batch is full ({capacity} records buffered)")]
    Overflow {
        /// Configured hard cap
        capacity: usize,
    },

    /// A background task panicked or was aborted
    #[error("batcher task '{task}' failed: {message}")]
    TaskFailed {
        /// Task name
        task: &'static str,
        /// Join error description
        message: String,
    },
}

impl BatcherError {
    /// Create a configuration error
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Batcher Result type alias
pub type Result<T> = std::result::Result<T, BatcherError>;
