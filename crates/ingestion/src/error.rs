//! Ingestion 错误类型

use thiserror::Error;

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Listen address is not a socket address
    #[error("invalid bind address '{addr}': {message}")]
    InvalidAddress {
        addr: String,
        message: String,
    },

    /// 监听端口绑定失败
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The server stopped with an I/O error
    #[error("http server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Ingestion Result type alias
pub type Result<T> = std::result::Result<T, IngestionError>;
