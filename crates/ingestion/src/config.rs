//! Endpoint configuration and request metrics

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use contracts::ServerConfig;

use crate::error::{IngestionError, Result};

/// HTTP endpoint configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionConfig {
    /// Listen address
    pub bind_addr: SocketAddr,
    /// Largest accepted request body
    pub max_body_bytes: usize,
}

impl IngestionConfig {
    pub fn new(bind_addr: SocketAddr, max_body_bytes: usize) -> Self {
        Self {
            bind_addr,
            max_body_bytes,
        }
    }
}

impl TryFrom<&ServerConfig> for IngestionConfig {
    type Error = IngestionError;

    fn try_from(config: &ServerConfig) -> Result<Self> {
        let bind_addr = config
            .bind_addr
            .parse()
            .map_err(|e: std::net::AddrParseError| IngestionError::InvalidAddress {
                addr: config.bind_addr.clone(),
                message: e.to_string(),
            })?;

        Ok(Self::new(bind_addr, config.max_body_bytes))
    }
}

/// Request counters for the endpoint
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    /// Requests served
    requests: AtomicU64,
    /// Records handed to the engine
    records_accepted: AtomicU64,
    /// Records refused at the hard cap
    records_rejected: AtomicU64,
    /// Requests refused as malformed (empty body)
    bad_requests: AtomicU64,
}

impl IngestionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_accepted(&self, count: u64) {
        self.records_accepted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_rejected(&self, count: u64) {
        self.records_rejected.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_bad_request(&self) {
        self.bad_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> IngestionMetricsSnapshot {
        IngestionMetricsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            records_accepted: self.records_accepted.load(Ordering::Relaxed),
            records_rejected: self.records_rejected.load(Ordering::Relaxed),
            bad_requests: self.bad_requests.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of endpoint counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestionMetricsSnapshot {
    pub requests: u64,
    pub records_accepted: u64,
    pub records_rejected: u64,
    pub bad_requests: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_server_config() {
        let config = IngestionConfig::try_from(&ServerConfig::default()).unwrap();
        assert_eq!(config.bind_addr.port(), 8000);
        assert_eq!(config.max_body_bytes, 1024 * 1024);
    }

    #[test]
    fn test_invalid_bind_addr() {
        let server = ServerConfig {
            bind_addr: ":8000".to_string(),
            ..ServerConfig::default()
        };
        let result = IngestionConfig::try_from(&server);
        assert!(matches!(result, Err(IngestionError::InvalidAddress { .. })));
    }
}
