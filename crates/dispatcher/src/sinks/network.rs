//! NetworkSink - one UDP datagram per batch

use contracts::{Batch, BatchSink, ContractError};
use serde::Serialize;
use std::borrow::Cow;
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::{debug, instrument};

/// Serialization format for network transmission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkFormat {
    /// JSON (records as UTF-8 strings, lossy)
    #[default]
    Json,
    /// Bincode (records as raw bytes)
    Bincode,
}

/// Configuration for NetworkSink
#[derive(Debug, Clone)]
pub struct NetworkSinkConfig {
    /// Target address
    pub addr: SocketAddr,
    /// Serialization format
    pub format: NetworkFormat,
    /// Max datagram size (UDP typically 65507 for IPv4)
    pub max_packet_size: usize,
}

impl NetworkSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let addr_str = params
            .get("addr")
            .ok_or_else(|| "missing 'addr' parameter".to_string())?;

        let addr: SocketAddr = addr_str
            .parse()
            .map_err(|e| format!("invalid address '{}': {}", addr_str, e))?;

        let format = match params.get("format").map(String::as_str) {
            Some("bincode") => NetworkFormat::Bincode,
            Some("json") | None => NetworkFormat::Json,
            Some(other) => return Err(format!("unknown format '{}'", other)),
        };

        let max_packet_size = params
            .get("max_packet_size")
            .and_then(|s| s.parse().ok())
            .unwrap_or(65000);

        Ok(Self {
            addr,
            format,
            max_packet_size,
        })
    }
}

#[derive(Serialize)]
struct JsonDatagram<'a> {
    seq: u64,
    trigger: &'a str,
    records: Vec<Cow<'a, str>>,
}

#[derive(Serialize)]
struct BinaryDatagram<'a> {
    seq: u64,
    trigger: &'a str,
    records: Vec<&'a [u8]>,
}

/// Sink that sends batches over UDP
pub struct NetworkSink {
    name: String,
    config: NetworkSinkConfig,
    socket: Option<UdpSocket>,
}

impl NetworkSink {
    /// Create a new NetworkSink
    #[instrument(name = "network_sink_new", skip(name, config))]
    pub async fn new(name: impl Into<String>, config: NetworkSinkConfig) -> std::io::Result<Self> {
        let name = name.into();
        // Bind to any available port
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect(&config.addr).await?;

        debug!(
            sink = %name,
            target = %config.addr,
            "NetworkSink connected"
        );

        Ok(Self {
            name,
            config,
            socket: Some(socket),
        })
    }

    /// Create from params (for factory)
    #[instrument(name = "network_sink_from_params", skip(name, params))]
    pub async fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let config = NetworkSinkConfig::from_params(params)
            .map_err(|e| ContractError::config_validation(format!("sinks[{}].params", name), e))?;

        let sink_name = name.clone();
        Self::new(name, config)
            .await
            .map_err(|e| ContractError::sink_connection(sink_name, e.to_string()))
    }

    fn serialize_batch(&self, batch: &Batch) -> Result<Vec<u8>, String> {
        match self.config.format {
            NetworkFormat::Json => {
                let datagram = JsonDatagram {
                    seq: batch.seq,
                    trigger: batch.trigger.as_str(),
                    records: batch
                        .records()
                        .iter()
                        .map(|r| String::from_utf8_lossy(r))
                        .collect(),
                };
                serde_json::to_vec(&datagram).map_err(|e| format!("json error: {}", e))
            }
            NetworkFormat::Bincode => {
                let datagram = BinaryDatagram {
                    seq: batch.seq,
                    trigger: batch.trigger.as_str(),
                    records: batch.records().iter().map(|r| r.as_ref()).collect(),
                };
                bincode::serialize(&datagram).map_err(|e| format!("bincode error: {}", e))
            }
        }
    }

    fn socket(&self) -> Result<&UdpSocket, ContractError> {
        self.socket
            .as_ref()
            .ok_or_else(|| ContractError::sink_write(&self.name, "socket not connected"))
    }

    fn prepare_payload(&self, batch: &Batch) -> Result<Vec<u8>, ContractError> {
        let data = self
            .serialize_batch(batch)
            .map_err(|e| ContractError::sink_write(&self.name, e))?;

        if data.len() > self.config.max_packet_size {
            return Err(ContractError::sink_write(
                &self.name,
                format!(
                    "datagram of {} bytes exceeds max_packet_size {}",
                    data.len(),
                    self.config.max_packet_size
                ),
            ));
        }

        Ok(data)
    }
}

impl BatchSink for NetworkSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "network_sink_write",
        skip(self, batch),
        fields(sink = %self.name, seq = batch.seq)
    )]
    async fn write(&mut self, batch: &Batch) -> Result<(), ContractError> {
        if batch.is_empty() {
            return Ok(());
        }

        let socket = self.socket()?;
        let data = self.prepare_payload(batch)?;
        let sent = socket
            .send(&data)
            .await
            .map_err(|e| ContractError::sink_write(&self.name, format!("UDP send failed: {e}")))?;

        debug!(sink = %self.name, seq = batch.seq, bytes = sent, "Sent");
        Ok(())
    }

    #[instrument(name = "network_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        self.socket = None;
        debug!(sink = %self.name, "NetworkSink closed");
        Ok(())
    }
}
