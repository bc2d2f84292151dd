//! FileSink - appends batches to daily newline-delimited files

use chrono::Utc;
use contracts::{Batch, BatchSink, ContractError};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::{debug, error, instrument};

/// Configuration for FileSink
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Base output directory
    pub base_path: PathBuf,
    /// File name prefix
    pub prefix: String,
}

impl FileSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let base_path = params
            .get("base_path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./output"));

        let prefix = params
            .get("prefix")
            .cloned()
            .unwrap_or_else(|| "batch".to_string());

        Self { base_path, prefix }
    }
}

/// Sink that appends every record as one line of `<prefix>-<YYYYMMDD>.ndjson`
pub struct FileSink {
    name: String,
    config: FileSinkConfig,
    /// Open file and the date it belongs to
    current: Option<(String, File)>,
}

impl FileSink {
    /// Create a new FileSink
    pub fn new(name: impl Into<String>, config: FileSinkConfig) -> std::io::Result<Self> {
        // Create base directory if it doesn't exist
        fs::create_dir_all(&config.base_path)?;

        Ok(Self {
            name: name.into(),
            config,
            current: None,
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> std::io::Result<Self> {
        let config = FileSinkConfig::from_params(params);
        Self::new(name, config)
    }

    /// Path of the file batches are appended to today
    pub fn current_path(&self) -> PathBuf {
        self.path_for(&Self::today())
    }

    fn today() -> String {
        Utc::now().format("%Y%m%d").to_string()
    }

    fn path_for(&self, date: &str) -> PathBuf {
        self.config
            .base_path
            .join(format!("{}-{}.ndjson", self.config.prefix, date))
    }

    /// Get the file for today, rolling over at UTC midnight
    fn file_for_today(&mut self) -> std::io::Result<&mut File> {
        let today = Self::today();
        let stale = self
            .current
            .as_ref()
            .is_none_or(|(date, _)| *date != today);

        if stale {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.path_for(&today))?;
            self.current = Some((today, file));
        }

        match self.current.as_mut() {
            Some((_, file)) => Ok(file),
            None => Err(std::io::Error::other("file not open")),
        }
    }

    fn write_batch_to_disk(&mut self, batch: &Batch) -> std::io::Result<()> {
        // Reject before touching the file so a bad batch writes nothing
        if let Some(pos) = batch.records().iter().position(|r| r.contains(&b'\n')) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("record {} contains a newline", pos),
            ));
        }

        let file = self.file_for_today()?;
        let mut writer = BufWriter::new(file);
        for record in batch.records() {
            writer.write_all(record)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(())
    }

    fn persist_batch(&mut self, batch: &Batch) -> Result<(), ContractError> {
        if batch.is_empty() {
            return Ok(());
        }

        self.write_batch_to_disk(batch).map_err(|e| {
            error!(sink = %self.name, seq = batch.seq, error = %e, "Write failed");
            ContractError::sink_write(&self.name, e.to_string())
        })
    }
}

impl BatchSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_sink_write",
        skip(self, batch),
        fields(sink = %self.name, seq = batch.seq, records = batch.len())
    )]
    async fn write(&mut self, batch: &Batch) -> Result<(), ContractError> {
        self.persist_batch(batch)?;
        Ok(())
    }

    #[instrument(name = "file_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        if let Some((_, file)) = self.current.take() {
            file.sync_all()?;
        }
        debug!(sink = %self.name, "FileSink closed");
        Ok(())
    }
}
