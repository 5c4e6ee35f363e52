//! Configuration for the ingestion pipeline.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Batching and write limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Rows held in memory per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Inserts in flight at once within a batch.
    #[serde(default = "default_write_concurrency")]
    pub write_concurrency: usize,

    /// Per-insert timeout in milliseconds.
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
}

fn default_batch_size() -> usize {
    1000
}

fn default_write_concurrency() -> usize {
    16
}

fn default_write_timeout_ms() -> u64 {
    10_000
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            write_concurrency: default_write_concurrency(),
            write_timeout_ms: default_write_timeout_ms(),
        }
    }
}

impl PipelineConfig {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}
