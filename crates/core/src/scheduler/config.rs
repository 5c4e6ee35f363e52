//! Scheduler configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing of the periodic ingestion loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Pause between the end of one cycle and the start of the next (seconds).
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// How often a wait re-checks for shutdown (seconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Pause after a failed cycle (seconds).
    #[serde(default = "default_error_backoff")]
    pub error_backoff_secs: u64,
}

fn default_interval() -> u64 {
    120
}

fn default_poll_interval() -> u64 {
    5
}

fn default_error_backoff() -> u64 {
    30
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            poll_interval_secs: default_poll_interval(),
            error_backoff_secs: default_error_backoff(),
        }
    }
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.error_backoff_secs)
    }
}
