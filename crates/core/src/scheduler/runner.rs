//! Periodic driver for the ingestion pipeline.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::metrics;
use crate::pipeline::{CycleSummary, IngestionPipeline, PipelineError};

use super::config::SchedulerConfig;
use super::signal::ShutdownSignal;

/// Lifecycle of the scheduler loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    Running,
    Waiting,
    Stopped,
}

/// Snapshot of the scheduler for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub state: SchedulerState,
    pub cycles_completed: u64,
    pub cycles_failed: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_cycle: Option<CycleSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cycle_at: Option<DateTime<Utc>>,
}

impl Default for SchedulerStatus {
    fn default() -> Self {
        Self {
            state: SchedulerState::Idle,
            cycles_completed: 0,
            cycles_failed: 0,
            last_cycle: None,
            last_error: None,
            next_cycle_at: None,
        }
    }
}

/// Runs `process_available` on a fixed interval until shutdown.
pub struct Scheduler {
    pipeline: Arc<IngestionPipeline>,
    shutdown: ShutdownSignal,
    interval: Duration,
    poll_interval: Duration,
    error_backoff: Duration,
    status: Arc<RwLock<SchedulerStatus>>,
}

impl Scheduler {
    pub fn new(
        config: &SchedulerConfig,
        pipeline: Arc<IngestionPipeline>,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            pipeline,
            shutdown,
            interval: config.interval(),
            poll_interval: config.poll_interval(),
            error_backoff: config.error_backoff(),
            status: Arc::new(RwLock::new(SchedulerStatus::default())),
        }
    }

    /// Overrides the configured timings.
    pub fn with_timings(mut self, interval: Duration, poll: Duration, backoff: Duration) -> Self {
        self.interval = interval;
        self.poll_interval = poll;
        self.error_backoff = backoff;
        self
    }

    pub async fn status(&self) -> SchedulerStatus {
        self.status.read().await.clone()
    }

    /// Runs one cycle and records its outcome.
    pub async fn run_cycle(&self) -> Result<CycleSummary, PipelineError> {
        self.status.write().await.state = SchedulerState::Running;
        let started = Instant::now();

        let result = self.pipeline.process_available(&self.shutdown).await;
        let elapsed = started.elapsed().as_secs_f64();

        let mut status = self.status.write().await;
        status.state = SchedulerState::Idle;
        match &result {
            Ok(summary) => {
                let label = if summary.interrupted {
                    "interrupted"
                } else {
                    "completed"
                };
                metrics::CYCLES_TOTAL.with_label_values(&[label]).inc();
                metrics::CYCLE_DURATION
                    .with_label_values(&[label])
                    .observe(elapsed);
                status.cycles_completed += 1;
                status.last_cycle = Some(summary.clone());
                status.last_error = None;
            }
            Err(e) => {
                metrics::CYCLES_TOTAL.with_label_values(&["failed"]).inc();
                metrics::CYCLE_DURATION
                    .with_label_values(&["failed"])
                    .observe(elapsed);
                status.cycles_failed += 1;
                status.last_error = Some(e.to_string());
            }
        }
        drop(status);

        let stats = self.pipeline.files().stats().await;
        info!(
            pending = stats.pending,
            locked = stats.locked,
            archived = stats.archived,
            "File stats"
        );

        result
    }

    /// Loops until shutdown is requested. A failed cycle is logged and
    /// followed by the shorter backoff wait; nothing else ends the loop.
    pub async fn run(&self) {
        info!(
            interval_secs = self.interval.as_secs_f64(),
            "Scheduler started"
        );

        while !self.shutdown.is_requested() {
            let wait = match self.run_cycle().await {
                Ok(_) => self.interval,
                Err(e) => {
                    error!(
                        error = %e,
                        backoff_secs = self.error_backoff.as_secs_f64(),
                        "Cycle failed, backing off"
                    );
                    self.error_backoff
                }
            };

            if self.wait(wait).await {
                break;
            }
        }

        let mut status = self.status.write().await;
        status.state = SchedulerState::Stopped;
        status.next_cycle_at = None;
        info!("Scheduler stopped");
    }

    /// Sleeps for `total` in poll-sized steps. Returns `true` if shutdown
    /// interrupted the wait.
    async fn wait(&self, total: Duration) -> bool {
        let deadline = Instant::now() + total;
        {
            let mut status = self.status.write().await;
            status.state = SchedulerState::Waiting;
            status.next_cycle_at = chrono::Duration::from_std(total)
                .ok()
                .map(|d| Utc::now() + d);
        }

        loop {
            if self.shutdown.is_requested() {
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            let step = remaining.min(self.poll_interval.max(Duration::from_millis(1)));
            tokio::select! {
                _ = self.shutdown.requested() => {
                    info!("Scheduler received shutdown signal");
                    return true;
                }
                _ = tokio::time::sleep(step) => {}
            }
        }
    }
}
