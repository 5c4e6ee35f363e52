//! Periodic scheduler with cooperative shutdown.
//!
//! States: `Idle -> Running -> Waiting -> Running -> ... -> Stopped`.
//! Shutdown is only observed between files and during waits, so an
//! in-flight file always reaches its final disposition.

mod config;
mod runner;
mod signal;

pub use config::SchedulerConfig;
pub use runner::{Scheduler, SchedulerState, SchedulerStatus};
pub use signal::ShutdownSignal;
