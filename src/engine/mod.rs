//! Job execution: workers and the dispatcher that feeds them
//!
//! # Submodules
//! - `job` - Job identity, specification, results and states
//! - `worker` - Runs one job through the scanline cleaner
//! - `dispatcher` - Worker pool, job table and bounded result waits
//! - `config` - Pool size and timeouts
//! - `deadline` - Overflow-safe deadlines for bounded waits

mod job;
mod worker;
mod dispatcher;
mod config;
mod deadline;

pub use job::{JobId, JobOutcome, JobPayload, JobResult, JobSpec, JobState, OutputFormat};

pub use worker::Worker;

pub use dispatcher::{Dispatcher, DispatcherStatus, ShutdownReport};

pub(crate) use deadline::Deadline;

pub use config::{
    available_cores, clamp_to_cores, DispatcherConfig, ENV_RESULT_TIMEOUT_MS, ENV_SHUTDOWN_GRACE_MS,
    ENV_WORKERS,
};
