//! Dispatcher configuration

use anyhow::{Context, Result};
use std::num::NonZeroUsize;
use std::thread;
use std::time::Duration;

pub const ENV_WORKERS: &str = "SLCLEANER_WORKERS";
pub const ENV_RESULT_TIMEOUT_MS: &str = "SLCLEANER_RESULT_TIMEOUT_MS";
pub const ENV_SHUTDOWN_GRACE_MS: &str = "SLCLEANER_SHUTDOWN_GRACE_MS";

/// Pool size and wait bounds for a [`Dispatcher`](super::Dispatcher)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Worker threads; 0 means one per available core
    pub workers: usize,
    /// Default wait in `take_result`
    pub result_timeout: Duration,
    /// How long shutdown lets running jobs finish before cancelling them
    pub shutdown_grace: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            result_timeout: Duration::from_secs(60),
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

impl DispatcherConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_result_timeout(mut self, timeout: Duration) -> Self {
        self.result_timeout = timeout;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Defaults overridden by `SLCLEANER_*` environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(workers) = env_number(ENV_WORKERS)? {
            config.workers = workers as usize;
        }
        if let Some(ms) = env_number(ENV_RESULT_TIMEOUT_MS)? {
            config = config.with_result_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = env_number(ENV_SHUTDOWN_GRACE_MS)? {
            config = config.with_shutdown_grace(Duration::from_millis(ms));
        }
        Ok(config)
    }

    /// Number of worker threads to spawn, never below 1
    pub fn resolved_workers(&self) -> usize {
        if self.workers == 0 {
            available_cores()
        } else {
            self.workers
        }
    }
}

pub fn available_cores() -> usize {
    thread::available_parallelism().map(NonZeroUsize::get).unwrap_or(1)
}

/// Requested worker count limited to the machine; 0 means all cores
pub fn clamp_to_cores(requested: usize) -> usize {
    let cores = available_cores();
    if requested == 0 {
        cores
    } else {
        requested.min(cores).max(1)
    }
}

fn env_number(key: &str) -> Result<Option<u64>> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<u64>()
            .map(Some)
            .with_context(|| format!("{key} must be a non-negative integer, got {value:?}")),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(e).with_context(|| format!("failed to read {key}")),
    }
}
