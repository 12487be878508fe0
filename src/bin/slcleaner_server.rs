//! Cleaner server: the dispatcher and its workers as a child process
//!
//! Usage:
//!   slcleaner-server [workers]
//!
//! Reads one JSON-RPC request per stdin line and writes one response per
//! stdout line. `workers` of 0 (or absent) uses every core; larger values
//! are clamped to the available cores. Logs go to stderr.

use anyhow::{Context, Result};
use std::env;
use std::io;
use std::process::ExitCode;
use tracing::{error, info};

use slcleaner::engine::{clamp_to_cores, DispatcherConfig};
use slcleaner::logging;
use slcleaner::server::{serve, ServerState};

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    logging::init(logging::DEFAULT_FILTER);

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let mut config = DispatcherConfig::from_env()?;
    if let Some(arg) = env::args().nth(1) {
        config.workers = arg
            .trim()
            .parse()
            .with_context(|| format!("worker count must be a non-negative integer, got {arg:?}"))?;
    }
    config.workers = clamp_to_cores(config.workers);

    info!(
        workers = config.workers,
        result_timeout_ms = config.result_timeout.as_millis() as u64,
        "starting cleaner server"
    );
    let mut state = ServerState::new(config).context("failed to start worker pool")?;

    let stdin = io::stdin();
    let stdout = io::stdout();
    let exit = serve(&mut state, stdin.lock(), stdout.lock()).context("protocol I/O failed")?;

    info!(?exit, requests = state.requests_handled, "server exiting");
    Ok(())
}
