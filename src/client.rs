//! Caller side of the process boundary
//!
//! [`CleanerProcess`] starts `slcleaner-server` as a child, talks to it over
//! its stdin/stdout, and bounds every wait. A reader thread forwards stdout
//! lines through a channel so reads can time out; a closed channel means the
//! child died or closed its output.

use anyhow::{anyhow, bail, Context, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::engine::{Deadline, DispatcherStatus, JobId, JobResult, JobSpec, ShutdownReport};
use crate::server::{error_codes, Request, Response, SubmitParams};

/// Extra time allowed for a response on top of any server-side wait
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const POLL_INITIAL: Duration = Duration::from_millis(1);
const POLL_MAX: Duration = Duration::from_millis(200);

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Error reported by the server for one request
#[derive(Debug, Clone, thiserror::Error)]
#[error("server error {code}: {message}")]
pub struct RemoteError {
    pub code: i32,
    pub message: String,
}

impl RemoteError {
    pub fn is_timeout(&self) -> bool {
        self.code == error_codes::TIMEOUT
    }
}

/// A running `slcleaner-server` child process
pub struct CleanerProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    lines: Receiver<std::io::Result<String>>,
    reader: Option<JoinHandle<()>>,
    next_id: u64,
    request_timeout: Duration,
    exited: bool,
}

impl CleanerProcess {
    /// Start the server; `workers` is passed as its command-line argument
    pub fn spawn(program: impl AsRef<Path>, workers: Option<usize>) -> Result<Self> {
        let program = program.as_ref();
        let mut command = Command::new(program);
        if let Some(workers) = workers {
            command.arg(workers.to_string());
        }
        command.stdin(Stdio::piped()).stdout(Stdio::piped()).stderr(Stdio::inherit());

        let mut child = command
            .spawn()
            .with_context(|| format!("failed to start {}", program.display()))?;
        let stdin = child.stdin.take().context("server stdin was not captured")?;
        let stdout = child.stdout.take().context("server stdout was not captured")?;

        let (tx, rx) = mpsc::channel();
        let reader = thread::Builder::new()
            .name("slcleaner-client-reader".into())
            .spawn(move || {
                for line in BufReader::new(stdout).lines() {
                    let failed = line.is_err();
                    if tx.send(line).is_err() || failed {
                        break;
                    }
                }
            })
            .context("failed to start reader thread")?;

        info!(pid = child.id(), program = %program.display(), "server started");
        Ok(Self {
            child,
            stdin: Some(stdin),
            lines: rx,
            reader: Some(reader),
            next_id: 1,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            exited: false,
        })
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn id(&self) -> u32 {
        self.child.id()
    }

    pub fn submit(&mut self, job: &JobSpec) -> Result<()> {
        let params = serde_json::to_value(SubmitParams::from_job(job))?;
        self.call("Submit", Some(params), Duration::ZERO)?;
        Ok(())
    }

    pub fn poll_done(&mut self, id: JobId) -> Result<bool> {
        #[derive(serde::Deserialize)]
        struct Done {
            done: bool,
        }
        let params = serde_json::json!({ "layer": id.layer, "datatype": id.datatype });
        let done: Done = self.call_typed("PollDone", Some(params), Duration::ZERO)?;
        Ok(done.done)
    }

    /// Take the result, letting the server wait up to `timeout` for it
    pub fn take_result(&mut self, id: JobId, timeout: Duration, packed: bool) -> Result<JobResult> {
        let params = serde_json::json!({
            "layer": id.layer,
            "datatype": id.datatype,
            "timeout_ms": millis(timeout),
            "packed": packed,
        });
        self.call_typed("TakeResult", Some(params), timeout)
    }

    pub fn next_finished(&mut self, timeout: Duration) -> Result<Option<JobId>> {
        let params = serde_json::json!({ "timeout_ms": millis(timeout) });
        self.call_typed("NextFinished", Some(params), timeout)
    }

    pub fn status(&mut self) -> Result<DispatcherStatus> {
        self.call_typed("Status", None, Duration::ZERO)
    }

    /// Poll with exponential backoff until the job is done, then take it
    pub fn wait_for_result(&mut self, id: JobId, max_wait: Duration, packed: bool) -> Result<JobResult> {
        let deadline = Deadline::after(max_wait);
        let mut delay = POLL_INITIAL;
        while !self.poll_done(id)? {
            let Some(wait) = deadline.next_wait() else {
                bail!("job {} not done after {} ms", id, max_wait.as_millis());
            };
            thread::sleep(delay.min(wait));
            delay = (delay * 2).min(POLL_MAX);
        }
        self.take_result(id, Duration::ZERO, packed)
    }

    /// Ask the server to stop, then wait up to `exit_timeout` for it to exit
    ///
    /// The child is killed if it does not exit in time. The report is `None`
    /// when the server could not answer the shutdown request.
    pub fn shutdown(mut self, grace: Duration, exit_timeout: Duration) -> Result<Option<ShutdownReport>> {
        let params = serde_json::json!({ "grace_ms": millis(grace) });
        let report = match self.call_typed::<ShutdownReport>("Shutdown", Some(params), grace) {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(error = %e, "shutdown request failed");
                None
            }
        };
        self.stdin = None;
        self.wait_for_exit(exit_timeout)?;
        Ok(report)
    }

    fn wait_for_exit(&mut self, timeout: Duration) -> Result<()> {
        let deadline = Deadline::after(timeout);
        let mut delay = POLL_INITIAL;
        loop {
            if let Some(status) = self.child.try_wait().context("failed to query server status")? {
                self.exited = true;
                info!(%status, "server exited");
                break;
            }
            let Some(wait) = deadline.next_wait() else {
                warn!(pid = self.child.id(), "server did not exit in time, killing it");
                self.child.kill().context("failed to kill server")?;
                self.child.wait().context("failed to reap server")?;
                self.exited = true;
                break;
            };
            thread::sleep(delay.min(wait));
            delay = (delay * 2).min(POLL_MAX);
        }
        if let Some(reader) = self.reader.take() {
            if reader.join().is_err() {
                warn!("reader thread panicked");
            }
        }
        Ok(())
    }

    fn call_typed<T: DeserializeOwned>(&mut self, method: &str, params: Option<Value>, wait: Duration) -> Result<T> {
        let value = self.call(method, params, wait)?;
        serde_json::from_value(value).with_context(|| format!("unexpected {method} result"))
    }

    /// Send one request and wait for its response
    ///
    /// `wait` is how long the server itself may block; the request timeout
    /// is added on top.
    fn call(&mut self, method: &str, params: Option<Value>, wait: Duration) -> Result<Value> {
        let id = self.next_id;
        self.next_id += 1;
        let request = Request {
            id: Some(Value::from(id)),
            method: method.to_string(),
            params,
        };

        let stdin = self.stdin.as_mut().context("server stdin is already closed")?;
        let mut line = serde_json::to_vec(&request)?;
        line.push(b'\n');
        if let Err(e) = stdin.write_all(&line).and_then(|()| stdin.flush()) {
            return Err(self.exit_error().context(format!("failed to send {method}: {e}")));
        }
        debug!(method, id, "request sent");

        let limit = wait.saturating_add(self.request_timeout);
        let deadline = Deadline::after(limit);
        loop {
            let remaining = deadline.next_wait().unwrap_or(Duration::ZERO);
            match self.lines.recv_timeout(remaining) {
                Ok(Ok(line)) => {
                    let response: Response = serde_json::from_str(&line)
                        .with_context(|| format!("malformed response line: {line}"))?;
                    if response.id != Some(Value::from(id)) {
                        warn!(expected = id, got = ?response.id, "skipping unrelated response");
                        continue;
                    }
                    if let Some(error) = response.error {
                        return Err(RemoteError { code: error.code, message: error.message }.into());
                    }
                    return Ok(response.result.unwrap_or(Value::Null));
                }
                Ok(Err(e)) => return Err(e).context("failed to read server output"),
                Err(RecvTimeoutError::Timeout) => {
                    if deadline.next_wait().is_none() {
                        bail!("no response to {} within {} ms", method, limit.as_millis())
                    }
                }
                Err(RecvTimeoutError::Disconnected) => return Err(self.exit_error()),
            }
        }
    }

    fn exit_error(&mut self) -> anyhow::Error {
        match self.child.try_wait() {
            Ok(Some(status)) => {
                self.exited = true;
                anyhow!("server exited unexpectedly ({status})")
            }
            Ok(None) => anyhow!("server closed its output"),
            Err(e) => anyhow!(e).context("server output closed and its status is unavailable"),
        }
    }
}

impl Drop for CleanerProcess {
    fn drop(&mut self) {
        if self.exited {
            return;
        }
        self.stdin = None;
        if let Ok(None) = self.child.try_wait() {
            warn!(pid = self.child.id(), "killing server left running");
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
    }
}
