//! Bounded worker pool with a per-identity job table
//!
//! All bookkeeping lives in one mutex-protected [`JobTable`]. Workers sleep on
//! `work_available`; callers waiting for results sleep on `job_finished`.
//! Waits are always bounded.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::clean::CancelToken;
use crate::error::DispatchError;

use super::config::DispatcherConfig;
use super::deadline::Deadline;
use super::job::{JobId, JobOutcome, JobResult, JobSpec, JobState};
use super::worker::Worker;

struct JobEntry {
    state: JobState,
    spec: Option<JobSpec>,
    result: Option<JobResult>,
    failure: Option<String>,
    /// Worker bound to the job from assignment until retrieval
    worker: Option<usize>,
}

impl JobEntry {
    fn new(spec: JobSpec) -> Self {
        Self {
            state: JobState::Submitted,
            spec: Some(spec),
            result: None,
            failure: None,
            worker: None,
        }
    }

    fn fail(&mut self, reason: impl Into<String>) {
        self.state = JobState::Failed;
        self.spec = None;
        self.failure = Some(reason.into());
    }
}

struct JobTable {
    /// Entries in submission order
    jobs: IndexMap<JobId, JobEntry>,
    queue: VecDeque<JobId>,
    accepting: bool,
    stopping: bool,
    /// Jobs bound to a worker (assigned or running)
    active: usize,
}

struct Shared {
    table: Mutex<JobTable>,
    work_available: Condvar,
    job_finished: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, JobTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait_finished<'a>(
        &self,
        table: MutexGuard<'a, JobTable>,
        timeout: Duration,
    ) -> MutexGuard<'a, JobTable> {
        self.job_finished
            .wait_timeout(table, timeout)
            .unwrap_or_else(PoisonError::into_inner)
            .0
    }
}

/// Job counts per state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatcherStatus {
    pub workers: usize,
    pub accepting: bool,
    pub submitted: usize,
    pub assigned: usize,
    pub running: usize,
    pub result_ready: usize,
    pub failed: usize,
    pub retrieved: usize,
}

/// What shutdown did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownReport {
    /// Queued jobs failed without running
    pub cancelled_queued: usize,
    /// Jobs still running when the grace period ran out that then failed
    pub aborted_running: usize,
    /// Finished results (or failures) nobody has taken yet
    pub unretrieved: usize,
    pub workers_joined: usize,
}

pub struct Dispatcher {
    shared: Arc<Shared>,
    handles: Vec<JoinHandle<()>>,
    config: DispatcherConfig,
    cancel: CancelToken,
}

impl Dispatcher {
    /// Spawn the worker pool
    pub fn new(config: DispatcherConfig) -> Result<Self, DispatchError> {
        let workers = config.resolved_workers();
        let mut dispatcher = Self {
            shared: Arc::new(Shared {
                table: Mutex::new(JobTable {
                    jobs: IndexMap::new(),
                    queue: VecDeque::new(),
                    accepting: true,
                    stopping: false,
                    active: 0,
                }),
                work_available: Condvar::new(),
                job_finished: Condvar::new(),
            }),
            handles: Vec::with_capacity(workers),
            config,
            cancel: CancelToken::new(),
        };

        for index in 0..workers {
            let shared = Arc::clone(&dispatcher.shared);
            let worker = Worker::new(index, dispatcher.cancel.clone());
            // On spawn failure, Drop shuts down the threads started so far
            let handle = thread::Builder::new()
                .name(format!("slcleaner-worker-{index}"))
                .spawn(move || worker_loop(&shared, &worker))?;
            dispatcher.handles.push(handle);
        }

        info!(workers, "dispatcher started");
        Ok(dispatcher)
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn workers(&self) -> usize {
        self.handles.len()
    }

    /// Queue a job; its identity must not be outstanding
    pub fn submit(&self, job: JobSpec) -> Result<(), DispatchError> {
        let id = job.id;
        let mut table = self.shared.lock();
        if !table.accepting {
            return Err(DispatchError::ShuttingDown);
        }
        if table.jobs.get(&id).is_some_and(|e| e.state.is_outstanding()) {
            return Err(DispatchError::DuplicateJob(id));
        }

        let edges = job.edges.len();
        // Re-submission after retrieval moves the identity to the back
        table.jobs.shift_remove(&id);
        table.jobs.insert(id, JobEntry::new(job));
        table.queue.push_back(id);
        let queued = table.queue.len();
        drop(table);

        self.shared.work_available.notify_one();
        info!(job = %id, edges, queued, "job submitted");
        Ok(())
    }

    /// True once the job's result or failure is ready
    pub fn poll_done(&self, id: JobId) -> Result<bool, DispatchError> {
        let table = self.shared.lock();
        match table.jobs.get(&id) {
            None => Err(DispatchError::UnknownJob(id)),
            Some(entry) if entry.state == JobState::Retrieved => Err(DispatchError::AlreadyRetrieved(id)),
            Some(entry) => Ok(entry.state.is_finished()),
        }
    }

    pub fn job_state(&self, id: JobId) -> Option<JobState> {
        self.shared.lock().jobs.get(&id).map(|e| e.state)
    }

    /// Worker bound to the job, from assignment until its result is taken
    pub fn assigned_worker(&self, id: JobId) -> Option<usize> {
        self.shared.lock().jobs.get(&id).and_then(|e| e.worker)
    }

    /// [`Dispatcher::take_result_timeout`] with the configured default timeout
    pub fn take_result(&self, id: JobId) -> Result<JobResult, DispatchError> {
        self.take_result_timeout(id, self.config.result_timeout)
    }

    /// Wait up to `timeout` for the job and hand its result over exactly once
    ///
    /// A failed job is consumed as well and reported as `JobFailed`. On
    /// timeout the job stays outstanding.
    pub fn take_result_timeout(&self, id: JobId, timeout: Duration) -> Result<JobResult, DispatchError> {
        let deadline = Deadline::after(timeout);
        let mut table = self.shared.lock();
        loop {
            let entry = table.jobs.get_mut(&id).ok_or(DispatchError::UnknownJob(id))?;
            match entry.state {
                JobState::ResultReady => {
                    entry.state = JobState::Retrieved;
                    entry.worker = None;
                    if let Some(result) = entry.result.take() {
                        debug!(job = %id, "result retrieved");
                        return Ok(result);
                    }
                    return Err(DispatchError::JobFailed { id, reason: "result was lost".into() });
                }
                JobState::Failed => {
                    entry.state = JobState::Retrieved;
                    entry.worker = None;
                    let reason = entry.failure.take().unwrap_or_default();
                    return Err(DispatchError::JobFailed { id, reason });
                }
                JobState::Retrieved => return Err(DispatchError::AlreadyRetrieved(id)),
                JobState::Submitted | JobState::Assigned | JobState::Running => {}
            }

            let Some(wait) = deadline.next_wait() else {
                let waited_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                return Err(DispatchError::Timeout { id, waited_ms });
            };
            table = self.shared.wait_finished(table, wait);
        }
    }

    /// Identity of the earliest-submitted finished job, waiting up to `timeout`
    ///
    /// Returns `None` on timeout or when no job is left that could finish.
    pub fn next_finished(&self, timeout: Duration) -> Option<JobId> {
        let deadline = Deadline::after(timeout);
        let mut table = self.shared.lock();
        loop {
            if let Some((id, _)) = table.jobs.iter().find(|(_, e)| e.state.is_finished()) {
                return Some(*id);
            }
            let pending = table.jobs.values().any(|e| {
                matches!(e.state, JobState::Submitted | JobState::Assigned | JobState::Running)
            });
            if !pending {
                return None;
            }
            let wait = deadline.next_wait()?;
            table = self.shared.wait_finished(table, wait);
        }
    }

    pub fn status(&self) -> DispatcherStatus {
        let table = self.shared.lock();
        let mut status = DispatcherStatus {
            workers: self.handles.len(),
            accepting: table.accepting,
            ..DispatcherStatus::default()
        };
        for entry in table.jobs.values() {
            match entry.state {
                JobState::Submitted => status.submitted += 1,
                JobState::Assigned => status.assigned += 1,
                JobState::Running => status.running += 1,
                JobState::ResultReady => status.result_ready += 1,
                JobState::Failed => status.failed += 1,
                JobState::Retrieved => status.retrieved += 1,
            }
        }
        status
    }

    /// Stop the pool; safe to call more than once
    ///
    /// Queued jobs fail immediately. Running jobs get `grace` to finish, then
    /// the cancel token is raised and they fail. Every worker thread is joined
    /// before returning.
    pub fn shutdown(&mut self, grace: Duration) -> ShutdownReport {
        let mut report = ShutdownReport::default();

        {
            let mut table = self.shared.lock();
            table.accepting = false;
            while let Some(id) = table.queue.pop_front() {
                if let Some(entry) = table.jobs.get_mut(&id) {
                    entry.fail("cancelled before start");
                    report.cancelled_queued += 1;
                }
            }
            table.stopping = true;
        }
        self.shared.work_available.notify_all();
        self.shared.job_finished.notify_all();

        let deadline = Deadline::after(grace);
        let overdue: Vec<JobId> = {
            let mut table = self.shared.lock();
            while table.active > 0 {
                let Some(wait) = deadline.next_wait() else { break };
                table = self.shared.wait_finished(table, wait);
            }
            table
                .jobs
                .iter()
                .filter(|(_, e)| matches!(e.state, JobState::Assigned | JobState::Running))
                .map(|(id, _)| *id)
                .collect()
        };
        if !overdue.is_empty() {
            warn!(running = overdue.len(), "grace period expired, cancelling running jobs");
            self.cancel.cancel();
        }

        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                warn!("worker thread panicked outside a job");
            }
            report.workers_joined += 1;
        }

        let table = self.shared.lock();
        // Jobs that beat the cancel token keep their result and are not counted
        report.aborted_running = overdue
            .iter()
            .filter(|id| table.jobs.get(*id).is_some_and(|e| e.state == JobState::Failed))
            .count();
        report.unretrieved = table.jobs.values().filter(|e| e.state.is_finished()).count();
        drop(table);
        info!(
            cancelled_queued = report.cancelled_queued,
            aborted_running = report.aborted_running,
            unretrieved = report.unretrieved,
            "dispatcher stopped"
        );
        report
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        if !self.handles.is_empty() {
            let grace = self.config.shutdown_grace;
            self.shutdown(grace);
        }
    }
}

fn worker_loop(shared: &Shared, worker: &Worker) {
    while let Some((id, spec)) = next_job(shared, worker.index()) {
        set_state(shared, id, JobState::Running);
        debug!(job = %id, worker = worker.index(), "job running");

        let outcome = worker.run_guarded(spec);

        let mut table = shared.lock();
        if let Some(entry) = table.jobs.get_mut(&id) {
            match outcome {
                JobOutcome::Done(result) => {
                    entry.state = JobState::ResultReady;
                    entry.result = Some(result);
                }
                JobOutcome::Failed(reason) => entry.fail(reason),
            }
        }
        table.active = table.active.saturating_sub(1);
        drop(table);
        shared.job_finished.notify_all();
    }
}

/// Block until a queued job is available (`None` once the pool is stopping)
fn next_job(shared: &Shared, worker: usize) -> Option<(JobId, JobSpec)> {
    let mut table = shared.lock();
    loop {
        if table.stopping {
            return None;
        }
        while let Some(id) = table.queue.pop_front() {
            let Some(entry) = table.jobs.get_mut(&id) else { continue };
            let Some(spec) = entry.spec.take() else { continue };
            entry.state = JobState::Assigned;
            entry.worker = Some(worker);
            table.active += 1;
            return Some((id, spec));
        }
        table = shared.work_available.wait(table).unwrap_or_else(PoisonError::into_inner);
    }
}

fn set_state(shared: &Shared, id: JobId, state: JobState) {
    if let Some(entry) = shared.lock().jobs.get_mut(&id) {
        entry.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{BBox, Polygon};
    use assert_matches::assert_matches;
    use std::time::Instant;

    fn job(layer: u32) -> JobSpec {
        JobSpec::new(JobId::new(layer, 0), BBox::new(0, 100, 0, 20), 4, 4)
            .with_polygons(&[Polygon::rect(0, 0, 50, 20)])
    }

    fn dispatcher(workers: usize) -> Dispatcher {
        Dispatcher::new(DispatcherConfig::default().with_workers(workers)).unwrap()
    }

    #[test]
    fn test_unknown_job() {
        let d = dispatcher(1);
        assert_matches!(d.poll_done(JobId::new(9, 9)), Err(DispatchError::UnknownJob(_)));
        assert_matches!(
            d.take_result_timeout(JobId::new(9, 9), Duration::ZERO),
            Err(DispatchError::UnknownJob(_))
        );
    }

    #[test]
    fn test_submit_and_take() {
        let d = dispatcher(2);
        d.submit(job(1)).unwrap();
        let result = d.take_result_timeout(JobId::new(1, 0), Duration::from_secs(10)).unwrap();
        assert_eq!(result.id, JobId::new(1, 0));
        assert_eq!(d.job_state(JobId::new(1, 0)), Some(JobState::Retrieved));
        assert_eq!(d.status().retrieved, 1);
    }

    #[test]
    fn test_resubmit_after_retrieval() {
        let d = dispatcher(1);
        d.submit(job(1)).unwrap();
        d.take_result_timeout(JobId::new(1, 0), Duration::from_secs(10)).unwrap();
        d.submit(job(1)).unwrap();
        assert!(d.take_result_timeout(JobId::new(1, 0), Duration::from_secs(10)).is_ok());
    }

    #[test]
    fn test_next_finished_without_jobs_returns_immediately() {
        let d = dispatcher(1);
        let start = Instant::now();
        assert_eq!(d.next_finished(Duration::from_secs(5)), None);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_shutdown_is_idempotent_and_rejects_submissions() {
        let mut d = dispatcher(2);
        let first = d.shutdown(Duration::from_secs(1));
        assert_eq!(first.workers_joined, 2);
        let second = d.shutdown(Duration::from_secs(1));
        assert_eq!(second, ShutdownReport::default());
        assert_matches!(d.submit(job(1)), Err(DispatchError::ShuttingDown));
        assert!(!d.status().accepting);
    }

    #[test]
    fn test_unbounded_timeouts_do_not_overflow() {
        let d = dispatcher(1);
        assert_eq!(d.next_finished(Duration::MAX), None);
        d.submit(job(2)).unwrap();
        assert!(d.take_result_timeout(JobId::new(2, 0), Duration::MAX).is_ok());
        d.submit(job(3)).unwrap();
        assert_eq!(d.next_finished(Duration::MAX), Some(JobId::new(3, 0)));
    }

    #[test]
    fn test_aborted_count_only_includes_failed_jobs() {
        let mut d = dispatcher(1);
        d.submit(job(4)).unwrap();
        let report = d.shutdown(Duration::ZERO);
        let state = d.job_state(JobId::new(4, 0)).unwrap();
        assert!(state.is_finished());
        let aborted = usize::from(state == JobState::Failed && report.cancelled_queued == 0);
        assert_eq!(report.aborted_running, aborted);

        // A generous grace lets the job finish, so nothing counts as aborted
        let mut d = dispatcher(1);
        d.submit(job(5)).unwrap();
        let report = d.shutdown(Duration::from_secs(30));
        assert_eq!(report.aborted_running, 0);
    }
}
