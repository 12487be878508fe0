//! A worker runs one job at a time through the scanline cleaner

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::clean::{CancelToken, ScanlineCleaner};
use crate::error::CleanError;

use super::job::{JobOutcome, JobPayload, JobResult, JobSpec, OutputFormat};

pub struct Worker {
    index: usize,
    cancel: CancelToken,
}

impl Worker {
    pub fn new(index: usize, cancel: CancelToken) -> Self {
        Self { index, cancel }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Ingest, seal, clean and extract one job
    pub fn run(&self, job: JobSpec) -> Result<JobResult, CleanError> {
        let start = Instant::now();
        if !job.bbox.is_empty() && job.should_skip() {
            return Err(CleanError::BoxBelowMinWidth { bbox: job.bbox, min_width: job.rules.min_width });
        }
        let JobSpec { id, bbox, rules, edges, output } = job;

        let mut cleaner = ScanlineCleaner::new(bbox, rules)?.with_cancel(self.cancel.clone());
        cleaner.add_edges(edges)?;
        cleaner.seal_and_sort()?;
        cleaner.clean()?;

        let extract_start = Instant::now();
        let payload = match output {
            OutputFormat::Rows => JobPayload::Rows(cleaner.non_empty_rows()?.collect()),
            OutputFormat::Polygons => JobPayload::Polygons(cleaner.polygons()?),
        };
        debug!(
            job = %id,
            elapsed_ms = extract_start.elapsed().as_secs_f64() * 1000.0,
            "extracted output"
        );

        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        let stats = *cleaner.stats();
        info!(
            job = %id,
            worker = self.index,
            rows = stats.rows_with_material,
            width_fixes = stats.width_violations,
            space_fixes = stats.space_violations,
            elapsed_ms,
            "job finished"
        );

        Ok(JobResult { id, payload, stats, elapsed_ms, worker: self.index })
    }

    /// Like [`Worker::run`], but every error and panic becomes a failed outcome
    pub fn run_guarded(&self, job: JobSpec) -> JobOutcome {
        let id = job.id;
        match panic::catch_unwind(AssertUnwindSafe(|| self.run(job))) {
            Ok(Ok(result)) => JobOutcome::Done(result),
            Ok(Err(e)) => {
                warn!(job = %id, worker = self.index, error = %e, "job failed");
                JobOutcome::Failed(e.to_string())
            }
            Err(payload) => {
                let reason = format!("worker panicked: {}", panic_message(payload.as_ref()));
                warn!(job = %id, worker = self.index, "{reason}");
                JobOutcome::Failed(reason)
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::JobId;
    use crate::geometry::{BBox, Polygon};

    fn worker() -> Worker {
        Worker::new(0, CancelToken::new())
    }

    #[test]
    fn test_run_returns_cleaned_rows() {
        let job = JobSpec::new(JobId::new(1, 0), BBox::new(0, 50, 0, 10), 4, 4)
            .with_polygons(&[Polygon::rect(0, 0, 10, 10), Polygon::rect(12, 0, 30, 10)]);
        let result = worker().run(job).unwrap();
        assert_eq!(result.id, JobId::new(1, 0));
        let rows = result.into_rows().unwrap();
        assert_eq!(rows.len(), 10);
        assert!(rows.iter().all(|r| r.xs == vec![0, 30]));
    }

    #[test]
    fn test_run_polygon_output() {
        let job = JobSpec::new(JobId::new(1, 0), BBox::new(0, 50, 0, 10), 4, 4)
            .with_polygons(&[Polygon::rect(0, 0, 10, 10)])
            .with_output(OutputFormat::Polygons);
        let result = worker().run(job).unwrap();
        assert_eq!(result.payload, JobPayload::Polygons(vec![Polygon::rect(0, 0, 10, 10)]));
    }

    #[test]
    fn test_guarded_reports_failures() {
        let job = JobSpec::new(JobId::new(1, 0), BBox::new(0, 0, 0, 10), 4, 4);
        assert!(matches!(worker().run_guarded(job), JobOutcome::Failed(_)));

        let job = JobSpec::new(JobId::new(1, 0), BBox::new(0, 3, 0, 10), 4, 4);
        match worker().run_guarded(job) {
            JobOutcome::Failed(reason) => assert!(reason.contains("min_width")),
            JobOutcome::Done(_) => panic!("job below min_width must fail"),
        }
    }

    #[test]
    fn test_cancelled_worker_fails_job() {
        let token = CancelToken::new();
        token.cancel();
        let job = JobSpec::new(JobId::new(1, 0), BBox::new(0, 10, 0, 10), 2, 2);
        match Worker::new(3, token).run_guarded(job) {
            JobOutcome::Failed(reason) => assert!(reason.contains("cancelled")),
            JobOutcome::Done(_) => panic!("cancelled job must fail"),
        }
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload = panic::catch_unwind(|| panic!("boom {}", 7)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "boom 7");
        let payload = panic::catch_unwind(|| panic!("static")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "static");
    }
}
