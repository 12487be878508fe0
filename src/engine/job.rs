//! Job model shared by workers, the dispatcher and the process protocol

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::clean::{CleanAxes, CleanRules, CleanStats};
use crate::error::PackError;
use crate::geometry::{pack_rows, unpack_rows, BBox, Edge, PackedRows, Polygon, Row};

/// Job identity; at most one outstanding job per identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId {
    pub layer: u32,
    pub datatype: u32,
}

impl JobId {
    pub const fn new(layer: u32, datatype: u32) -> Self {
        Self { layer, datatype }
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.layer, self.datatype)
    }
}

/// What the worker publishes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Rows,
    Polygons,
}

/// One layer's cleaning job: rules, bounding box and edges
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub id: JobId,
    pub bbox: BBox,
    pub rules: CleanRules,
    pub edges: Vec<Edge>,
    pub output: OutputFormat,
}

impl JobSpec {
    /// Job with sentinel-derived correction and row output
    pub fn new(id: JobId, bbox: BBox, min_width: i32, min_space: i32) -> Self {
        Self {
            id,
            bbox,
            rules: CleanRules::new(min_width, min_space),
            edges: Vec::new(),
            output: OutputFormat::default(),
        }
    }

    pub fn with_edges(mut self, edges: Vec<Edge>) -> Self {
        self.edges = edges;
        self
    }

    /// Append the boundary edges of each polygon
    pub fn with_polygons<'a>(mut self, polygons: impl IntoIterator<Item = &'a Polygon>) -> Self {
        for polygon in polygons {
            self.edges.extend(polygon.edges());
        }
        self
    }

    /// `Some` overrides the sentinel rule
    pub fn with_correction(mut self, apply: Option<bool>) -> Self {
        if let Some(apply) = apply {
            self.rules = self.rules.with_correction(apply);
        }
        self
    }

    pub fn with_axes(mut self, axes: CleanAxes) -> Self {
        self.rules = self.rules.with_axes(axes);
        self
    }

    pub fn with_output(mut self, output: OutputFormat) -> Self {
        self.output = output;
        self
    }

    /// Nothing worth cleaning: empty box, or a side shorter than `min_width`
    pub fn should_skip(&self) -> bool {
        let min_width = i64::from(self.rules.min_width);
        self.bbox.is_empty() || self.bbox.width() < min_width || self.bbox.height() < min_width
    }
}

/// Cleaned geometry in one of the transfer shapes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPayload {
    Rows(Vec<Row>),
    Polygons(Vec<Polygon>),
    PackedRows(PackedRows),
}

/// Published output of a finished job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    #[serde(flatten)]
    pub id: JobId,
    #[serde(flatten)]
    pub payload: JobPayload,
    pub stats: CleanStats,
    pub elapsed_ms: f64,
    /// Index of the worker that ran the job
    pub worker: usize,
}

impl JobResult {
    /// Same result with rows base64-packed; polygon payloads are left as is
    pub fn packed(mut self) -> Self {
        if let JobPayload::Rows(rows) = &self.payload {
            self.payload = JobPayload::PackedRows(pack_rows(rows));
        }
        self
    }

    /// Rows of the result, unpacking if needed
    pub fn into_rows(self) -> Result<Vec<Row>, PackError> {
        match self.payload {
            JobPayload::Rows(rows) => Ok(rows),
            JobPayload::PackedRows(packed) => unpack_rows(&packed),
            JobPayload::Polygons(_) => Err(PackError::Inconsistent(format!(
                "job {} carries polygons, not rows",
                self.id
            ))),
        }
    }
}

/// Lifecycle of a job inside the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Submitted,
    Assigned,
    Running,
    ResultReady,
    Failed,
    Retrieved,
}

impl JobState {
    /// Finished and not yet retrieved
    pub fn is_finished(self) -> bool {
        matches!(self, JobState::ResultReady | JobState::Failed)
    }

    /// Counts against identity uniqueness
    pub fn is_outstanding(self) -> bool {
        self != JobState::Retrieved
    }
}

/// What a worker hands back for one job
#[derive(Debug)]
pub enum JobOutcome {
    Done(JobResult),
    Failed(String),
}
