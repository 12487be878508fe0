//! Error types for the cleaner, the dispatcher and row packing

use std::collections::TryReserveError;

use crate::engine::JobId;
use crate::geometry::{BBox, Edge};

/// Failures inside a single cleaning job
#[derive(Debug, thiserror::Error)]
pub enum CleanError {
    #[error("bounding box {0} has zero or negative size")]
    EmptyBoundingBox(BBox),

    #[error("bounding box {bbox} has a side shorter than min_width {min_width}")]
    BoxBelowMinWidth { bbox: BBox, min_width: i32 },

    #[error("thresholds must not be negative (min_width={min_width}, min_space={min_space})")]
    InvalidThreshold { min_width: i32, min_space: i32 },

    #[error("edge {0} is not axis-parallel")]
    NonManhattanEdge(Edge),

    #[error("edge {edge} lies outside bounding box {bbox}")]
    EdgeOutOfBounds { edge: Edge, bbox: BBox },

    #[error("edges cannot be added after sealing")]
    AlreadySealed,

    #[error("edges must be sealed before {0}")]
    NotSealed(&'static str),

    #[error("row {y} is outside bounding box {bbox}")]
    RowOutOfBounds { y: i32, bbox: BBox },

    #[error("cannot allocate storage for {lines} scanlines: {source}")]
    Allocation {
        lines: i64,
        #[source]
        source: TryReserveError,
    },

    #[error("cleaning was cancelled")]
    Cancelled,
}

/// Caller contract violations and job outcomes surfaced by the dispatcher
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("job {0} is already outstanding")]
    DuplicateJob(JobId),

    #[error("job {0} was never submitted")]
    UnknownJob(JobId),

    #[error("result of job {0} was already retrieved")]
    AlreadyRetrieved(JobId),

    #[error("job {id} failed: {reason}")]
    JobFailed { id: JobId, reason: String },

    #[error("job {id} did not finish within {waited_ms} ms")]
    Timeout { id: JobId, waited_ms: u64 },

    #[error("dispatcher is shutting down")]
    ShuttingDown,

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Malformed packed row payloads
#[derive(Debug, thiserror::Error)]
pub enum PackError {
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("field `{field}` has {len} bytes, not a multiple of 4")]
    Misaligned { field: &'static str, len: usize },

    #[error("inconsistent packed rows: {0}")]
    Inconsistent(String),
}
