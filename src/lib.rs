//! Scanline width/space cleaning for integer-grid layout layers
//!
//! Each layer is an independent job: its polygon edges are swept into row
//! intervals, intervals narrower than `min_width` are dropped and gaps
//! narrower than `min_space` are closed, and the result is handed back as
//! rows or rebuilt polygons. Jobs run on a bounded worker pool, in-process
//! or behind the `slcleaner-server` child process.
//!
//! # Modules
//! - `geometry` - Edges, boxes, intervals, rows, polygons and row packing
//! - `clean` - The per-layer scanline cleaner
//! - `engine` - Jobs, workers and the dispatcher
//! - `server` - Line-delimited JSON-RPC front end for the dispatcher
//! - `client` - Spawns and drives a server child process
//! - `layout` - JSON layout files for the command-line cleaner
//! - `logging` - tracing subscriber setup for the binaries

pub mod clean;
pub mod client;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod layout;
pub mod logging;
pub mod server;

pub use clean::{CleanAxes, CleanRules, ScanlineCleaner};
pub use client::{CleanerProcess, RemoteError};
pub use engine::{Dispatcher, DispatcherConfig, JobId, JobResult, JobSpec, OutputFormat};
pub use error::{CleanError, DispatchError, PackError};
pub use geometry::{BBox, Edge, Interval, Polygon, Row};
