//! Scanline width/space cleaning
//!
//! Turns the oriented boundary edges of one layer into filled row intervals,
//! removes minimum-width and minimum-space violations, and rebuilds polygons.
//!
//! # Submodules
//! - `types` - Rules, statistics and the cancel token
//! - `sweep` - Edge sealing and the vertical-edge sweep that fills rows
//! - `correction` - Per-line width/space correction and row/column transpose
//! - `polygons` - Staircase polygon reconstruction from rows
//! - `scanline` - The per-job cleaner tying the phases together

mod types;
mod sweep;
mod correction;
mod polygons;
mod scanline;

pub use types::{
    CancelToken, CleanAxes, CleanRules, CleanStats, CorrectionCounts, DEFAULT_MAX_PASSES,
    SENTINEL_THRESHOLD,
};

pub use sweep::{seal_edges, synthesize_rows, SealedEdge};

pub use correction::{correct_line, correct_lines, symmetric_difference, transpose};

pub use polygons::rows_to_polygons;

pub use scanline::ScanlineCleaner;
