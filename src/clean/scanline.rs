//! Per-job scanline cleaner
//!
//! Lifecycle: edges are added while the cleaner is open, `seal_and_sort`
//! canonicalises them and fills the rows, `clean` applies width/space
//! correction, and rows (or polygons) are read back afterwards.

use std::time::Instant;
use tracing::debug;

use crate::error::CleanError;
use crate::geometry::{BBox, Edge, Interval, Polygon, Row};

use super::correction::{allocate_lines, correct_both_axes, correct_lines};
use super::polygons::rows_to_polygons;
use super::sweep::{seal_edges, synthesize_rows, SealedEdge};
use super::types::{CancelToken, CleanAxes, CleanRules, CleanStats, CorrectionCounts};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Open,
    Sealed,
    Cleaned,
}

/// Width/space cleaner for one layer inside one bounding box
#[derive(Debug)]
pub struct ScanlineCleaner {
    bbox: BBox,
    rules: CleanRules,
    phase: Phase,
    pending: Vec<SealedEdge>,
    sealed: Vec<SealedEdge>,
    /// Intervals per row, index `y - bbox.y1`
    rows: Vec<Vec<Interval>>,
    stats: CleanStats,
    cancel: Option<CancelToken>,
}

impl ScanlineCleaner {
    /// Allocate row storage for `bbox`
    pub fn new(bbox: BBox, rules: CleanRules) -> Result<Self, CleanError> {
        if bbox.is_empty() {
            return Err(CleanError::EmptyBoundingBox(bbox));
        }
        if rules.min_width < 0 || rules.min_space < 0 {
            return Err(CleanError::InvalidThreshold {
                min_width: rules.min_width,
                min_space: rules.min_space,
            });
        }

        let rows = allocate_lines(bbox.height())?;
        Ok(Self {
            bbox,
            rules,
            phase: Phase::Open,
            pending: Vec::new(),
            sealed: Vec::new(),
            rows,
            stats: CleanStats::default(),
            cancel: None,
        })
    }

    /// Abort the sweep and correction with [`CleanError::Cancelled`] once `token` is raised
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn bbox(&self) -> &BBox {
        &self.bbox
    }

    pub fn rules(&self) -> &CleanRules {
        &self.rules
    }

    pub fn stats(&self) -> &CleanStats {
        &self.stats
    }

    pub fn is_sealed(&self) -> bool {
        self.phase != Phase::Open
    }

    pub fn is_cleaned(&self) -> bool {
        self.phase == Phase::Cleaned
    }

    pub fn add_edge(&mut self, edge: Edge) -> Result<(), CleanError> {
        if self.phase != Phase::Open {
            return Err(CleanError::AlreadySealed);
        }
        if !edge.is_manhattan() {
            return Err(CleanError::NonManhattanEdge(edge));
        }
        if !self.bbox.contains_edge(&edge) {
            return Err(CleanError::EdgeOutOfBounds { edge, bbox: self.bbox });
        }

        self.stats.edges_in += 1;
        match SealedEdge::from_edge(&edge) {
            Some(e) => self.pending.push(e),
            None => self.stats.edges_ignored += 1,
        }
        Ok(())
    }

    pub fn add_edges(&mut self, edges: impl IntoIterator<Item = Edge>) -> Result<(), CleanError> {
        edges.into_iter().try_for_each(|e| self.add_edge(e))
    }

    /// Sort and canonicalise the edges, then fill every row. No-op once sealed.
    pub fn seal_and_sort(&mut self) -> Result<(), CleanError> {
        if self.phase != Phase::Open {
            return Ok(());
        }

        self.check_cancel()?;
        let sort_start = Instant::now();
        self.sealed = seal_edges(std::mem::take(&mut self.pending));
        self.check_cancel()?;
        debug!(
            edges_in = self.stats.edges_in,
            edges_sealed = self.sealed.len(),
            elapsed_ms = sort_start.elapsed().as_secs_f64() * 1000.0,
            "sorted and sealed edges"
        );

        let sweep_start = Instant::now();
        synthesize_rows(&self.sealed, &self.bbox, &mut self.rows, self.cancel.as_ref())?;
        self.stats.edges_sealed = self.sealed.len() as u64;
        self.stats.rows_with_material = self.count_rows_with_material();
        debug!(
            rows = self.rows.len(),
            rows_with_material = self.stats.rows_with_material,
            elapsed_ms = sweep_start.elapsed().as_secs_f64() * 1000.0,
            "swept rows"
        );

        self.phase = Phase::Sealed;
        Ok(())
    }

    /// Apply width/space correction; returns the violations fixed
    ///
    /// Does nothing when correction is disabled for this job or the rows were
    /// already cleaned.
    pub fn clean(&mut self) -> Result<CorrectionCounts, CleanError> {
        match self.phase {
            Phase::Open => return Err(CleanError::NotSealed("cleaning")),
            Phase::Cleaned => return Ok(CorrectionCounts::default()),
            Phase::Sealed => {}
        }
        if !self.rules.apply_correction {
            self.phase = Phase::Cleaned;
            return Ok(CorrectionCounts::default());
        }

        let start = Instant::now();
        let cancel = self.cancel.as_ref();
        let (counts, passes) = match self.rules.axes {
            CleanAxes::Horizontal => (correct_lines(&mut self.rows, &self.rules, cancel)?, 1),
            CleanAxes::Both => correct_both_axes(&mut self.rows, &self.bbox, &self.rules, cancel)?,
        };

        self.stats.width_violations = counts.width;
        self.stats.space_violations = counts.space;
        self.stats.passes = passes;
        self.stats.rows_with_material = self.count_rows_with_material();
        debug!(
            width = counts.width,
            space = counts.space,
            passes,
            elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            "corrected rows"
        );

        self.phase = Phase::Cleaned;
        Ok(counts)
    }

    /// Canonical edges after sealing (empty before)
    pub fn sealed_edges(&self) -> &[SealedEdge] {
        &self.sealed
    }

    /// Intervals of row `y`
    pub fn row(&self, y: i32) -> Result<&[Interval], CleanError> {
        if self.phase == Phase::Open {
            return Err(CleanError::NotSealed("reading rows"));
        }
        if y < self.bbox.y1 || y >= self.bbox.y2 {
            return Err(CleanError::RowOutOfBounds { y, bbox: self.bbox });
        }
        let index = (i64::from(y) - i64::from(self.bbox.y1)) as usize;
        Ok(&self.rows[index])
    }

    /// Alternating start/end x-coordinates of row `y`
    pub fn get_row(&self, y: i32) -> Result<Row, CleanError> {
        self.row(y).map(|intervals| Row::from_intervals(y, intervals))
    }

    /// All rows holding material, ascending in y
    pub fn non_empty_rows(&self) -> Result<impl Iterator<Item = Row> + '_, CleanError> {
        if self.phase == Phase::Open {
            return Err(CleanError::NotSealed("reading rows"));
        }
        let y1 = i64::from(self.bbox.y1);
        Ok(self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, intervals)| !intervals.is_empty())
            .map(move |(i, intervals)| Row::from_intervals((y1 + i as i64) as i32, intervals)))
    }

    /// Rows reassembled into clockwise polygons
    pub fn polygons(&self) -> Result<Vec<Polygon>, CleanError> {
        let rows: Vec<Row> = self.non_empty_rows()?.collect();
        rows_to_polygons(&rows, self.cancel.as_ref())
    }

    fn check_cancel(&self) -> Result<(), CleanError> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(CleanError::Cancelled),
            _ => Ok(()),
        }
    }

    fn count_rows_with_material(&self) -> u64 {
        self.rows.iter().filter(|r| !r.is_empty()).count() as u64
    }
}
