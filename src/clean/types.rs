//! Cleaning rules, statistics and cancellation
//!
//! Contains the per-job rule set and the counters reported back with every
//! result.

use serde::{Deserialize, Serialize};
use std::ops::AddAssign;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Threshold value that historically meant "sort only, skip correction"
pub const SENTINEL_THRESHOLD: i32 = 1;

/// Retry bound for alternating row/column passes
pub const DEFAULT_MAX_PASSES: u32 = 10;

/// Which scanline directions get width/space correction
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CleanAxes {
    /// Rows only
    #[default]
    Horizontal,
    /// Rows, then columns, alternating until stable
    Both,
}

/// Minimum width/space rules for one layer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanRules {
    pub min_width: i32,
    pub min_space: i32,
    pub apply_correction: bool,
    pub axes: CleanAxes,
    pub max_passes: u32,
}

impl CleanRules {
    /// Rules with the legacy sentinel deciding whether correction runs
    pub fn new(min_width: i32, min_space: i32) -> Self {
        Self {
            min_width,
            min_space,
            apply_correction: min_width != SENTINEL_THRESHOLD && min_space != SENTINEL_THRESHOLD,
            axes: CleanAxes::default(),
            max_passes: DEFAULT_MAX_PASSES,
        }
    }

    /// Override the sentinel rule with an explicit switch
    pub fn with_correction(mut self, apply: bool) -> Self {
        self.apply_correction = apply;
        self
    }

    pub fn with_axes(mut self, axes: CleanAxes) -> Self {
        self.axes = axes;
        self
    }

    pub fn with_max_passes(mut self, passes: u32) -> Self {
        self.max_passes = passes.max(1);
        self
    }
}

impl Default for CleanRules {
    fn default() -> Self {
        Self::new(SENTINEL_THRESHOLD, SENTINEL_THRESHOLD)
    }
}

/// Violations fixed by correction
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionCounts {
    /// Intervals dropped for being narrower than `min_width`
    pub width: u64,
    /// Gaps closed for being narrower than `min_space`
    pub space: u64,
}

impl CorrectionCounts {
    pub fn is_zero(&self) -> bool {
        self.width == 0 && self.space == 0
    }

    pub fn total(&self) -> u64 {
        self.width + self.space
    }
}

impl AddAssign for CorrectionCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.width += rhs.width;
        self.space += rhs.space;
    }
}

impl std::ops::Add for CorrectionCounts {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self += rhs;
        self
    }
}

/// Per-job counters reported with the result
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanStats {
    pub edges_in: u64,
    /// Edges left after sealing (cancelled, merged and degenerate edges removed)
    pub edges_sealed: u64,
    /// Horizontal and zero-length edges ignored by the sweep
    pub edges_ignored: u64,
    pub width_violations: u64,
    pub space_violations: u64,
    /// Correction passes run (1 for row-only cleaning)
    pub passes: u32,
    pub rows_with_material: u64,
}

/// Shared flag checked by a running cleaner between scanlines
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_disables_correction() {
        assert!(!CleanRules::new(1, 1).apply_correction);
        assert!(!CleanRules::new(1, 20).apply_correction);
        assert!(!CleanRules::new(20, 1).apply_correction);
        assert!(CleanRules::new(20, 20).apply_correction);
    }

    #[test]
    fn test_explicit_flag_overrides_sentinel() {
        assert!(CleanRules::new(1, 1).with_correction(true).apply_correction);
        assert!(!CleanRules::new(5, 5).with_correction(false).apply_correction);
    }

    #[test]
    fn test_cancel_token_is_shared_between_clones() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }
}
