//! Width and space correction over scanlines
//!
//! A line is any list of sorted, non-touching intervals: a row of the bounding
//! box, or a column after [`transpose`]. Lines are independent and corrected
//! in parallel.

use rayon::prelude::*;

use crate::error::CleanError;
use crate::geometry::{BBox, Interval};

use super::types::{CancelToken, CleanRules, CorrectionCounts};

/// Empty per-line storage for `count` lines
pub fn allocate_lines(count: i64) -> Result<Vec<Vec<Interval>>, CleanError> {
    let n = usize::try_from(count).unwrap_or(usize::MAX);
    let mut lines = Vec::new();
    lines
        .try_reserve_exact(n)
        .map_err(|source| CleanError::Allocation { lines: count, source })?;
    lines.resize_with(n, Vec::new);
    Ok(lines)
}

/// Correct one line until it no longer changes
///
/// Each round first drops intervals narrower than `min_width`, then merges
/// neighbours whose gap is narrower than `min_space`.
pub fn correct_line(line: &mut Vec<Interval>, min_width: i32, min_space: i32) -> CorrectionCounts {
    let min_width = i64::from(min_width);
    let min_space = i64::from(min_space);
    let mut counts = CorrectionCounts::default();

    loop {
        let before = counts;

        let len = line.len();
        line.retain(|iv| iv.width() >= min_width);
        counts.width += (len - line.len()) as u64;

        let mut merged: Vec<Interval> = Vec::with_capacity(line.len());
        for iv in line.drain(..) {
            match merged.last_mut() {
                Some(last) if last.gap_to(&iv) < min_space => {
                    last.end = iv.end;
                    counts.space += 1;
                }
                _ => merged.push(iv),
            }
        }
        *line = merged;

        if counts == before {
            return counts;
        }
    }
}

/// Correct every line in parallel, checking for cancellation once per line
pub fn correct_lines(
    lines: &mut [Vec<Interval>],
    rules: &CleanRules,
    cancel: Option<&CancelToken>,
) -> Result<CorrectionCounts, CleanError> {
    lines
        .par_iter_mut()
        .map(|line| {
            if cancel.is_some_and(CancelToken::is_cancelled) {
                return Err(CleanError::Cancelled);
            }
            Ok(correct_line(line, rules.min_width, rules.min_space))
        })
        .try_reduce(CorrectionCounts::default, |a, b| Ok(a + b))
}

/// Boundary points where exactly one of two sorted boundary lists changes state
pub fn symmetric_difference(a: &[i32], b: &[i32]) -> Vec<i32> {
    use std::cmp::Ordering;

    let (mut i, mut j) = (0, 0);
    let mut out = Vec::with_capacity(a.len() + b.len());
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Less => {
                out.push(a[i]);
                i += 1;
            }
            Ordering::Greater => {
                out.push(b[j]);
                j += 1;
            }
            Ordering::Equal => {
                i += 1;
                j += 1;
            }
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
    out
}

/// Swap the roles of lines and cross coordinates
///
/// `lines[i]` sits at coordinate `line_origin + i` and holds intervals over the
/// cross axis; the result has `cross_len` lines starting at `cross_origin`.
/// Only cells whose state differs from the previous line are touched, found
/// from the symmetric difference of consecutive boundary lists. A virtual
/// empty line after the last one closes every open run.
pub fn transpose(
    lines: &[Vec<Interval>],
    line_origin: i32,
    cross_origin: i32,
    cross_len: usize,
) -> Result<Vec<Vec<Interval>>, CleanError> {
    let mut out = allocate_lines(cross_len as i64)?;
    let mut open: Vec<Option<i32>> = vec![None; cross_len];
    let mut previous: Vec<i32> = Vec::new();
    let closing = Vec::new();

    for (i, line) in lines.iter().chain(std::iter::once(&closing)).enumerate() {
        let coord = (i64::from(line_origin) + i as i64) as i32;
        let bounds: Vec<i32> = line.iter().flat_map(|iv| [iv.start, iv.end]).collect();

        for toggle in symmetric_difference(&previous, &bounds).chunks_exact(2) {
            for cell in toggle[0]..toggle[1] {
                let k = (i64::from(cell) - i64::from(cross_origin)) as usize;
                let Some(slot) = open.get_mut(k) else { continue };
                match slot.take() {
                    Some(start) => out[k].push(Interval::new(start, coord)),
                    None => *slot = Some(coord),
                }
            }
        }
        previous = bounds;
    }

    Ok(out)
}

/// Alternate row and column correction until neither changes
///
/// Returns the accumulated counts and the number of passes run. Stops after
/// `rules.max_passes` even if the last column pass still changed something.
pub fn correct_both_axes(
    rows: &mut Vec<Vec<Interval>>,
    bbox: &BBox,
    rules: &CleanRules,
    cancel: Option<&CancelToken>,
) -> Result<(CorrectionCounts, u32), CleanError> {
    let mut total = CorrectionCounts::default();
    let mut passes = 0;

    while passes < rules.max_passes {
        passes += 1;
        total += correct_lines(rows, rules, cancel)?;

        let mut columns = transpose(rows, bbox.y1, bbox.x1, bbox.width() as usize)?;
        let column_fixes = correct_lines(&mut columns, rules, cancel)?;
        total += column_fixes;
        if column_fixes.is_zero() {
            break;
        }
        *rows = transpose(&columns, bbox.x1, bbox.y1, bbox.height() as usize)?;
    }

    Ok((total, passes))
}
