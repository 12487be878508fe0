//! Polygon reconstruction from cleaned rows
//!
//! Vertically adjacent intervals that overlap one-to-one are stacked into a
//! y-monotone staircase polygon. Any split, join or gap ends the current
//! polygons and starts new ones, so touching outputs may share edges; the
//! host merges them.

use crate::error::CleanError;
use crate::geometry::{Interval, Point, Polygon, Row};

use super::types::CancelToken;

/// A polygon under construction: its left and right boundary chains, bottom up
struct Chain {
    left: Vec<Point>,
    right: Vec<Point>,
    span: Interval,
}

impl Chain {
    fn start(span: Interval, y: i32) -> Self {
        Self {
            left: vec![Point::new(span.start, y)],
            right: vec![Point::new(span.end, y)],
            span,
        }
    }

    fn extend(&mut self, span: Interval, y: i32) {
        if span.start != self.span.start {
            self.left.push(Point::new(self.span.start, y));
            self.left.push(Point::new(span.start, y));
        }
        if span.end != self.span.end {
            self.right.push(Point::new(self.span.end, y));
            self.right.push(Point::new(span.end, y));
        }
        self.span = span;
    }

    /// Clockwise vertex list: up the left chain, down the right one
    fn close(mut self, top: i32) -> Polygon {
        self.left.push(Point::new(self.span.start, top));
        self.right.push(Point::new(self.span.end, top));
        let mut points = self.left;
        points.extend(self.right.into_iter().rev());
        Polygon::new(points)
    }
}

/// Rebuild polygons from rows sorted by ascending `y`
///
/// `cancel` is checked once per row.
pub fn rows_to_polygons(rows: &[Row], cancel: Option<&CancelToken>) -> Result<Vec<Polygon>, CleanError> {
    let mut polygons = Vec::new();
    let mut active: Vec<Chain> = Vec::new();
    let mut last_y: Option<i32> = None;

    for row in rows.iter().filter(|r| !r.is_empty()) {
        if cancel.is_some_and(CancelToken::is_cancelled) {
            return Err(CleanError::Cancelled);
        }
        let y = row.y;
        let current: Vec<Interval> = row.intervals().collect();

        let contiguous = matches!(last_y, Some(prev) if i64::from(prev) + 1 == i64::from(y));
        if let (false, Some(prev)) = (contiguous, last_y) {
            polygons.extend(active.drain(..).map(|c| c.close(prev + 1)));
        }

        // Two-pointer overlap count between open chains and this row
        let mut chain_hits = vec![0usize; active.len()];
        let mut interval_hits = vec![0usize; current.len()];
        let mut link: Vec<Option<usize>> = vec![None; current.len()];
        let (mut i, mut j) = (0, 0);
        while i < active.len() && j < current.len() {
            let (a, b) = (active[i].span, current[j]);
            if a.overlaps(&b) {
                chain_hits[i] += 1;
                interval_hits[j] += 1;
                link[j] = Some(i);
            }
            if a.end <= b.end {
                i += 1;
            } else {
                j += 1;
            }
        }

        let mut previous: Vec<Option<Chain>> = active.drain(..).map(Some).collect();
        for (j, span) in current.iter().enumerate() {
            let continued = match link[j] {
                Some(i) if interval_hits[j] == 1 && chain_hits[i] == 1 => previous[i].take(),
                _ => None,
            };
            match continued {
                Some(mut chain) => {
                    chain.extend(*span, y);
                    active.push(chain);
                }
                None => active.push(Chain::start(*span, y)),
            }
        }
        polygons.extend(previous.into_iter().flatten().map(|c| c.close(y)));

        last_y = Some(y);
    }

    if let Some(prev) = last_y {
        polygons.extend(active.drain(..).map(|c| c.close(prev + 1)));
    }
    Ok(polygons)
}
