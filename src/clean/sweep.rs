//! Edge sealing and the vertical-edge sweep
//!
//! Sealing turns raw oriented edges into a canonical sorted list; the sweep
//! walks the rows of the bounding box bottom to top and turns the edges that
//! are open at each row into filled intervals.

use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::CleanError;
use crate::geometry::{BBox, Edge, Interval};

use super::types::CancelToken;

/// A vertical boundary run in sweep form
///
/// `weight` is the change in winding number when crossing the edge left to
/// right over `[ylo, yhi)`: +1 for an upward hull edge, -1 for a downward
/// one. Sealed edges sort by `(x, ylo)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SealedEdge {
    pub x: i32,
    pub ylo: i32,
    pub yhi: i32,
    pub weight: i32,
}

impl SealedEdge {
    /// `None` for horizontal and zero-length edges, which never toggle a row
    pub fn from_edge(edge: &Edge) -> Option<Self> {
        if !edge.is_vertical() {
            return None;
        }
        let (ylo, yhi, weight) = if edge.y2 > edge.y1 {
            (edge.y1, edge.y2, 1)
        } else {
            (edge.y2, edge.y1, -1)
        };
        Some(Self { x: edge.x1, ylo, yhi, weight })
    }
}

/// Sort edges and collapse them into canonical runs
///
/// For every x the weights are summed along y and re-emitted as maximal runs
/// of constant non-zero weight. Coincident opposite edges (abutting shapes)
/// cancel, an opposite edge inside a longer one splits it, and collinear
/// pieces of the same boundary join. Winding numbers are unchanged, so the
/// sweep result is the same as for the raw edges; sealing sealed edges
/// returns them unchanged.
pub fn seal_edges(mut edges: Vec<SealedEdge>) -> Vec<SealedEdge> {
    edges.par_sort_unstable();

    let mut sealed = Vec::with_capacity(edges.len());
    let mut events: Vec<(i32, i32)> = Vec::new();

    for group in edges.chunk_by(|a, b| a.x == b.x) {
        let x = group[0].x;
        events.clear();
        for e in group {
            events.push((e.ylo, e.weight));
            events.push((e.yhi, -e.weight));
        }
        events.sort_unstable_by_key(|&(y, _)| y);

        let mut weight = 0;
        let mut run_start = 0;
        let mut i = 0;
        while i < events.len() {
            let y = events[i].0;
            let mut next = weight;
            while i < events.len() && events[i].0 == y {
                next += events[i].1;
                i += 1;
            }
            if next != weight {
                if weight != 0 {
                    sealed.push(SealedEdge { x, ylo: run_start, yhi: y, weight });
                }
                run_start = y;
                weight = next;
            }
        }
    }

    sealed
}

/// Fill `rows` (one entry per row of `bbox`, bottom first) from sealed edges
///
/// Keeps an ordered map of open x-positions with their net winding change;
/// each edge enters the map at `ylo` and leaves at `yhi`. A row's intervals
/// are the spans where the running winding number is positive. Rows between
/// two events share the same intervals.
pub fn synthesize_rows(
    edges: &[SealedEdge],
    bbox: &BBox,
    rows: &mut [Vec<Interval>],
    cancel: Option<&CancelToken>,
) -> Result<(), CleanError> {
    let mut events: Vec<(i32, i32, i32)> = Vec::with_capacity(edges.len() * 2);
    for e in edges {
        events.push((e.ylo, e.x, e.weight));
        events.push((e.yhi, e.x, -e.weight));
    }
    events.par_sort_unstable_by_key(|&(y, _, _)| y);

    let mut open: BTreeMap<i32, i32> = BTreeMap::new();
    let mut current: Vec<Interval> = Vec::new();
    let mut next_event = 0;

    for (offset, row) in rows.iter_mut().enumerate() {
        if cancel.is_some_and(CancelToken::is_cancelled) {
            return Err(CleanError::Cancelled);
        }
        let y = (i64::from(bbox.y1) + offset as i64) as i32;

        let mut changed = false;
        while next_event < events.len() && events[next_event].0 <= y {
            let (_, x, delta) = events[next_event];
            let slot = open.entry(x).or_insert(0);
            *slot += delta;
            if *slot == 0 {
                open.remove(&x);
            }
            changed = true;
            next_event += 1;
        }
        if changed {
            current = intervals_from_open(&open);
        }
        if !current.is_empty() {
            row.clone_from(&current);
        }
    }

    Ok(())
}

fn intervals_from_open(open: &BTreeMap<i32, i32>) -> Vec<Interval> {
    let mut out = Vec::new();
    let mut winding = 0;
    let mut start = 0;
    for (&x, &delta) in open {
        let was_inside = winding > 0;
        winding += delta;
        match (was_inside, winding > 0) {
            (false, true) => start = x,
            (true, false) => out.push(Interval::new(start, x)),
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Polygon;

    fn sweep_edges(polygons: &[Polygon]) -> Vec<SealedEdge> {
        polygons
            .iter()
            .flat_map(|p| p.edges().collect::<Vec<_>>())
            .filter_map(|e| SealedEdge::from_edge(&e))
            .collect()
    }

    fn rows_for(polygons: &[Polygon], bbox: BBox) -> Vec<Vec<Interval>> {
        let sealed = seal_edges(sweep_edges(polygons));
        let mut rows = vec![Vec::new(); bbox.height() as usize];
        synthesize_rows(&sealed, &bbox, &mut rows, None).unwrap();
        rows
    }

    #[test]
    fn test_from_edge_orientation() {
        let up = SealedEdge::from_edge(&Edge::new(4, 4, 0, 10)).unwrap();
        assert_eq!((up.ylo, up.yhi, up.weight), (0, 10, 1));
        let down = SealedEdge::from_edge(&Edge::new(4, 4, 10, 0)).unwrap();
        assert_eq!((down.ylo, down.yhi, down.weight), (0, 10, -1));
        assert!(SealedEdge::from_edge(&Edge::new(0, 10, 3, 3)).is_none());
        assert!(SealedEdge::from_edge(&Edge::new(3, 3, 3, 3)).is_none());
    }

    #[test]
    fn test_seal_cancels_abutting_shapes() {
        // Two squares sharing the boundary at x = 10
        let sealed = seal_edges(sweep_edges(&[
            Polygon::rect(0, 0, 10, 10),
            Polygon::rect(10, 0, 20, 10),
        ]));
        assert_eq!(sealed.len(), 2);
        assert_eq!(sealed[0], SealedEdge { x: 0, ylo: 0, yhi: 10, weight: 1 });
        assert_eq!(sealed[1], SealedEdge { x: 20, ylo: 0, yhi: 10, weight: -1 });
    }

    #[test]
    fn test_seal_splits_edge_around_enclosed_opposite_edge() {
        let edges = vec![
            SealedEdge { x: 5, ylo: 0, yhi: 10, weight: 1 },
            SealedEdge { x: 5, ylo: 3, yhi: 6, weight: -1 },
        ];
        let sealed = seal_edges(edges);
        assert_eq!(
            sealed,
            vec![
                SealedEdge { x: 5, ylo: 0, yhi: 3, weight: 1 },
                SealedEdge { x: 5, ylo: 6, yhi: 10, weight: 1 },
            ]
        );
    }

    #[test]
    fn test_seal_joins_collinear_pieces_and_is_idempotent() {
        let edges = vec![
            SealedEdge { x: 2, ylo: 5, yhi: 9, weight: -1 },
            SealedEdge { x: 0, ylo: 4, yhi: 8, weight: 1 },
            SealedEdge { x: 0, ylo: 0, yhi: 4, weight: 1 },
            SealedEdge { x: 0, ylo: 0, yhi: 0, weight: 1 },
        ];
        let once = seal_edges(edges);
        assert_eq!(
            once,
            vec![
                SealedEdge { x: 0, ylo: 0, yhi: 8, weight: 1 },
                SealedEdge { x: 2, ylo: 5, yhi: 9, weight: -1 },
            ]
        );
        assert_eq!(seal_edges(once.clone()), once);
    }

    #[test]
    fn test_sweep_rectangle_rows() {
        let bbox = BBox::new(0, 20, 0, 6);
        let rows = rows_for(&[Polygon::rect(2, 1, 12, 4)], bbox);
        assert!(rows[0].is_empty());
        for row in &rows[1..4] {
            assert_eq!(row, &vec![Interval::new(2, 12)]);
        }
        assert!(rows[4].is_empty());
        assert!(rows[5].is_empty());
    }

    #[test]
    fn test_sweep_ring_leaves_hole_open() {
        // Outer hull clockwise, hole counter-clockwise
        let outer = Polygon::rect(0, 0, 30, 30);
        let mut hole = Polygon::rect(10, 10, 20, 20);
        hole.points.reverse();
        let rows = rows_for(&[outer, hole], BBox::new(0, 30, 0, 30));
        assert_eq!(rows[5], vec![Interval::new(0, 30)]);
        assert_eq!(rows[15], vec![Interval::new(0, 10), Interval::new(20, 30)]);
        assert_eq!(rows[25], vec![Interval::new(0, 30)]);
    }

    #[test]
    fn test_sweep_overlapping_unmerged_shapes_fill_union() {
        let rows = rows_for(
            &[Polygon::rect(0, 0, 10, 4), Polygon::rect(5, 0, 15, 4)],
            BBox::new(0, 15, 0, 4),
        );
        assert_eq!(rows[0], vec![Interval::new(0, 15)]);
    }

    #[test]
    fn test_sweep_stops_when_cancelled() {
        let token = CancelToken::new();
        token.cancel();
        let bbox = BBox::new(0, 10, 0, 10);
        let mut rows = vec![Vec::new(); 10];
        let result = synthesize_rows(&[], &bbox, &mut rows, Some(&token));
        assert!(matches!(result, Err(CleanError::Cancelled)));
    }
}
