//! Core geometry types for layout cleaning
//!
//! All coordinates are integers in layout database units. Edges follow the
//! host's clockwise hull convention: an upward vertical edge has material on
//! its right, a downward one on its left.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A polygon boundary segment `(x1, x2, y1, y2)`, running from `(x1, y1)` to `(x2, y2)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[i32; 4]", into = "[i32; 4]")]
pub struct Edge {
    pub x1: i32,
    pub x2: i32,
    pub y1: i32,
    pub y2: i32,
}

impl Edge {
    pub const fn new(x1: i32, x2: i32, y1: i32, y2: i32) -> Self {
        Self { x1, x2, y1, y2 }
    }

    /// Both endpoints coincide
    pub fn is_degenerate(&self) -> bool {
        self.x1 == self.x2 && self.y1 == self.y2
    }

    pub fn is_vertical(&self) -> bool {
        self.x1 == self.x2 && self.y1 != self.y2
    }

    pub fn is_horizontal(&self) -> bool {
        self.y1 == self.y2 && self.x1 != self.x2
    }

    /// Axis-parallel (or degenerate). Angled edges are not supported.
    pub fn is_manhattan(&self) -> bool {
        self.x1 == self.x2 || self.y1 == self.y2
    }
}

impl From<[i32; 4]> for Edge {
    fn from(c: [i32; 4]) -> Self {
        Edge::new(c[0], c[1], c[2], c[3])
    }
}

impl From<Edge> for [i32; 4] {
    fn from(e: Edge) -> Self {
        [e.x1, e.x2, e.y1, e.y2]
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})->({},{})", self.x1, self.y1, self.x2, self.y2)
    }
}

/// Job bounding box `(x1, x2, y1, y2)`, lower corner inclusive, upper corner exclusive for rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[i32; 4]", into = "[i32; 4]")]
pub struct BBox {
    pub x1: i32,
    pub x2: i32,
    pub y1: i32,
    pub y2: i32,
}

impl BBox {
    pub const fn new(x1: i32, x2: i32, y1: i32, y2: i32) -> Self {
        Self { x1, x2, y1, y2 }
    }

    pub fn width(&self) -> i64 {
        i64::from(self.x2) - i64::from(self.x1)
    }

    pub fn height(&self) -> i64 {
        i64::from(self.y2) - i64::from(self.y1)
    }

    /// Zero or negative extent on either axis
    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    /// Closed-range containment of both endpoints
    pub fn contains_edge(&self, edge: &Edge) -> bool {
        let xs = self.x1..=self.x2;
        let ys = self.y1..=self.y2;
        xs.contains(&edge.x1) && xs.contains(&edge.x2) && ys.contains(&edge.y1) && ys.contains(&edge.y2)
    }

    /// Smallest box enclosing all points, `None` for an empty input
    pub fn enclosing<'a>(points: impl IntoIterator<Item = &'a Point>) -> Option<BBox> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bbox = BBox::new(first.x, first.x, first.y, first.y);
        for p in iter {
            bbox.x1 = bbox.x1.min(p.x);
            bbox.x2 = bbox.x2.max(p.x);
            bbox.y1 = bbox.y1.min(p.y);
            bbox.y2 = bbox.y2.max(p.y);
        }
        Some(bbox)
    }

    /// Union of two boxes
    pub fn union(&self, other: &BBox) -> BBox {
        BBox::new(
            self.x1.min(other.x1),
            self.x2.max(other.x2),
            self.y1.min(other.y1),
            self.y2.max(other.y2),
        )
    }
}

impl From<[i32; 4]> for BBox {
    fn from(c: [i32; 4]) -> Self {
        BBox::new(c[0], c[1], c[2], c[3])
    }
}

impl From<BBox> for [i32; 4] {
    fn from(b: BBox) -> Self {
        [b.x1, b.x2, b.y1, b.y2]
    }
}

impl fmt::Display for BBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}..{}]x[{}..{}]", self.x1, self.x2, self.y1, self.y2)
    }
}

/// Half-open `[start, end)` span of filled material on a scanline
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Interval {
    pub start: i32,
    pub end: i32,
}

impl Interval {
    pub const fn new(start: i32, end: i32) -> Self {
        Self { start, end }
    }

    pub fn width(&self) -> i64 {
        i64::from(self.end) - i64::from(self.start)
    }

    /// Distance from the end of `self` to the start of `next`
    pub fn gap_to(&self, next: &Interval) -> i64 {
        i64::from(next.start) - i64::from(self.end)
    }

    /// Shares at least one unit cell with `other`
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// One scanline of output: alternating start/end x-coordinates at row `y`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub y: i32,
    pub xs: Vec<i32>,
}

impl Row {
    pub fn from_intervals(y: i32, intervals: &[Interval]) -> Self {
        let xs = intervals.iter().flat_map(|iv| [iv.start, iv.end]).collect();
        Row { y, xs }
    }

    /// Pairs of `xs` as intervals; a trailing unpaired value is ignored
    pub fn intervals(&self) -> impl Iterator<Item = Interval> + '_ {
        self.xs.chunks_exact(2).map(|c| Interval::new(c[0], c[1]))
    }

    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }
}

/// A grid point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[i32; 2]", into = "[i32; 2]")]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl From<[i32; 2]> for Point {
    fn from(c: [i32; 2]) -> Self {
        Point::new(c[0], c[1])
    }
}

impl From<Point> for [i32; 2] {
    fn from(p: Point) -> Self {
        [p.x, p.y]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_classification() {
        assert!(Edge::new(0, 0, 0, 10).is_vertical());
        assert!(Edge::new(0, 10, 5, 5).is_horizontal());
        assert!(Edge::new(3, 3, 4, 4).is_degenerate());
        assert!(Edge::new(3, 3, 4, 4).is_manhattan());
        assert!(!Edge::new(0, 5, 0, 5).is_manhattan());
    }

    #[test]
    fn test_edge_serializes_as_array() {
        let json = serde_json::to_string(&Edge::new(1, 2, 3, 4)).unwrap();
        assert_eq!(json, "[1,2,3,4]");
        let back: Edge = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Edge::new(1, 2, 3, 4));
    }

    #[test]
    fn test_bbox_extent_and_containment() {
        let bbox = BBox::new(0, 100, -10, 10);
        assert_eq!(bbox.width(), 100);
        assert_eq!(bbox.height(), 20);
        assert!(!bbox.is_empty());
        assert!(BBox::new(5, 5, 0, 10).is_empty());
        assert!(BBox::new(0, 10, 10, 0).is_empty());

        assert!(bbox.contains_edge(&Edge::new(0, 0, -10, 10)));
        assert!(bbox.contains_edge(&Edge::new(100, 100, 10, -10)));
        assert!(!bbox.contains_edge(&Edge::new(101, 101, 0, 5)));
    }

    #[test]
    fn test_row_intervals() {
        let row = Row::from_intervals(7, &[Interval::new(0, 4), Interval::new(9, 12)]);
        assert_eq!(row.xs, vec![0, 4, 9, 12]);
        let back: Vec<Interval> = row.intervals().collect();
        assert_eq!(back, vec![Interval::new(0, 4), Interval::new(9, 12)]);
    }

    #[test]
    fn test_interval_gap_and_overlap() {
        let a = Interval::new(0, 10);
        let b = Interval::new(13, 20);
        assert_eq!(a.width(), 10);
        assert_eq!(a.gap_to(&b), 3);
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&Interval::new(9, 11)));
        assert!(!a.overlaps(&Interval::new(10, 11)));
    }
}
