//! Rectilinear polygons as ordered vertex lists
//!
//! Output polygons are clockwise (y pointing up), the same orientation the
//! host uses for hulls, so `edges()` feeds straight back into a cleaner.

use serde::{Deserialize, Serialize};

use super::types::{BBox, Edge, Point};

/// A closed polygon hull; the last vertex connects back to the first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Polygon {
    pub points: Vec<Point>,
}

impl Polygon {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Clockwise rectangle `[x1, x2) x [y1, y2)`
    pub fn rect(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self::new(vec![
            Point::new(x1, y1),
            Point::new(x1, y2),
            Point::new(x2, y2),
            Point::new(x2, y1),
        ])
    }

    /// Twice the signed area (shoelace); negative for clockwise hulls
    pub fn signed_area2(&self) -> i64 {
        let n = self.points.len();
        (0..n)
            .map(|i| {
                let a = self.points[i];
                let b = self.points[(i + 1) % n];
                i64::from(a.x) * i64::from(b.y) - i64::from(b.x) * i64::from(a.y)
            })
            .sum()
    }

    pub fn is_clockwise(&self) -> bool {
        self.signed_area2() < 0
    }

    /// Same polygon with clockwise orientation
    pub fn into_clockwise(mut self) -> Self {
        if self.signed_area2() > 0 {
            self.points.reverse();
        }
        self
    }

    /// Every consecutive vertex pair is axis-parallel
    pub fn is_manhattan(&self) -> bool {
        self.edges().all(|e| e.is_manhattan())
    }

    pub fn bbox(&self) -> Option<BBox> {
        BBox::enclosing(&self.points)
    }

    /// Boundary edges in vertex order, including the closing edge
    pub fn edges(&self) -> impl Iterator<Item = Edge> + '_ {
        let n = self.points.len();
        (0..n).map(move |i| {
            let a = self.points[i];
            let b = self.points[(i + 1) % n];
            Edge::new(a.x, b.x, a.y, b.y)
        })
    }
}
