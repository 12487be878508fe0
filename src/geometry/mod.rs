//! Geometry module for scanline layout cleaning
//!
//! Integer-grid primitives shared by the cleaner, the dispatcher and the
//! process protocol.
//!
//! # Submodules
//! - `types` - Edges, bounding boxes, intervals, rows and points
//! - `polygon` - Rectilinear polygon hulls and their boundary edges
//! - `packed` - Base64 packing of row data for compact transfer

mod types;
mod polygon;
mod packed;

pub use types::{BBox, Edge, Interval, Point, Row};

pub use polygon::Polygon;

pub use packed::{pack_rows, unpack_rows, PackedRows};
