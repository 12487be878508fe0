//! JSON layout files for the `clean_layout` command
//!
//! A layout file lists layers with their rules and geometry:
//!
//! ```json
//! {"layers": [{"layer": 1, "datatype": 0, "min_width": 5, "min_space": 5,
//!              "polygons": [[[0,0],[0,10],[40,10],[40,0]]]}]}
//! ```
//!
//! Polygons are normalised to clockwise hulls. Raw `edges` may be given
//! instead of (or in addition to) polygons. Without an explicit `bbox` the
//! box enclosing all geometry is used.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::clean::{CleanAxes, CleanStats};
use crate::engine::{JobId, JobPayload, JobSpec, OutputFormat};
use crate::geometry::{BBox, Edge, Point, Polygon};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LayoutFile {
    pub layers: Vec<LayoutLayer>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LayoutLayer {
    pub layer: u32,
    pub datatype: u32,
    pub min_width: i32,
    pub min_space: i32,
    #[serde(default)]
    pub polygons: Vec<Polygon>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub bbox: Option<BBox>,
    #[serde(default)]
    pub apply_correction: Option<bool>,
    #[serde(default)]
    pub axes: CleanAxes,
}

impl LayoutLayer {
    pub fn id(&self) -> JobId {
        JobId::new(self.layer, self.datatype)
    }

    /// Explicit box, or the box enclosing every polygon vertex and edge endpoint
    pub fn bbox(&self) -> Option<BBox> {
        if let Some(bbox) = self.bbox {
            return Some(bbox);
        }
        let edge_points: Vec<Point> = self
            .edges
            .iter()
            .flat_map(|e| [Point::new(e.x1, e.y1), Point::new(e.x2, e.y2)])
            .collect();
        self.polygons
            .iter()
            .filter_map(Polygon::bbox)
            .chain(BBox::enclosing(&edge_points))
            .reduce(|a, b| a.union(&b))
    }

    pub fn to_job(&self, output: OutputFormat) -> JobSpec {
        let bbox = self.bbox().unwrap_or(BBox::new(0, 0, 0, 0));
        let hulls: Vec<Polygon> = self.polygons.iter().cloned().map(Polygon::into_clockwise).collect();
        JobSpec::new(self.id(), bbox, self.min_width, self.min_space)
            .with_edges(self.edges.clone())
            .with_polygons(&hulls)
            .with_correction(self.apply_correction)
            .with_axes(self.axes)
            .with_output(output)
    }
}

/// Jobs to run and the layers left out
#[derive(Debug)]
pub struct JobPlan {
    pub jobs: Vec<JobSpec>,
    /// Too small to clean
    pub skipped: Vec<JobId>,
    /// Repeated `(layer, datatype)` entries; only the first one is planned
    pub duplicates: Vec<JobId>,
}

pub fn load_layout(path: impl AsRef<Path>) -> Result<LayoutFile> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse layout {}", path.display()))
}

pub fn plan_jobs(layout: &LayoutFile, output: OutputFormat) -> JobPlan {
    let mut plan = JobPlan { jobs: Vec::new(), skipped: Vec::new(), duplicates: Vec::new() };
    let mut seen = HashSet::new();
    for layer in &layout.layers {
        if !seen.insert(layer.id()) {
            plan.duplicates.push(layer.id());
            continue;
        }
        let job = layer.to_job(output);
        if job.should_skip() {
            plan.skipped.push(job.id);
        } else {
            plan.jobs.push(job);
        }
    }
    plan
}

/// One layer of the cleaned output file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanedLayer {
    pub layer: u32,
    pub datatype: u32,
    #[serde(flatten)]
    pub payload: JobPayload,
    pub stats: CleanStats,
}

pub fn write_cleaned(path: impl AsRef<Path>, layers: &[CleanedLayer]) -> Result<()> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(&serde_json::json!({ "layers": layers }))?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> LayoutFile {
        serde_json::from_str(
            r#"{"layers": [
                {"layer": 1, "datatype": 0, "min_width": 5, "min_space": 5,
                 "polygons": [[[0,0],[40,0],[40,10],[0,10]]]},
                {"layer": 2, "datatype": 0, "min_width": 50, "min_space": 5,
                 "polygons": [[[0,0],[0,10],[40,10],[40,0]]]},
                {"layer": 3, "datatype": 1, "min_width": 2, "min_space": 2,
                 "edges": [[0,0,0,6],[8,8,6,0]], "axes": "both"}
            ]}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_bbox_from_geometry() {
        let layout = layout();
        assert_eq!(layout.layers[0].bbox(), Some(BBox::new(0, 40, 0, 10)));
        assert_eq!(layout.layers[2].bbox(), Some(BBox::new(0, 8, 0, 6)));
    }

    #[test]
    fn test_plan_skips_layers_below_min_width() {
        let plan = plan_jobs(&layout(), OutputFormat::Rows);
        assert_eq!(plan.skipped, vec![JobId::new(2, 0)]);
        assert_eq!(plan.jobs.len(), 2);
        assert_eq!(plan.jobs[1].rules.axes, CleanAxes::Both);
    }

    #[test]
    fn test_counter_clockwise_polygons_are_normalised() {
        let job = layout().layers[0].to_job(OutputFormat::Rows);
        // Left side of the hull must run upward
        assert!(job.edges.contains(&Edge::new(0, 0, 0, 10)));
    }

    #[test]
    fn test_plan_reports_repeated_layers() {
        let mut layout = layout();
        let mut repeat = layout.layers[0].clone();
        repeat.min_width = 3;
        layout.layers.push(repeat);
        // Repeats of a skipped layer are reported too
        layout.layers.push(layout.layers[1].clone());

        let plan = plan_jobs(&layout, OutputFormat::Rows);
        assert_eq!(plan.duplicates, vec![JobId::new(1, 0), JobId::new(2, 0)]);
        assert_eq!(plan.skipped, vec![JobId::new(2, 0)]);
        assert_eq!(plan.jobs.len(), 2);
        assert_eq!(plan.jobs[0].rules.min_width, 5);
    }
}
