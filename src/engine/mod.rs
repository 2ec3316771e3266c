// Copyright Catenary Transit Initiatives
// Geometry engine seam consumed by the border topology pipeline

pub mod planar;

use crate::models::BoundaryLayer;
use geo_types::{LineString, MultiPolygon, Point};
use thiserror::Error;

pub use planar::PlanarEngine;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("geometry operation '{op}' failed: {detail}")]
    Operation { op: &'static str, detail: String },
}

impl EngineError {
    pub fn operation(op: &'static str, detail: impl Into<String>) -> Self {
        EngineError::Operation {
            op,
            detail: detail.into(),
        }
    }
}

/// End-cap style of a line buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapStyle {
    Round,
    Flat,
}

/// One dissolved boundary: all perimeter lines sharing a boundary id.
#[derive(Debug, Clone)]
pub struct DissolvedBoundary {
    pub boundary_id: String,
    pub lines: Vec<LineString<f64>>,
}

/// Output of the side-attributing overlay: a sub-span of the input line with
/// the ids of the polygons immediately to its left and right, `None` where no
/// polygon is adjacent on that side.
#[derive(Debug, Clone)]
pub struct SidedSpan {
    pub line: LineString<f64>,
    pub left: Option<String>,
    pub right: Option<String>,
}

/// A feature located along one of a set of target lines by linear
/// referencing: index of the matched line plus the measures of the feature's
/// first and last points along it. `from_measure` exceeds `to_measure` when
/// the feature runs against the target's direction.
#[derive(Debug, Clone, Copy)]
pub struct LocatedSpan {
    pub target_index: usize,
    pub from_measure: f64,
    pub to_measure: f64,
}

/// Low-level vector geometry collaborator. The pipeline is written entirely
/// against this trait; `PlanarEngine` is the bundled implementation for
/// projected coordinate systems.
pub trait GeometryEngine: Send + Sync {
    /// Converts boundary polygons to perimeter lines and merges them per
    /// boundary id.
    fn dissolve_boundaries(&self, layer: &BoundaryLayer)
    -> Result<Vec<DissolvedBoundary>, EngineError>;

    /// Buffers a set of lines by `distance`. Overlapping per-line buffers are
    /// merged into one polygon set.
    fn buffer_lines(
        &self,
        lines: &[LineString<f64>],
        distance: f64,
        cap: CapStyle,
    ) -> Result<MultiPolygon<f64>, EngineError>;

    /// Clips `lines` to `window` and explodes the result into single-part
    /// contiguous runs.
    fn clip_lines(
        &self,
        lines: &[LineString<f64>],
        window: &MultiPolygon<f64>,
    ) -> Result<Vec<LineString<f64>>, EngineError>;

    /// Points where `line` crosses the rim of `zone`.
    fn intersection_points(
        &self,
        line: &LineString<f64>,
        zone: &MultiPolygon<f64>,
    ) -> Result<Vec<Point<f64>>, EngineError>;

    /// Splits `line` at every point of `points` lying within `tolerance` of
    /// it. Points farther away than the tolerance are ignored.
    fn split_at_points(
        &self,
        line: &LineString<f64>,
        points: &[Point<f64>],
        tolerance: f64,
    ) -> Result<Vec<LineString<f64>>, EngineError>;

    /// Whether `line` lies inside `zone` (endpoints on the rim allowed).
    fn line_within(&self, line: &LineString<f64>, zone: &MultiPolygon<f64>) -> bool;

    /// Side-attributing overlay of `lines` against the polygons of `layer`.
    /// Each input line yields the sub-spans obtained by cutting it at polygon
    /// rims, each span probed for its left/right polygon at `probe_offset`
    /// perpendicular distance.
    fn overlay_with_sides(
        &self,
        lines: &[LineString<f64>],
        layer: &BoundaryLayer,
        probe_offset: f64,
    ) -> Result<Vec<Vec<SidedSpan>>, EngineError>;

    /// Locates `feature` along the nearest of `targets` by linear
    /// referencing, if any target is within `tolerance`.
    fn locate_along(
        &self,
        feature: &LineString<f64>,
        targets: &[LineString<f64>],
        tolerance: f64,
    ) -> Result<Option<LocatedSpan>, EngineError>;

    /// Drops lines that duplicate an earlier line's shape (same vertices,
    /// either direction, within `tolerance`).
    fn dedup_by_shape(
        &self,
        lines: Vec<LineString<f64>>,
        tolerance: f64,
    ) -> Vec<LineString<f64>>;
}
