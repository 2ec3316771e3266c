// Copyright Catenary Transit Initiatives
// Domain records for route / boundary border topology resolution

use chrono::NaiveDate;
use geo_types::{LineString, Polygon};
use serde::{Deserialize, Serialize};

/// One measured polyline of the route network. Measures are intrinsic
/// (distance along the line from its first vertex).
#[derive(Debug, Clone)]
pub struct RouteLine {
    pub route_id: String,
    pub line: LineString<f64>,
    /// Validity window carried from the source data, if any.
    pub effective_from: Option<NaiveDate>,
    pub effective_to: Option<NaiveDate>,
}

/// Immutable route network input. Read-only for the whole pipeline;
/// safe to share across parallel runs.
#[derive(Debug, Clone, Default)]
pub struct RouteNetwork {
    pub lines: Vec<RouteLine>,
}

impl RouteNetwork {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct BoundaryPolygon {
    pub boundary_id: String,
    pub polygon: Polygon<f64>,
}

/// One polygonal boundary layer (counties, cities, districts...).
/// Layers are processed independently, one run each.
#[derive(Debug, Clone)]
pub struct BoundaryLayer {
    pub name: String,
    pub polygons: Vec<BoundaryPolygon>,
}

impl BoundaryLayer {
    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }
}

/// Caller-supplied tuning of a resolution run. All distances are in the
/// units of the route's spatial reference.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResolverParams {
    /// Search window around the boundary for candidate selection, and width
    /// of the probe-edge buffer during angle classification.
    pub buffer_size: f64,
    /// Width of the ambiguity zone around boundary lines. Within it,
    /// left/right attribution goes through linear referencing.
    pub offset: f64,
    /// Maximum intersecting angle (degrees) for a candidate to count as
    /// running along the boundary rather than crossing it.
    pub angle_threshold: f64,
    /// Minimum distinguishable coordinate delta of the spatial reference.
    /// Used as split tolerance and as the side-probe offset.
    pub xy_resolution: f64,
}

/// Single vs multi-part descriptor of an output segment's shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeometryKind {
    #[serde(rename = "line")]
    Line,
    #[serde(rename = "multi-part line")]
    MultiLine,
}

impl GeometryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeometryKind::Line => "line",
            GeometryKind::MultiLine => "multi-part line",
        }
    }
}

/// One row of the border rule table: this stretch of `route_id`, from
/// `start_measure` to `end_measure`, borders `left_boundary_id` on the left
/// and `right_boundary_id` on the right (in the direction of increasing
/// measure). Retained rows always carry both ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyRecord {
    pub route_id: String,
    pub start_measure: f64,
    pub end_measure: f64,
    pub left_boundary_id: String,
    pub right_boundary_id: String,
    pub geometry_kind: GeometryKind,
    pub effective_from: Option<NaiveDate>,
    pub effective_to: Option<NaiveDate>,
}

/// The border rule table for one (route, boundary layer) run, grouped by
/// route and ordered by ascending start measure. Regenerated from scratch on
/// every run; a prior table of the same identity is dropped, never appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleTable {
    /// Name of the boundary layer this table was resolved against.
    pub layer: String,
    pub process_date: NaiveDate,
    pub records: Vec<TopologyRecord>,
}

impl RuleTable {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}
