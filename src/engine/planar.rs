// Copyright Catenary Transit Initiatives
// Planar geometry engine for projected coordinate systems

use crate::engine::{
    CapStyle, DissolvedBoundary, EngineError, GeometryEngine, LocatedSpan, SidedSpan,
};
use crate::models::BoundaryLayer;
use ahash::{AHashMap, AHashSet};
use geo::algorithm::line_intersection::{LineIntersection, line_intersection};
use geo::{BooleanOps, Contains};
use geo_types::{Coord, LineString, MultiLineString, MultiPolygon, Point, Polygon, coord};
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{AABB, RTree};

/// Planar engine. Coordinates are (x, y) in a projected reference system;
/// all distances are Euclidean in its linear unit.
#[derive(Debug, Clone, Copy)]
pub struct PlanarEngine {
    /// Vertex count of the polygons approximating buffer cap circles.
    pub circle_segments: usize,
}

impl Default for PlanarEngine {
    fn default() -> Self {
        Self {
            circle_segments: 24,
        }
    }
}

// --- Planar helpers (x, y space) ---

fn segment_length(a: Coord<f64>, b: Coord<f64>) -> f64 {
    ((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt()
}

pub(crate) fn polyline_length(line: &LineString<f64>) -> f64 {
    line.0.windows(2).map(|w| segment_length(w[0], w[1])).sum()
}

/// Projects `point` onto `line`.
/// Returns (distance_along_line, distance_from_line, projected_point).
pub(crate) fn project_point(
    point: Coord<f64>,
    line: &LineString<f64>,
) -> Option<(f64, f64, Coord<f64>)> {
    if line.0.len() < 2 {
        let first = *line.0.first()?;
        return Some((0.0, segment_length(point, first), first));
    }

    let mut best: Option<(f64, f64, Coord<f64>)> = None;
    let mut cumulative = 0.0;

    for w in line.0.windows(2) {
        let (a, b) = (w[0], w[1]);
        let seg_len = segment_length(a, b);

        let t = if seg_len > 0.0 {
            let dot = (point.x - a.x) * (b.x - a.x) + (point.y - a.y) * (b.y - a.y);
            (dot / (seg_len * seg_len)).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let proj = coord! {
            x: a.x + (b.x - a.x) * t,
            y: a.y + (b.y - a.y) * t,
        };
        let dist = segment_length(point, proj);

        if best.is_none_or(|(_, d, _)| dist < d) {
            best = Some((cumulative + seg_len * t, dist, proj));
        }
        cumulative += seg_len;
    }

    best
}

/// Extracts the sub-polyline between two distances along `line`, keeping the
/// interior vertices that fall strictly inside the range.
pub(crate) fn substring_by_distance(line: &LineString<f64>, d0: f64, d1: f64) -> LineString<f64> {
    let total = polyline_length(line);
    let start = d0.clamp(0.0, total);
    let end = d1.clamp(0.0, total);

    let mut coords = vec![interpolate_at_distance(line, start)];
    let mut cumulative = 0.0;
    for w in line.0.windows(2) {
        let next = cumulative + segment_length(w[0], w[1]);
        if next > start + 1e-9 && next < end - 1e-9 {
            coords.push(w[1]);
        }
        cumulative = next;
    }
    coords.push(interpolate_at_distance(line, end));
    LineString(coords)
}

pub(crate) fn interpolate_at_distance(line: &LineString<f64>, distance: f64) -> Coord<f64> {
    let mut remaining = distance.max(0.0);
    for w in line.0.windows(2) {
        let seg_len = segment_length(w[0], w[1]);
        if remaining <= seg_len {
            if seg_len == 0.0 {
                return w[0];
            }
            let t = remaining / seg_len;
            return coord! {
                x: w[0].x + (w[1].x - w[0].x) * t,
                y: w[0].y + (w[1].y - w[0].y) * t,
            };
        }
        remaining -= seg_len;
    }
    *line.0.last().unwrap_or(&coord! { x: 0.0, y: 0.0 })
}

fn midpoint_of(line: &LineString<f64>) -> Coord<f64> {
    interpolate_at_distance(line, polyline_length(line) / 2.0)
}

/// Direction (unit vector) of the segment containing the given distance.
fn direction_at_distance(line: &LineString<f64>, distance: f64) -> Option<(f64, f64)> {
    let mut remaining = distance.max(0.0);
    let mut last_dir = None;
    for w in line.0.windows(2) {
        let seg_len = segment_length(w[0], w[1]);
        if seg_len > 0.0 {
            let dir = ((w[1].x - w[0].x) / seg_len, (w[1].y - w[0].y) / seg_len);
            last_dir = Some(dir);
            if remaining <= seg_len {
                return Some(dir);
            }
        }
        remaining -= seg_len;
    }
    last_dir
}

const QUANTIZE_EPS: f64 = 1e-9;

fn quantize(c: Coord<f64>, tolerance: f64) -> (i64, i64) {
    let step = tolerance.max(QUANTIZE_EPS);
    ((c.x / step).round() as i64, (c.y / step).round() as i64)
}

fn circle_polygon(center: Coord<f64>, radius: f64, segments: usize) -> Polygon<f64> {
    let mut ring = Vec::with_capacity(segments + 1);
    for i in 0..segments {
        let theta = std::f64::consts::TAU * (i as f64) / (segments as f64);
        ring.push(coord! {
            x: center.x + radius * theta.cos(),
            y: center.y + radius * theta.sin(),
        });
    }
    ring.push(ring[0]);
    Polygon::new(LineString(ring), vec![])
}

fn segment_rectangle(a: Coord<f64>, b: Coord<f64>, half_width: f64) -> Option<Polygon<f64>> {
    let len = segment_length(a, b);
    if len == 0.0 {
        return None;
    }
    let nx = -(b.y - a.y) / len * half_width;
    let ny = (b.x - a.x) / len * half_width;
    let ring = vec![
        coord! { x: a.x + nx, y: a.y + ny },
        coord! { x: b.x + nx, y: b.y + ny },
        coord! { x: b.x - nx, y: b.y - ny },
        coord! { x: a.x - nx, y: a.y - ny },
        coord! { x: a.x + nx, y: a.y + ny },
    ];
    Some(Polygon::new(LineString(ring), vec![]))
}

fn union_all(polygons: Vec<Polygon<f64>>) -> MultiPolygon<f64> {
    let mut merged = MultiPolygon::<f64>(vec![]);
    for polygon in polygons {
        let single = MultiPolygon(vec![polygon]);
        if merged.0.is_empty() {
            merged = single;
        } else {
            merged = merged.union(&single);
        }
    }
    merged
}

/// Merges single-part pieces that continue each other (shared endpoint where
/// exactly two pieces meet) into one contiguous run each.
pub(crate) fn stitch_contiguous(pieces: Vec<LineString<f64>>) -> Vec<LineString<f64>> {
    let mut pieces: Vec<LineString<f64>> = pieces
        .into_iter()
        .filter(|p| p.0.len() >= 2 && polyline_length(p) > 0.0)
        .collect();

    loop {
        let mut endpoints: AHashMap<(i64, i64), Vec<(usize, bool)>> = AHashMap::new();
        for (idx, piece) in pieces.iter().enumerate() {
            let first = quantize(piece.0[0], QUANTIZE_EPS);
            let last = quantize(*piece.0.last().unwrap(), QUANTIZE_EPS);
            if first == last {
                // closed ring, nothing to continue
                continue;
            }
            endpoints.entry(first).or_default().push((idx, true));
            endpoints.entry(last).or_default().push((idx, false));
        }

        let Some((&_, ends)) = endpoints
            .iter()
            .find(|(_, ends)| ends.len() == 2 && ends[0].0 != ends[1].0)
        else {
            return pieces;
        };

        let ((i, i_at_start), (j, j_at_start)) = (ends[0], ends[1]);
        let mut left = pieces[i].0.clone();
        let mut right = pieces[j].0.clone();

        // orient: left must end, right must begin, at the shared point
        if i_at_start {
            left.reverse();
        }
        if !j_at_start {
            right.reverse();
        }
        left.extend(right.drain(1..));

        let (hi, lo) = if i > j { (i, j) } else { (j, i) };
        pieces.swap_remove(hi);
        pieces.swap_remove(lo);
        pieces.push(LineString(left));
    }
}

fn polygon_rings(polygon: &Polygon<f64>) -> impl Iterator<Item = &LineString<f64>> {
    std::iter::once(polygon.exterior()).chain(polygon.interiors().iter())
}

impl PlanarEngine {
    fn rim_crossings<'a>(
        &self,
        line: &LineString<f64>,
        rings: impl Iterator<Item = &'a LineString<f64>>,
    ) -> Vec<Point<f64>> {
        let mut found: Vec<Point<f64>> = Vec::new();
        let mut seen: AHashSet<(i64, i64)> = AHashSet::new();
        let mut push = |c: Coord<f64>| {
            if seen.insert(quantize(c, QUANTIZE_EPS)) {
                found.push(Point(c));
            }
        };

        for ring in rings {
            for seg_a in line.lines() {
                for seg_b in ring.lines() {
                    match line_intersection(seg_a, seg_b) {
                        Some(LineIntersection::SinglePoint { intersection, .. }) => {
                            push(intersection);
                        }
                        Some(LineIntersection::Collinear { intersection }) => {
                            push(intersection.start);
                            push(intersection.end);
                        }
                        None => {}
                    }
                }
            }
        }
        found
    }
}

impl GeometryEngine for PlanarEngine {
    fn dissolve_boundaries(
        &self,
        layer: &BoundaryLayer,
    ) -> Result<Vec<DissolvedBoundary>, EngineError> {
        let mut by_id: AHashMap<&str, Vec<LineString<f64>>> = AHashMap::new();
        let mut order: Vec<&str> = Vec::new();

        for boundary in &layer.polygons {
            let entry = by_id.entry(boundary.boundary_id.as_str()).or_default();
            if entry.is_empty() {
                order.push(boundary.boundary_id.as_str());
            }
            for ring in polygon_rings(&boundary.polygon) {
                if ring.0.len() >= 2 {
                    entry.push(ring.clone());
                }
            }
        }

        Ok(order
            .into_iter()
            .map(|id| DissolvedBoundary {
                boundary_id: id.to_string(),
                lines: by_id.remove(id).unwrap_or_default(),
            })
            .collect())
    }

    fn buffer_lines(
        &self,
        lines: &[LineString<f64>],
        distance: f64,
        cap: CapStyle,
    ) -> Result<MultiPolygon<f64>, EngineError> {
        if !(distance > 0.0) || !distance.is_finite() {
            return Err(EngineError::operation(
                "buffer",
                format!("non-positive buffer distance {distance}"),
            ));
        }

        let mut parts: Vec<Polygon<f64>> = Vec::new();
        for line in lines {
            for w in line.0.windows(2) {
                if let Some(rect) = segment_rectangle(w[0], w[1], distance) {
                    parts.push(rect);
                }
            }
            let n = line.0.len();
            for (idx, vertex) in line.0.iter().enumerate() {
                let is_end = idx == 0 || idx == n - 1;
                let rounded = match cap {
                    CapStyle::Round => true,
                    // flat caps still need joint fill at interior vertices
                    CapStyle::Flat => !is_end,
                };
                if rounded {
                    parts.push(circle_polygon(*vertex, distance, self.circle_segments));
                }
            }
        }

        Ok(union_all(parts))
    }

    fn clip_lines(
        &self,
        lines: &[LineString<f64>],
        window: &MultiPolygon<f64>,
    ) -> Result<Vec<LineString<f64>>, EngineError> {
        if window.0.is_empty() {
            return Ok(vec![]);
        }
        let source = MultiLineString(
            lines
                .iter()
                .filter(|l| l.0.len() >= 2)
                .cloned()
                .collect::<Vec<_>>(),
        );
        let clipped = window.clip(&source, false);
        // adjacent boundaries share their border line; drop the second copy
        // before stitching so overlaps cannot fuse into zero-length loops
        let deduped = self.dedup_by_shape(clipped.0, QUANTIZE_EPS);
        Ok(stitch_contiguous(deduped))
    }

    fn intersection_points(
        &self,
        line: &LineString<f64>,
        zone: &MultiPolygon<f64>,
    ) -> Result<Vec<Point<f64>>, EngineError> {
        Ok(self.rim_crossings(line, zone.0.iter().flat_map(polygon_rings)))
    }

    fn split_at_points(
        &self,
        line: &LineString<f64>,
        points: &[Point<f64>],
        tolerance: f64,
    ) -> Result<Vec<LineString<f64>>, EngineError> {
        let total = polyline_length(line);
        if total == 0.0 {
            return Err(EngineError::operation("split", "zero-length line"));
        }

        let tol = tolerance.max(QUANTIZE_EPS);
        let mut cuts: Vec<f64> = vec![0.0, total];
        for point in points {
            if let Some((along, dist, _)) = project_point(point.0, line) {
                if dist <= tol {
                    cuts.push(along);
                }
            }
        }
        cuts.sort_by(|a, b| a.total_cmp(b));
        cuts.dedup_by(|a, b| (*a - *b).abs() <= QUANTIZE_EPS);

        let mut pieces = Vec::with_capacity(cuts.len() - 1);
        for w in cuts.windows(2) {
            if w[1] - w[0] > QUANTIZE_EPS {
                pieces.push(substring_by_distance(line, w[0], w[1]));
            }
        }
        Ok(pieces)
    }

    fn line_within(&self, line: &LineString<f64>, zone: &MultiPolygon<f64>) -> bool {
        // pieces are pre-split at the zone rim, so the midpoint decides
        zone.contains(&Point(midpoint_of(line)))
    }

    fn overlay_with_sides(
        &self,
        lines: &[LineString<f64>],
        layer: &BoundaryLayer,
        probe_offset: f64,
    ) -> Result<Vec<Vec<SidedSpan>>, EngineError> {
        if !(probe_offset > 0.0) || !probe_offset.is_finite() {
            return Err(EngineError::operation(
                "overlay",
                format!("non-positive probe offset {probe_offset}"),
            ));
        }

        let tree: RTree<GeomWithData<Rectangle<[f64; 2]>, usize>> = RTree::bulk_load(
            layer
                .polygons
                .iter()
                .enumerate()
                .map(|(idx, boundary)| {
                    let mut min = [f64::INFINITY, f64::INFINITY];
                    let mut max = [f64::NEG_INFINITY, f64::NEG_INFINITY];
                    for c in &boundary.polygon.exterior().0 {
                        min[0] = min[0].min(c.x);
                        min[1] = min[1].min(c.y);
                        max[0] = max[0].max(c.x);
                        max[1] = max[1].max(c.y);
                    }
                    GeomWithData::new(Rectangle::from_corners(min, max), idx)
                })
                .collect(),
        );

        let polygon_at = |c: Coord<f64>| -> Option<&str> {
            let mut hits: Vec<usize> = tree
                .locate_in_envelope_intersecting(&AABB::from_point([c.x, c.y]))
                .map(|entry| entry.data)
                .collect();
            hits.sort_unstable();
            hits.into_iter()
                .find(|&idx| layer.polygons[idx].polygon.contains(&Point(c)))
                .map(|idx| layer.polygons[idx].boundary_id.as_str())
        };

        let mut results = Vec::with_capacity(lines.len());
        for line in lines {
            if polyline_length(line) == 0.0 {
                results.push(vec![]);
                continue;
            }
            let crossings =
                self.rim_crossings(line, layer.polygons.iter().flat_map(|b| polygon_rings(&b.polygon)));
            let spans = self.split_at_points(line, &crossings, probe_offset)?;

            let mut sided = Vec::with_capacity(spans.len());
            for span in spans {
                let half = polyline_length(&span) / 2.0;
                let mid = interpolate_at_distance(&span, half);
                let Some((dx, dy)) = direction_at_distance(&span, half) else {
                    continue;
                };
                // left normal of the direction of travel
                let (nx, ny) = (-dy, dx);
                let left_probe = coord! { x: mid.x + nx * probe_offset, y: mid.y + ny * probe_offset };
                let right_probe = coord! { x: mid.x - nx * probe_offset, y: mid.y - ny * probe_offset };

                sided.push(SidedSpan {
                    line: span,
                    left: polygon_at(left_probe).map(str::to_string),
                    right: polygon_at(right_probe).map(str::to_string),
                });
            }
            results.push(sided);
        }
        Ok(results)
    }

    fn locate_along(
        &self,
        feature: &LineString<f64>,
        targets: &[LineString<f64>],
        tolerance: f64,
    ) -> Result<Option<LocatedSpan>, EngineError> {
        let (Some(&first), Some(&last)) = (feature.0.first(), feature.0.last()) else {
            return Err(EngineError::operation("locate", "empty feature"));
        };
        let mid = midpoint_of(feature);

        let mut best: Option<(f64, LocatedSpan)> = None;
        for (idx, target) in targets.iter().enumerate() {
            let Some((_, mid_dist, _)) = project_point(mid, target) else {
                continue;
            };
            if mid_dist > tolerance {
                continue;
            }
            let Some((from, _, _)) = project_point(first, target) else {
                continue;
            };
            let Some((to, _, _)) = project_point(last, target) else {
                continue;
            };
            let span = LocatedSpan {
                target_index: idx,
                from_measure: from,
                to_measure: to,
            };
            if best.is_none_or(|(d, _)| mid_dist < d) {
                best = Some((mid_dist, span));
            }
        }
        Ok(best.map(|(_, span)| span))
    }

    fn dedup_by_shape(
        &self,
        lines: Vec<LineString<f64>>,
        tolerance: f64,
    ) -> Vec<LineString<f64>> {
        let mut seen: AHashSet<Vec<(i64, i64)>> = AHashSet::new();
        let mut kept = Vec::with_capacity(lines.len());

        for line in lines {
            let forward: Vec<(i64, i64)> =
                line.0.iter().map(|c| quantize(*c, tolerance)).collect();
            let mut reverse = forward.clone();
            reverse.reverse();
            let key = forward.min(reverse);
            if seen.insert(key) {
                kept.push(line);
            }
        }
        kept
    }
}
