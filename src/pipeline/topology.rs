// Left/right topology resolution for positive candidate pieces.
//
// Outside the offset zone the side-attributing overlay against the raw
// boundary polygons is trusted directly. Within the zone (near boundary
// vertices) it is not: sidedness is resolved on boundary fragments instead
// and transferred back onto the route pieces by linear referencing.

use crate::engine::{CapStyle, GeometryEngine};
use crate::error::ResolveError;
use crate::models::{BoundaryLayer, ResolverParams};
use crate::pipeline::offset_zone::OffsetPartition;
use ahash::AHashMap;
use geo_types::{LineString, Point};
use itertools::Itertools;

/// A route piece with resolved left/right boundary ids, read in the
/// direction of increasing route measure. One piece per (route piece,
/// sided pair): when an overlay returns the same pair on disjoint spans of
/// one piece they stay together as the parts of a single multi-part piece.
#[derive(Debug, Clone)]
pub struct AttributedPiece {
    pub route_index: usize,
    pub parts: Vec<LineString<f64>>,
    pub left_boundary_id: String,
    pub right_boundary_id: String,
}

/// Resolves both partition branches and merges them. The offset-zone split
/// guarantees no piece appears in both branches.
pub fn resolve_sides<E: GeometryEngine + ?Sized>(
    partition: &OffsetPartition,
    layer: &BoundaryLayer,
    boundary_lines: &[LineString<f64>],
    engine: &E,
    params: &ResolverParams,
) -> Result<Vec<AttributedPiece>, ResolveError> {
    let mut attributed = resolve_outside(partition, layer, engine, params)?;
    attributed.extend(resolve_within(partition, layer, boundary_lines, engine, params)?);
    Ok(attributed)
}

/// Outside-zone branch: overlay route pieces directly against the boundary
/// polygons and keep spans with a polygon on both sides.
fn resolve_outside<E: GeometryEngine + ?Sized>(
    partition: &OffsetPartition,
    layer: &BoundaryLayer,
    engine: &E,
    params: &ResolverParams,
) -> Result<Vec<AttributedPiece>, ResolveError> {
    let lines: Vec<LineString<f64>> = partition.outside.iter().map(|c| c.line.clone()).collect();
    let overlaid = engine.overlay_with_sides(&lines, layer, params.xy_resolution)?;

    let mut attributed = Vec::new();
    for (candidate, spans) in partition.outside.iter().zip(overlaid) {
        let mut grouped: Vec<((String, String), Vec<LineString<f64>>)> = Vec::new();
        for span in spans {
            if let (Some(left), Some(right)) = (span.left, span.right) {
                match grouped
                    .iter()
                    .position(|((l, r), _)| *l == left && *r == right)
                {
                    Some(idx) => grouped[idx].1.push(span.line),
                    None => grouped.push(((left, right), vec![span.line])),
                }
            }
        }
        for ((left, right), parts) in grouped {
            attributed.push(AttributedPiece {
                route_index: candidate.route_index,
                parts,
                left_boundary_id: left,
                right_boundary_id: right,
            });
        }
    }
    Ok(attributed)
}

/// Within-zone branch: fragment the dissolved boundary inside a flat-cap
/// buffer of the within pieces, side-attribute the fragments, then locate
/// each fragment along its nearest route piece to transfer the attribution.
fn resolve_within<E: GeometryEngine + ?Sized>(
    partition: &OffsetPartition,
    layer: &BoundaryLayer,
    boundary_lines: &[LineString<f64>],
    engine: &E,
    params: &ResolverParams,
) -> Result<Vec<AttributedPiece>, ResolveError> {
    if partition.within.is_empty() {
        return Ok(vec![]);
    }

    let within_lines: Vec<LineString<f64>> =
        partition.within.iter().map(|c| c.line.clone()).collect();

    let window = engine.buffer_lines(&within_lines, params.offset, CapStyle::Flat)?;
    let boundary_pieces = engine.clip_lines(boundary_lines, &window)?;

    // endpoints of the clipped boundary pieces, identical locations merged
    let quantum = params.xy_resolution.max(f64::EPSILON);
    let endpoints: Vec<Point<f64>> = boundary_pieces
        .iter()
        .flat_map(|piece| [piece.0.first(), piece.0.last()])
        .flatten()
        .map(|c| Point(*c))
        .unique_by(|p| {
            (
                (p.x() / quantum).round() as i64,
                (p.y() / quantum).round() as i64,
            )
        })
        .collect();

    // fragment every boundary piece at those endpoints, then drop exact
    // duplicate shapes left over from overlapping piece buffers
    let mut fragments = Vec::new();
    for piece in &boundary_pieces {
        fragments.extend(engine.split_at_points(piece, &endpoints, params.xy_resolution)?);
    }
    let fragments = engine.dedup_by_shape(fragments, params.xy_resolution);

    let overlaid = engine.overlay_with_sides(&fragments, layer, params.xy_resolution)?;

    // first fragment to land on a route piece wins
    let mut attribution: AHashMap<usize, (String, String)> = AHashMap::new();
    for (fragment, spans) in fragments.iter().zip(overlaid) {
        let Some((left, right)) = spans.into_iter().find_map(|span| match (span.left, span.right) {
            (Some(left), Some(right)) => Some((left, right)),
            _ => None,
        }) else {
            continue;
        };

        let Some(located) = engine.locate_along(fragment, &within_lines, params.offset)? else {
            continue;
        };

        // the fragment's sides are read along its own direction; flip them
        // when it runs against the route piece
        let (left, right) = if runs_opposed(fragment, &within_lines[located.target_index]) {
            (right, left)
        } else {
            (left, right)
        };
        attribution.entry(located.target_index).or_insert((left, right));
    }

    let mut attributed = Vec::new();
    for (index, candidate) in partition.within.iter().enumerate() {
        if let Some((left, right)) = attribution.get(&index) {
            attributed.push(AttributedPiece {
                route_index: candidate.route_index,
                parts: vec![candidate.line.clone()],
                left_boundary_id: left.clone(),
                right_boundary_id: right.clone(),
            });
        }
    }
    Ok(attributed)
}

/// Whether two near-parallel lines run in opposite end-to-end directions.
fn runs_opposed(a: &LineString<f64>, b: &LineString<f64>) -> bool {
    let (Some(a0), Some(a1)) = (a.0.first(), a.0.last()) else {
        return false;
    };
    let (Some(b0), Some(b1)) = (b.0.first(), b.0.last()) else {
        return false;
    };
    let dot = (a1.x - a0.x) * (b1.x - b0.x) + (a1.y - a0.y) * (b1.y - b0.y);
    dot < 0.0
}
