// Candidate selection: restrict the route network to pieces near the
// boundary. Purely geometric; no angle filtering happens here.

use crate::engine::{CapStyle, GeometryEngine};
use crate::error::ResolveError;
use crate::models::{ResolverParams, RouteNetwork};
use crate::pipeline::CandidateSegment;
use geo_types::LineString;

/// Buffers the dissolved boundary lines by `buffer_size` (round caps), clips
/// the route network to the window and explodes the result into single-part
/// candidate segments with per-run ids.
///
/// A boundary with no nearby route yields an empty set, not an error.
pub fn select_candidates<E: GeometryEngine + ?Sized>(
    route: &RouteNetwork,
    boundary_lines: &[LineString<f64>],
    engine: &E,
    params: &ResolverParams,
) -> Result<Vec<CandidateSegment>, ResolveError> {
    let window = engine.buffer_lines(boundary_lines, params.buffer_size, CapStyle::Round)?;

    let mut candidates = Vec::new();
    let mut next_id: u32 = 1;
    for (route_index, route_line) in route.lines.iter().enumerate() {
        let pieces = engine.clip_lines(std::slice::from_ref(&route_line.line), &window)?;
        for mut line in pieces {
            // keep every piece pointing in the direction of increasing route
            // measure, so later left/right attribution reads the right way
            if let Some(span) = engine.locate_along(
                &line,
                std::slice::from_ref(&route_line.line),
                params.buffer_size,
            )? && span.from_measure > span.to_measure
            {
                line.0.reverse();
            }
            candidates.push(CandidateSegment {
                segment_id: next_id,
                route_index,
                line,
            });
            next_id += 1;
        }
    }
    Ok(candidates)
}
