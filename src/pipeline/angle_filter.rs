// Angle classification: keep candidates that run along the boundary, drop
// candidates that merely cross it at a high angle.

use crate::bearing::{intersecting_angle, line_bearing};
use crate::engine::{CapStyle, GeometryEngine};
use crate::error::ResolveError;
use crate::models::ResolverParams;
use crate::observer::ProgressObserver;
use crate::pipeline::CandidateSegment;
use geo_types::LineString;

/// Classifies every candidate against the bearings of its co-located
/// boundary probe edges and returns the positive ones.
///
/// Probe edges are the pieces of the dissolved boundary falling inside a
/// flat-cap buffer of the candidate (width `buffer_size`). A candidate is
/// positive as soon as any probe edge intersects it at no more than
/// `angle_threshold` degrees; a candidate with no defined bearing (zero
/// length) is excluded from classification and reported as such.
pub fn keep_low_angle_candidates<E: GeometryEngine + ?Sized>(
    candidates: Vec<CandidateSegment>,
    boundary_lines: &[LineString<f64>],
    engine: &E,
    params: &ResolverParams,
    observer: &dyn ProgressObserver,
) -> Result<Vec<CandidateSegment>, ResolveError> {
    let mut positives = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        let Some(angle_route) = line_bearing(&candidate.line) else {
            observer.warn(&format!(
                "excluded from classification: candidate segment {} has zero length",
                candidate.segment_id
            ));
            continue;
        };

        let probe_window =
            engine.buffer_lines(std::slice::from_ref(&candidate.line), params.buffer_size, CapStyle::Flat)?;
        let probe_edges = engine.clip_lines(boundary_lines, &probe_window)?;

        let is_positive = probe_edges.iter().any(|probe| {
            line_bearing(probe).is_some_and(|angle_boundary| {
                intersecting_angle(angle_route, angle_boundary) <= params.angle_threshold
            })
        });

        if is_positive {
            positives.push(candidate);
        }
    }

    Ok(positives)
}
