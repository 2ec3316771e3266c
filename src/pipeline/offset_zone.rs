// Offset-zone segmentation: split positive candidates at the rim of the
// ambiguity zone around the boundary and partition them by side of the rim.

use crate::engine::GeometryEngine;
use crate::error::ResolveError;
use crate::models::ResolverParams;
use crate::pipeline::CandidateSegment;
use geo_types::MultiPolygon;

/// Positive candidates partitioned by the offset zone. The sets are disjoint
/// and together cover every positive candidate's full length.
#[derive(Debug, Clone, Default)]
pub struct OffsetPartition {
    pub within: Vec<CandidateSegment>,
    pub outside: Vec<CandidateSegment>,
}

/// Splits every positive candidate at its crossings of the offset-zone rim
/// (tolerance `xy_resolution`, so no piece straddles the rim) and sorts the
/// pieces into within-zone and outside-zone sets.
pub fn partition_by_zone<E: GeometryEngine + ?Sized>(
    positives: Vec<CandidateSegment>,
    offset_zone: &MultiPolygon<f64>,
    engine: &E,
    params: &ResolverParams,
) -> Result<OffsetPartition, ResolveError> {
    let mut next_id = positives
        .iter()
        .map(|c| c.segment_id)
        .max()
        .unwrap_or(0)
        + 1;

    let mut partition = OffsetPartition::default();
    for candidate in positives {
        let crossings = engine.intersection_points(&candidate.line, offset_zone)?;
        let pieces = engine.split_at_points(&candidate.line, &crossings, params.xy_resolution)?;
        let unsplit = pieces.len() == 1;

        for line in pieces {
            let segment_id = if unsplit {
                candidate.segment_id
            } else {
                let id = next_id;
                next_id += 1;
                id
            };
            let piece = CandidateSegment {
                segment_id,
                route_index: candidate.route_index,
                line,
            };
            if engine.line_within(&piece.line, offset_zone) {
                partition.within.push(piece);
            } else {
                partition.outside.push(piece);
            }
        }
    }
    Ok(partition)
}
