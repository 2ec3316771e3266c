// Rule table assembly: measures, ordering, process date.

use crate::engine::GeometryEngine;
use crate::error::ResolveError;
use crate::models::{GeometryKind, ResolverParams, RouteNetwork, RuleTable, TopologyRecord};
use crate::pipeline::topology::AttributedPiece;
use chrono::NaiveDate;
use ordered_float::OrderedFloat;

/// Derives start/end measures for every attributed piece against its parent
/// route, sorts by (route id, start measure) and stamps the process date.
/// A multi-part piece yields one record spanning all of its parts, and its
/// part count flows into the geometry kind column. The returned table
/// replaces any previous table of the same identity wholesale; nothing is
/// appended.
pub fn assemble<E: GeometryEngine + ?Sized>(
    pieces: Vec<AttributedPiece>,
    route: &RouteNetwork,
    layer_name: &str,
    process_date: NaiveDate,
    engine: &E,
    params: &ResolverParams,
) -> Result<RuleTable, ResolveError> {
    let mut records = Vec::with_capacity(pieces.len());

    for piece in pieces {
        let parent = &route.lines[piece.route_index];

        let mut start_measure = f64::INFINITY;
        let mut end_measure = f64::NEG_INFINITY;
        let mut located = 0usize;
        for part in &piece.parts {
            let Some(span) = engine.locate_along(
                part,
                std::slice::from_ref(&parent.line),
                params.buffer_size,
            )?
            else {
                continue;
            };
            start_measure = start_measure.min(span.from_measure.min(span.to_measure));
            end_measure = end_measure.max(span.from_measure.max(span.to_measure));
            located += 1;
        }
        if located == 0 {
            continue;
        }
        if end_measure - start_measure <= params.xy_resolution {
            // a record must span a measurable stretch of route
            continue;
        }

        records.push(TopologyRecord {
            route_id: parent.route_id.clone(),
            start_measure,
            end_measure,
            left_boundary_id: piece.left_boundary_id,
            right_boundary_id: piece.right_boundary_id,
            geometry_kind: if piece.parts.len() > 1 {
                GeometryKind::MultiLine
            } else {
                GeometryKind::Line
            },
            effective_from: parent.effective_from,
            effective_to: parent.effective_to,
        });
    }

    records.sort_by(|a, b| {
        a.route_id
            .cmp(&b.route_id)
            .then_with(|| OrderedFloat(a.start_measure).cmp(&OrderedFloat(b.start_measure)))
            .then_with(|| OrderedFloat(a.end_measure).cmp(&OrderedFloat(b.end_measure)))
    });

    Ok(RuleTable {
        layer: layer_name.to_string(),
        process_date,
        records,
    })
}
