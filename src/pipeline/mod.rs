// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Removal of the attribution is not allowed, as covered under the AGPL license
//
// Border topology resolution pipeline: candidate selection, angle
// classification, offset-zone segmentation, left/right topology resolution,
// rule table assembly.

pub mod angle_filter;
pub mod candidates;
pub mod offset_zone;
pub mod table;
pub mod topology;

#[cfg(test)]
mod pipeline_tests;

use crate::engine::{CapStyle, GeometryEngine};
use crate::error::ResolveError;
use crate::models::{BoundaryLayer, ResolverParams, RouteNetwork, RuleTable};
use crate::observer::ProgressObserver;
use chrono::NaiveDate;
use geo_types::LineString;
use rayon::prelude::*;

/// A route piece selected as geometrically near the boundary. Scratch entity
/// owned by one pipeline run.
#[derive(Debug, Clone)]
pub struct CandidateSegment {
    /// Stable within the run, unique across splits.
    pub segment_id: u32,
    /// Index of the parent polyline in the route network.
    pub route_index: usize,
    pub line: LineString<f64>,
}

/// Resolves the border topology of `route` against one boundary layer,
/// stamping the resulting rule table with today's date.
///
/// Returns an empty table when no route piece runs along the boundary; fails
/// hard on any geometry engine error so a partial table is never published.
pub fn resolve_border_topology<E: GeometryEngine + ?Sized>(
    route: &RouteNetwork,
    layer: &BoundaryLayer,
    params: &ResolverParams,
    engine: &E,
    observer: &dyn ProgressObserver,
) -> Result<RuleTable, ResolveError> {
    let process_date = chrono::Local::now().date_naive();
    resolve_border_topology_as_of(route, layer, params, engine, observer, process_date)
}

/// Same as [`resolve_border_topology`] with an explicit process date. Output
/// is a pure function of the inputs and the date.
pub fn resolve_border_topology_as_of<E: GeometryEngine + ?Sized>(
    route: &RouteNetwork,
    layer: &BoundaryLayer,
    params: &ResolverParams,
    engine: &E,
    observer: &dyn ProgressObserver,
    process_date: NaiveDate,
) -> Result<RuleTable, ResolveError> {
    if route.is_empty() {
        return Err(ResolveError::InputNotFound("route network".to_string()));
    }
    if layer.is_empty() {
        return Err(ResolveError::InputNotFound(format!(
            "boundary layer '{}'",
            layer.name
        )));
    }

    observer.info(&format!(
        "Generating route border rule table for {}...",
        layer.name
    ));

    let dissolved = engine.dissolve_boundaries(layer)?;
    let boundary_lines: Vec<LineString<f64>> = dissolved
        .iter()
        .flat_map(|d| d.lines.iter().cloned())
        .collect();

    observer.info("Identifying candidate border routes...");
    let candidates = candidates::select_candidates(route, &boundary_lines, engine, params)?;

    observer.info("Filtering out candidate border routes that intersect the boundary at high angles...");
    let positives =
        angle_filter::keep_low_angle_candidates(candidates, &boundary_lines, engine, params, observer)?;

    let offset_zone = engine.buffer_lines(&boundary_lines, params.offset, CapStyle::Round)?;
    let partition = offset_zone::partition_by_zone(positives, &offset_zone, engine, params)?;

    observer.info("Calculating L/R boundary topology of positive candidate border routes...");
    let attributed = topology::resolve_sides(&partition, layer, &boundary_lines, engine, params)?;

    observer.info(&format!(
        "Populating {} route border rule table...",
        layer.name
    ));
    let rule_table = table::assemble(attributed, route, &layer.name, process_date, engine, params)?;

    observer.info("done!");
    Ok(rule_table)
}

/// Resolves one route against several boundary layers. Runs are independent
/// (the route network is the only shared, read-only input) and fan out across
/// the rayon pool; all tables of a batch share one process date.
pub fn resolve_layers<E: GeometryEngine + ?Sized>(
    route: &RouteNetwork,
    layers: &[BoundaryLayer],
    params: &ResolverParams,
    engine: &E,
    observer: &dyn ProgressObserver,
) -> Vec<(String, Result<RuleTable, ResolveError>)> {
    let process_date = chrono::Local::now().date_naive();
    layers
        .par_iter()
        .map(|layer| {
            let result = resolve_border_topology_as_of(
                route,
                layer,
                params,
                engine,
                observer,
                process_date,
            );
            if let Err(err) = &result {
                observer.error(&format!("failed on boundary layer '{}': {err}", layer.name));
            }
            (layer.name.clone(), result)
        })
        .collect()
}
