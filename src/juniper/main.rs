// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Removal of the attribution is not allowed, as covered under the AGPL license

use anyhow::{Context, Result};
use border_topology::engine::PlanarEngine;
use border_topology::models::ResolverParams;
use border_topology::observer::TracingObserver;
use border_topology::pipeline::resolve_layers;
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};

mod loader;
mod writer;

#[derive(Parser, Debug)]
#[command(author, version, about = "Generate route border rule tables from a route network and boundary layers", long_about = None)]
struct Args {
    /// GeoJSON file holding the route network (LineString / MultiLineString features)
    #[arg(long)]
    routes: PathBuf,

    /// GeoJSON boundary layer files (Polygon / MultiPolygon features), one rule table each
    #[arg(long, required = true, num_args = 1..)]
    boundaries: Vec<PathBuf>,

    /// Directory receiving one CSV rule table per boundary layer
    #[arg(long)]
    output: PathBuf,

    /// Feature property carrying the route identifier
    #[arg(long, default_value = "route_id")]
    route_id_field: String,

    /// Feature property carrying the boundary identifier
    #[arg(long, default_value = "boundary_id")]
    boundary_id_field: String,

    /// Candidate search distance around the boundary, in map units
    #[arg(long, default_value_t = 100.0)]
    buffer_size: f64,

    /// Border-hugging tolerance around the boundary, in map units
    #[arg(long, default_value_t = 10.0)]
    offset: f64,

    /// Highest intersecting angle (degrees) still considered border-following
    #[arg(long, default_value_t = 15.0)]
    angle_threshold: f64,

    /// Smallest distinguishable distance of the spatial reference
    #[arg(long, default_value_t = 0.001)]
    xy_resolution: f64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let params = ResolverParams {
        buffer_size: args.buffer_size,
        offset: args.offset,
        angle_threshold: args.angle_threshold,
        xy_resolution: args.xy_resolution,
    };

    let network = loader::load_route_network(&args.routes, &args.route_id_field)?;
    let layers = args
        .boundaries
        .iter()
        .map(|path| loader::load_boundary_layer(path, &args.boundary_id_field))
        .collect::<Result<Vec<_>>>()?;

    std::fs::create_dir_all(&args.output).context("Failed to create output dir")?;

    let engine = PlanarEngine::default();
    let results = resolve_layers(&network, &layers, &params, &engine, &TracingObserver);

    let mut failed = 0usize;
    for (layer_name, result) in results {
        match result {
            Ok(table) => {
                let path = args
                    .output
                    .join(format!("{layer_name}_route_border_rule_table.csv"));
                writer::write_rule_table(&table, &path)?;
                info!(
                    layer = layer_name.as_str(),
                    records = table.len(),
                    path = %path.display(),
                    "rule table written"
                );
            }
            Err(e) => {
                error!(layer = layer_name.as_str(), "resolution failed: {e}");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} boundary layer(s) failed, see log for details");
    }
    Ok(())
}
