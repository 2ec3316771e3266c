// GeoJSON loaders for the route network and boundary layers.

use anyhow::{Context, Result, bail};
use border_topology::ResolveError;
use border_topology::models::{BoundaryLayer, BoundaryPolygon, RouteLine, RouteNetwork};
use chrono::NaiveDate;
use geojson::{Feature, FeatureCollection, GeoJson};
use std::path::Path;
use tracing::warn;

fn read_feature_collection(path: &Path) -> Result<FeatureCollection> {
    if !path.exists() {
        return Err(ResolveError::InputNotFound(path.display().to_string()).into());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let geojson = raw
        .parse::<GeoJson>()
        .with_context(|| format!("Failed to parse {} as GeoJSON", path.display()))?;
    match geojson {
        GeoJson::FeatureCollection(fc) => Ok(fc),
        _ => bail!("{} is not a GeoJSON FeatureCollection", path.display()),
    }
}

fn id_property(feature: &Feature, field: &str) -> Option<String> {
    match feature.properties.as_ref()?.get(field)? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn date_property(feature: &Feature, field: &str) -> Option<NaiveDate> {
    let serde_json::Value::String(s) = feature.properties.as_ref()?.get(field)? else {
        return None;
    };
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

fn network_from_features(fc: &FeatureCollection, id_field: &str) -> Result<RouteNetwork> {
    let mut lines = Vec::new();
    for feature in &fc.features {
        let Some(geometry) = feature.geometry.as_ref() else {
            warn!("skipping route feature without geometry");
            continue;
        };
        let Some(route_id) = id_property(feature, id_field) else {
            bail!("route feature is missing the '{id_field}' property");
        };
        let effective_from = date_property(feature, "effective_from");
        let effective_to = date_property(feature, "effective_to");

        let geometry = geo_types::Geometry::<f64>::try_from(geometry.clone())
            .with_context(|| format!("route '{route_id}' has an unusable geometry"))?;
        match geometry {
            geo_types::Geometry::LineString(line) => {
                check_route_line(&route_id, &line)?;
                lines.push(RouteLine {
                    route_id,
                    line,
                    effective_from,
                    effective_to,
                });
            }
            geo_types::Geometry::MultiLineString(parts) => {
                for line in parts {
                    check_route_line(&route_id, &line)?;
                    lines.push(RouteLine {
                        route_id: route_id.clone(),
                        line,
                        effective_from,
                        effective_to,
                    });
                }
            }
            other => {
                warn!(
                    route_id = route_id.as_str(),
                    "skipping non-line route geometry ({})",
                    kind_of(&other)
                );
            }
        }
    }
    Ok(RouteNetwork { lines })
}

fn layer_from_features(name: &str, fc: &FeatureCollection, id_field: &str) -> Result<BoundaryLayer> {
    let mut polygons = Vec::new();
    for feature in &fc.features {
        let Some(geometry) = feature.geometry.as_ref() else {
            warn!(layer = name, "skipping boundary feature without geometry");
            continue;
        };
        let Some(boundary_id) = id_property(feature, id_field) else {
            bail!("boundary feature in layer '{name}' is missing the '{id_field}' property");
        };

        let geometry = geo_types::Geometry::<f64>::try_from(geometry.clone())
            .with_context(|| format!("boundary '{boundary_id}' has an unusable geometry"))?;
        match geometry {
            geo_types::Geometry::Polygon(polygon) => polygons.push(BoundaryPolygon {
                boundary_id,
                polygon,
            }),
            geo_types::Geometry::MultiPolygon(parts) => {
                for polygon in parts {
                    polygons.push(BoundaryPolygon {
                        boundary_id: boundary_id.clone(),
                        polygon,
                    });
                }
            }
            other => {
                warn!(
                    boundary_id = boundary_id.as_str(),
                    "skipping non-polygon boundary geometry ({})",
                    kind_of(&other)
                );
            }
        }
    }
    Ok(BoundaryLayer {
        name: name.to_string(),
        polygons,
    })
}

fn check_route_line(route_id: &str, line: &geo_types::LineString<f64>) -> Result<()> {
    if line.0.len() < 2 {
        return Err(ResolveError::DegenerateGeometry(format!(
            "route '{route_id}' has a line with fewer than two positions"
        ))
        .into());
    }
    Ok(())
}

fn kind_of(geometry: &geo_types::Geometry<f64>) -> &'static str {
    match geometry {
        geo_types::Geometry::Point(_) => "Point",
        geo_types::Geometry::MultiPoint(_) => "MultiPoint",
        geo_types::Geometry::Line(_) => "Line",
        geo_types::Geometry::LineString(_) => "LineString",
        geo_types::Geometry::MultiLineString(_) => "MultiLineString",
        geo_types::Geometry::Polygon(_) => "Polygon",
        geo_types::Geometry::MultiPolygon(_) => "MultiPolygon",
        geo_types::Geometry::GeometryCollection(_) => "GeometryCollection",
        geo_types::Geometry::Rect(_) => "Rect",
        geo_types::Geometry::Triangle(_) => "Triangle",
    }
}

pub fn load_route_network(path: &Path, id_field: &str) -> Result<RouteNetwork> {
    let fc = read_feature_collection(path)?;
    network_from_features(&fc, id_field)
}

pub fn load_boundary_layer(path: &Path, id_field: &str) -> Result<BoundaryLayer> {
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| path.display().to_string());
    let fc = read_feature_collection(path)?;
    layer_from_features(&name, &fc, id_field)
}
