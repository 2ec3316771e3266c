// Copyright Catenary Transit Initiatives
// Compass bearings and intersecting angles for border-route classification

use geo_types::{Coord, LineString};

/// Compass bearing in degrees clockwise from true north, from `first` to
/// `last`, in [0, 360). Returns `None` for a zero-length displacement, which
/// has no bearing.
pub fn compass_bearing(first: Coord<f64>, last: Coord<f64>) -> Option<f64> {
    let dx = last.x - first.x;
    let dy = last.y - first.y;

    if dx == 0.0 && dy > 0.0 {
        Some(0.0)
    } else if dx > 0.0 {
        Some(90.0 - (dy / dx).atan().to_degrees())
    } else if dx == 0.0 && dy < 0.0 {
        Some(180.0)
    } else if dx < 0.0 {
        Some(270.0 - (dy / dx).atan().to_degrees())
    } else {
        None
    }
}

/// Bearing of a polyline taken from its first vertex to its last vertex.
pub fn line_bearing(line: &LineString<f64>) -> Option<f64> {
    let first = *line.0.first()?;
    let last = *line.0.last()?;
    compass_bearing(first, last)
}

/// Reduces the raw difference of two bearings to the true intersecting angle
/// in [0, 90]. Two lines meeting head-on (delta near 180) intersect at a low
/// angle, not a high one.
pub fn intersecting_angle(angle_a: f64, angle_b: f64) -> f64 {
    let delta = (angle_a - angle_b).abs();

    if delta > 90.0 && delta <= 270.0 {
        (180.0 - delta).abs()
    } else if delta > 270.0 {
        360.0 - delta
    } else {
        delta
    }
}
