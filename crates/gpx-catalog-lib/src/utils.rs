//! Utility functions for distances, rounding and name checks

use geo::Point;

/// Earth's mean radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Valid latitude range in degrees
pub const MAX_LATITUDE: f64 = 90.0;

/// Valid longitude range in degrees
pub const MAX_LONGITUDE: f64 = 180.0;

/// File name suffix that marks a candidate document
pub const GPX_SUFFIX: &str = ".gpx";

/// File name suffix required of a schema file
pub const SCHEMA_SUFFIX: &str = ".xsd";

/// Calculate the Haversine distance between two points in meters
///
/// Points follow the `geo` convention: x is longitude, y is latitude.
#[inline]
pub fn haversine_distance(p1: Point<f64>, p2: Point<f64>) -> f64 {
    let lat1 = p1.y().to_radians();
    let lat2 = p2.y().to_radians();
    let delta_lat = (p2.y() - p1.y()).to_radians();
    let delta_lon = (p2.x() - p1.x()).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Sum of the Haversine distances along a sequence of points, in meters
pub fn path_length<'a, I>(points: I) -> f64
where
    I: IntoIterator<Item = &'a gpx::Waypoint>,
{
    let mut total = 0.0;
    let mut prev: Option<Point<f64>> = None;
    for waypoint in points {
        let point = waypoint.point();
        if let Some(prev) = prev {
            total += haversine_distance(prev, point);
        }
        prev = Some(point);
    }
    total
}

/// Round a length to the nearest 10 meters (halves round up)
#[inline]
pub fn round_to_ten(len: f64) -> f64 {
    ((len + 5.0) / 10.0).floor() * 10.0
}

/// Check if a latitude/longitude pair is within WGS84 bounds
#[inline]
pub fn is_valid_coordinate(lat: f64, lon: f64) -> bool {
    lat.is_finite()
        && lon.is_finite()
        && (-MAX_LATITUDE..=MAX_LATITUDE).contains(&lat)
        && (-MAX_LONGITUDE..=MAX_LONGITUDE).contains(&lon)
}

/// Check whether a file name carries the document suffix
///
/// The match is literal and case-sensitive, and the suffix alone is not a name.
#[inline]
pub fn is_gpx_file_name(name: &str) -> bool {
    name.len() > GPX_SUFFIX.len() && name.ends_with(GPX_SUFFIX)
}

/// Check whether a path names a schema file
#[inline]
pub fn is_schema_file_name(name: &str) -> bool {
    name.len() > SCHEMA_SUFFIX.len() && name.ends_with(SCHEMA_SUFFIX)
}
