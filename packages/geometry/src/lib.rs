#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geometry and projection adapter for the track pipeline.
//!
//! Every coordinate operation the pipeline performs goes through this crate:
//! point and line construction, reprojection between geographic WGS84
//! coordinates (EPSG:4326) and spherical web mercator (EPSG:3857), metric
//! distances and lengths, and region-of-interest boundary intersection.
//! Nothing outside this crate touches the `geo` algorithms directly.

pub mod region;

use geo::{Coord, Distance, Euclidean, Length};

pub use geo::{LineString, MultiPolygon, Point, Polygon};
pub use region::RegionOfInterest;

/// Equatorial radius used by the spherical web mercator projection.
pub const EARTH_RADIUS_METERS: f64 = 6_378_137.0;

/// Latitude limit of the web mercator projection, in degrees.
pub const MAX_MERCATOR_LATITUDE: f64 = 85.051_128_779_806_59;

/// Errors that can occur while building geometries.
#[derive(Debug, thiserror::Error)]
pub enum GeometryError {
    /// The input was not valid `GeoJSON`.
    #[error("Invalid GeoJSON: {0}")]
    GeoJson(#[from] geojson::Error),

    /// The geometry type cannot be used as a region of interest.
    #[error("Unsupported geometry: {message}")]
    Unsupported {
        /// Description of what was found instead.
        message: String,
    },
}

/// Builds a geographic point from longitude and latitude in degrees.
#[must_use]
pub const fn geographic_point(longitude: f64, latitude: f64) -> Point<f64> {
    Point(Coord {
        x: longitude,
        y: latitude,
    })
}

/// Projects a geographic point into web mercator meters.
///
/// Latitudes beyond the mercator limit are clamped so the result stays
/// finite.
#[must_use]
pub fn project(point: Point<f64>) -> Point<f64> {
    let latitude = point
        .y()
        .clamp(-MAX_MERCATOR_LATITUDE, MAX_MERCATOR_LATITUDE);
    let x = EARTH_RADIUS_METERS * point.x().to_radians();
    let y = EARTH_RADIUS_METERS
        * (std::f64::consts::FRAC_PI_4 + latitude.to_radians() / 2.0)
            .tan()
            .ln();
    Point::new(x, y)
}

/// Converts a web mercator point back to geographic degrees.
#[must_use]
pub fn unproject(point: Point<f64>) -> Point<f64> {
    let longitude = (point.x() / EARTH_RADIUS_METERS).to_degrees();
    let latitude = (2.0 * (point.y() / EARTH_RADIUS_METERS).exp().atan()
        - std::f64::consts::FRAC_PI_2)
        .to_degrees();
    Point::new(longitude, latitude)
}

/// Euclidean distance between two already-projected points, in meters.
#[must_use]
pub fn metric_distance(a: Point<f64>, b: Point<f64>) -> f64 {
    Euclidean.distance(a, b)
}

/// Metric distance between two geographic points.
#[must_use]
pub fn geographic_distance(a: Point<f64>, b: Point<f64>) -> f64 {
    metric_distance(project(a), project(b))
}

/// Builds an ordered line from geographic points.
pub fn geographic_line<I>(points: I) -> LineString<f64>
where
    I: IntoIterator<Item = Point<f64>>,
{
    points.into_iter().map(|p| p.0).collect()
}

/// Length of a geographic line measured in web mercator meters.
#[must_use]
pub fn metric_length(line: &LineString<f64>) -> f64 {
    let projected: LineString<f64> = line.points().map(|p| project(p).0).collect();
    Euclidean.length(&projected)
}

/// Position of the geographic point `at` along the straight segment
/// `from → to`, as a fraction of the segment's metric length.
///
/// Returns `0.0` for degenerate segments.
#[must_use]
pub fn fraction_along(from: Point<f64>, to: Point<f64>, at: Point<f64>) -> f64 {
    let total = geographic_distance(from, to);
    if total <= 0.0 {
        return 0.0;
    }
    (geographic_distance(from, at) / total).clamp(0.0, 1.0)
}

/// `GeoJSON` geometry of a geographic line.
#[must_use]
pub fn line_to_geojson(line: &LineString<f64>) -> geojson::Geometry {
    geojson::Geometry::new(geojson::Value::from(line))
}
