//! Region-of-interest geometry.
//!
//! A [`RegionOfInterest`] wraps the multi-polygon inside which collected
//! points are considered valid. Besides the point-in-area test it answers
//! where a straight move between two points crosses the region boundary,
//! which the segment filters use to clip a segment exactly at the edge.
//! Boundary edges live in an R-tree so crossing lookups only test edges
//! whose envelope overlaps the move.

use geo::line_intersection::{LineIntersection, line_intersection};
use geo::{BoundingRect, Coord, Distance, Euclidean, Intersects, Line, MultiPolygon, Point};
use geojson::GeoJson;
use rstar::{AABB, RTree, RTreeObject};

use crate::GeometryError;

/// One edge of a polygon ring stored in the boundary index.
struct BoundaryEdge {
    line: Line<f64>,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for BoundaryEdge {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// The geographic area where collected points are valid.
///
/// Constructed once per ingestion (or once per batch) and shared read-only
/// between workers.
pub struct RegionOfInterest {
    area: MultiPolygon<f64>,
    edges: RTree<BoundaryEdge>,
}

impl std::fmt::Debug for RegionOfInterest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegionOfInterest")
            .field("polygons", &self.area.0.len())
            .field("edges", &self.edges.size())
            .finish()
    }
}

impl RegionOfInterest {
    /// Builds the region and its boundary index from a multi-polygon.
    #[must_use]
    pub fn new(area: MultiPolygon<f64>) -> Self {
        let mut edges = Vec::new();
        for polygon in &area.0 {
            let rings = std::iter::once(polygon.exterior()).chain(polygon.interiors());
            for ring in rings {
                for line in ring.lines() {
                    edges.push(BoundaryEdge {
                        envelope: line_envelope(&line),
                        line,
                    });
                }
            }
        }
        log::debug!("Indexed {} region boundary edges", edges.len());

        Self {
            area,
            edges: RTree::bulk_load(edges),
        }
    }

    /// Parses a `GeoJSON` `Polygon` or `MultiPolygon` (bare geometry,
    /// feature, or single-feature collection) into a region.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError`] if the text is not valid `GeoJSON` or does
    /// not describe a polygonal area.
    pub fn from_geojson(geojson_str: &str) -> Result<Self, GeometryError> {
        let geojson: GeoJson = geojson_str.parse()?;
        let geometry = match geojson {
            GeoJson::Geometry(geometry) => geometry,
            GeoJson::Feature(feature) => {
                feature.geometry.ok_or_else(|| GeometryError::Unsupported {
                    message: "feature has no geometry".to_string(),
                })?
            }
            GeoJson::FeatureCollection(collection) => collection
                .features
                .into_iter()
                .find_map(|f| f.geometry)
                .ok_or_else(|| GeometryError::Unsupported {
                    message: "feature collection has no geometry".to_string(),
                })?,
        };

        let geo_geometry: geo::Geometry<f64> = geometry.try_into()?;
        let area = match geo_geometry {
            geo::Geometry::MultiPolygon(mp) => mp,
            geo::Geometry::Polygon(p) => MultiPolygon(vec![p]),
            other => {
                return Err(GeometryError::Unsupported {
                    message: format!("expected a polygon, found {other:?}"),
                });
            }
        };

        Ok(Self::new(area))
    }

    /// The underlying area.
    #[must_use]
    pub const fn area(&self) -> &MultiPolygon<f64> {
        &self.area
    }

    /// Whether the point lies inside the region. Points on the boundary
    /// count as inside.
    #[must_use]
    pub fn contains(&self, point: &Point<f64>) -> bool {
        self.area.intersects(point)
    }

    /// All points where the straight move `from → to` touches the region
    /// boundary, ordered by distance from `from`.
    #[must_use]
    pub fn boundary_crossings(&self, from: Point<f64>, to: Point<f64>) -> Vec<Point<f64>> {
        let movement = Line::new(from.0, to.0);
        let query = line_envelope(&movement);

        let mut crossings: Vec<Point<f64>> = Vec::new();
        for edge in self.edges.locate_in_envelope_intersecting(&query) {
            match line_intersection(movement, edge.line) {
                Some(LineIntersection::SinglePoint { intersection, .. }) => {
                    crossings.push(Point(intersection));
                }
                Some(LineIntersection::Collinear { intersection }) => {
                    crossings.push(intersection.start_point());
                    crossings.push(intersection.end_point());
                }
                None => {}
            }
        }

        crossings.sort_by(|a, b| {
            Euclidean
                .distance(from, *a)
                .total_cmp(&Euclidean.distance(from, *b))
        });
        crossings.dedup_by(|a, b| Euclidean.distance(*a, *b) < f64::EPSILON);
        crossings
    }

    /// The boundary crossing of `from → to` closest to `anchor`, which is
    /// expected to be one of the two ends.
    #[must_use]
    pub fn nearest_crossing(
        &self,
        from: Point<f64>,
        to: Point<f64>,
        anchor: Point<f64>,
    ) -> Option<Point<f64>> {
        self.boundary_crossings(from, to).into_iter().min_by(|a, b| {
            Euclidean
                .distance(anchor, *a)
                .total_cmp(&Euclidean.distance(anchor, *b))
        })
    }
}

fn line_envelope(line: &Line<f64>) -> AABB<[f64; 2]> {
    let rect = line.bounding_rect();
    let Coord { x: min_x, y: min_y } = rect.min();
    let Coord { x: max_x, y: max_y } = rect.max();
    AABB::from_corners([min_x, min_y], [max_x, max_y])
}
