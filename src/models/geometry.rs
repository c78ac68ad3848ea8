//! Boundary geometry decoding and validation.

use geo::{BoundingRect, Contains, Coord, LineString, MultiPolygon, Point, Polygon};

use super::division::ScaledBbox;

/// GeoJSON-style multipolygon coordinates: polygons -> rings -> `[lon, lat]`.
///
/// The first ring of each polygon is the exterior, the rest are holes.
pub type MultiPolygonCoords = Vec<Vec<Vec<[f64; 2]>>>;

/// A decoded boundary, or the reason it could not be decoded.
///
/// Malformed boundaries are kept rather than dropped so that queries
/// touching them fail the same way a spatial database does.
#[derive(Debug, Clone)]
pub enum BoundaryGeometry {
    Valid(MultiPolygon<f64>),
    Malformed(String),
}

impl BoundaryGeometry {
    pub fn from_coords(coords: &MultiPolygonCoords) -> Self {
        match build_multipolygon(coords) {
            Ok(mp) => BoundaryGeometry::Valid(mp),
            Err(reason) => BoundaryGeometry::Malformed(reason),
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, BoundaryGeometry::Valid(_))
    }

    /// Point-in-polygon test; `Err` carries the decode failure.
    pub fn contains(&self, lat: f64, lon: f64) -> Result<bool, String> {
        match self {
            BoundaryGeometry::Valid(mp) => Ok(mp.contains(&Point::new(lon, lat))),
            BoundaryGeometry::Malformed(reason) => Err(reason.clone()),
        }
    }

    /// Bounding box of a valid geometry
    pub fn bbox(&self) -> Option<ScaledBbox> {
        match self {
            BoundaryGeometry::Valid(mp) => mp.bounding_rect().map(|rect| {
                ScaledBbox::from_degrees(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
            }),
            BoundaryGeometry::Malformed(_) => None,
        }
    }
}

/// Build a multipolygon from raw coordinates, closing open rings.
pub fn build_multipolygon(coords: &MultiPolygonCoords) -> Result<MultiPolygon<f64>, String> {
    if coords.is_empty() {
        return Err("empty multipolygon".to_string());
    }

    let mut polygons = Vec::with_capacity(coords.len());
    for (pi, rings) in coords.iter().enumerate() {
        let mut built = Vec::with_capacity(rings.len());
        for (ri, ring) in rings.iter().enumerate() {
            let line = build_ring(ring).map_err(|e| format!("polygon {} ring {}: {}", pi, ri, e))?;
            built.push(line);
        }

        let mut iter = built.into_iter();
        let exterior = iter
            .next()
            .ok_or_else(|| format!("polygon {} has no exterior ring", pi))?;
        polygons.push(Polygon::new(exterior, iter.collect()));
    }

    Ok(MultiPolygon::new(polygons))
}

fn build_ring(ring: &[[f64; 2]]) -> Result<LineString<f64>, String> {
    let mut coords: Vec<Coord<f64>> = Vec::with_capacity(ring.len() + 1);
    for [lon, lat] in ring {
        if !lon.is_finite() || !lat.is_finite() {
            return Err("non-finite coordinate".to_string());
        }
        if !(-180.0..=180.0).contains(lon) || !(-90.0..=90.0).contains(lat) {
            return Err(format!("coordinate out of range ({}, {})", lon, lat));
        }
        coords.push(Coord { x: *lon, y: *lat });
    }

    // Close the ring if needed
    if coords.len() >= 3 && coords.first() != coords.last() {
        coords.push(coords[0]);
    }

    if coords.len() < 4 {
        return Err(format!("ring has {} points, need at least 4", coords.len()));
    }

    Ok(LineString::new(coords))
}
