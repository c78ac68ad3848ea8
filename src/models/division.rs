//! Administrative division records as read from the division store.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::geometry::MultiPolygonCoords;

/// Scale factor applied to degrees before they are stored as integers.
pub const COORD_SCALE: f64 = 1_000_000.0;

const MAX_LAT_SCALED: i64 = 90_000_000;
const MAX_LON_SCALED: i64 = 180_000_000;

/// Scale a WGS84 degree value the same way stored bounding boxes are scaled.
pub fn scale_coord(degrees: f64) -> i64 {
    (degrees * COORD_SCALE).round() as i64
}

/// Administrative level of a division.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum DivisionLevel {
    /// Province, autonomous region or direct-administered municipality
    Province,
    /// Prefecture-level city (or a placeholder record standing in for one)
    City,
    /// County-level unit: district, county, county-level city
    District,
}

impl DivisionLevel {
    /// Get the field name for this level
    pub fn field_name(&self) -> &'static str {
        match self {
            DivisionLevel::Province => "province",
            DivisionLevel::City => "city",
            DivisionLevel::District => "district",
        }
    }
}

impl fmt::Display for DivisionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

impl FromStr for DivisionLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "province" => Ok(DivisionLevel::Province),
            "city" => Ok(DivisionLevel::City),
            "district" => Ok(DivisionLevel::District),
            other => Err(format!("unknown division level '{}'", other)),
        }
    }
}

/// Axis-aligned bounding box with coordinates scaled by [`COORD_SCALE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScaledBbox {
    pub min_lat: i64,
    pub max_lat: i64,
    pub min_lon: i64,
    pub max_lon: i64,
}

impl ScaledBbox {
    pub fn new(min_lat: i64, max_lat: i64, min_lon: i64, max_lon: i64) -> Self {
        Self {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        }
    }

    /// Build from degree bounds
    pub fn from_degrees(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lat: scale_coord(min_lat),
            max_lat: scale_coord(max_lat),
            min_lon: scale_coord(min_lon),
            max_lon: scale_coord(max_lon),
        }
    }

    /// An inverted or out-of-range box carries no usable extent.
    pub fn is_valid(&self) -> bool {
        let lat_range = -MAX_LAT_SCALED..=MAX_LAT_SCALED;
        let lon_range = -MAX_LON_SCALED..=MAX_LON_SCALED;
        self.min_lat <= self.max_lat
            && self.min_lon <= self.max_lon
            && lat_range.contains(&self.min_lat)
            && lat_range.contains(&self.max_lat)
            && lon_range.contains(&self.min_lon)
            && lon_range.contains(&self.max_lon)
    }

    /// Inclusive containment test on scaled coordinates
    pub fn contains_scaled(&self, lat_scaled: i64, lon_scaled: i64) -> bool {
        self.is_valid()
            && self.min_lat <= lat_scaled
            && lat_scaled <= self.max_lat
            && self.min_lon <= lon_scaled
            && lon_scaled <= self.max_lon
    }

    /// Center as `(lat, lon)` in degrees
    pub fn center(&self) -> Option<(f64, f64)> {
        if !self.is_valid() {
            return None;
        }
        let lat = (self.min_lat as f64 + self.max_lat as f64) / 2.0 / COORD_SCALE;
        let lon = (self.min_lon as f64 + self.max_lon as f64) / 2.0 / COORD_SCALE;
        Some((lat, lon))
    }

    /// Squared degree-space distance from the box center to a point.
    pub fn center_distance_sq(&self, lat: f64, lon: f64) -> f64 {
        match self.center() {
            Some((c_lat, c_lon)) => {
                let d_lat = c_lat - lat;
                let d_lon = c_lon - lon;
                d_lat * d_lat + d_lon * d_lon
            }
            None => f64::INFINITY,
        }
    }

    /// Corners in `[lon, lat]` degree order, for R-tree envelopes
    pub fn corners(&self) -> ([f64; 2], [f64; 2]) {
        (
            [
                self.min_lon as f64 / COORD_SCALE,
                self.min_lat as f64 / COORD_SCALE,
            ],
            [
                self.max_lon as f64 / COORD_SCALE,
                self.max_lat as f64 / COORD_SCALE,
            ],
        )
    }
}

/// A single administrative division record.
///
/// Records are produced by an external import pipeline and treated as
/// immutable by the resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Division {
    /// 6-digit national administrative code
    pub code: String,

    /// Local-language name
    pub name: String,

    /// English name
    #[serde(default)]
    pub name_en: String,

    pub level: DivisionLevel,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub province_code: Option<String>,

    /// Absent for county-level units governed directly by a province
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city_code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<ScaledBbox>,

    /// Exact boundary as GeoJSON-style multipolygon coordinates (lon, lat)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<MultiPolygonCoords>,
}

impl Division {
    pub fn new(code: &str, name: &str, level: DivisionLevel) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
            name_en: String::new(),
            level,
            parent_code: None,
            province_code: None,
            city_code: None,
            bbox: None,
            geometry: None,
        }
    }

    /// Squared distance from the bbox center to a point; missing or
    /// inverted boxes are infinitely far.
    pub fn center_distance_sq(&self, lat: f64, lon: f64) -> f64 {
        self.bbox
            .map(|b| b.center_distance_sq(lat, lon))
            .unwrap_or(f64::INFINITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_coord_rounds() {
        assert_eq!(scale_coord(39.9042), 39_904_200);
        assert_eq!(scale_coord(-0.0000004), 0);
        assert_eq!(scale_coord(116.4073965), 116_407_397);
    }

    #[test]
    fn test_bbox_contains_is_inclusive() {
        let bbox = ScaledBbox::from_degrees(116.0, 39.0, 117.0, 40.0);
        assert!(bbox.contains_scaled(scale_coord(39.0), scale_coord(116.0)));
        assert!(bbox.contains_scaled(scale_coord(40.0), scale_coord(117.0)));
        assert!(!bbox.contains_scaled(scale_coord(40.000001), scale_coord(116.5)));
    }

    #[test]
    fn test_inverted_bbox_is_infinitely_far() {
        let bbox = ScaledBbox::new(10, 5, 0, 10);
        assert!(!bbox.is_valid());
        assert!(bbox.center().is_none());
        assert!(bbox.center_distance_sq(0.0, 0.0).is_infinite());
        assert!(!bbox.contains_scaled(7, 5));
    }

    #[test]
    fn test_out_of_range_bbox_is_invalid() {
        let bbox = ScaledBbox::new(10_000_000, i64::MAX, 100_000_000, 120_000_000);
        assert!(!bbox.is_valid());
        assert!(bbox.center().is_none());
        assert!(bbox.center_distance_sq(22.54, 114.05).is_infinite());
        assert!(!bbox.contains_scaled(20_000_000, 110_000_000));

        let edge = ScaledBbox::from_degrees(-180.0, -90.0, 180.0, 90.0);
        assert!(edge.is_valid());
        assert_eq!(edge.center(), Some((0.0, 0.0)));
    }

    #[test]
    fn test_division_without_bbox_is_infinitely_far() {
        let d = Division::new("110101", "东城区", DivisionLevel::District);
        assert!(d.center_distance_sq(39.9, 116.4).is_infinite());
    }

    #[test]
    fn test_level_parse() {
        assert_eq!("City".parse::<DivisionLevel>(), Ok(DivisionLevel::City));
        assert!("county".parse::<DivisionLevel>().is_err());
    }

    #[test]
    fn test_division_json_defaults() {
        let json = r#"{"code":"441900","name":"东莞市","level":"city",
            "bbox":{"min_lat":22660000,"max_lat":23160000,"min_lon":113520000,"max_lon":114260000}}"#;
        let d: Division = serde_json::from_str(json).unwrap();
        assert_eq!(d.level, DivisionLevel::City);
        assert!(d.name_en.is_empty());
        assert!(d.city_code.is_none());
        assert!(d.geometry.is_none());
    }
}
