//! In-memory division store backed by R-tree indexes.

use async_trait::async_trait;
use rstar::{RTree, RTreeObject, AABB};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{info, warn};

use super::{DivisionStore, StoreError};
use crate::models::{BoundaryGeometry, Division, DivisionLevel};

/// A division record with its decoded boundary
#[derive(Debug)]
struct StoredDivision {
    division: Division,
    geometry: Option<BoundaryGeometry>,
}

/// R-tree entry over scaled integer bboxes (approximate queries)
#[derive(Clone)]
struct BboxEntry {
    entry: Arc<StoredDivision>,
    envelope: AABB<[i64; 2]>,
}

impl RTreeObject for BboxEntry {
    type Envelope = AABB<[i64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// R-tree entry over boundary extents in degrees (exact queries)
#[derive(Clone)]
struct ShapeEntry {
    entry: Arc<StoredDivision>,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for ShapeEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Division store held entirely in memory.
pub struct MemoryDivisionStore {
    bbox_tree: RTree<BboxEntry>,
    shape_tree: RTree<ShapeEntry>,
    by_code: HashMap<String, Arc<StoredDivision>>,
    spatial_support: bool,
    valid_geometries: usize,
}

impl MemoryDivisionStore {
    /// Build the store from division records.
    ///
    /// Boundary polygons are decoded up front. A record without a bbox gets
    /// one from its polygon when the polygon is valid.
    pub fn build(divisions: Vec<Division>) -> Self {
        info!("Building division index for {} records...", divisions.len());

        let mut by_code: HashMap<String, Arc<StoredDivision>> =
            HashMap::with_capacity(divisions.len());

        for mut division in divisions {
            let geometry = division.geometry.take().map(|c| BoundaryGeometry::from_coords(&c));

            if division.bbox.is_none() {
                division.bbox = geometry.as_ref().and_then(|g| g.bbox());
            }

            let code = division.code.clone();
            let entry = Arc::new(StoredDivision { division, geometry });
            if by_code.insert(code.clone(), entry).is_some() {
                warn!("Duplicate division code {}, keeping the last record", code);
            }
        }

        let mut bbox_entries = Vec::new();
        let mut shape_entries = Vec::new();
        let mut valid_geometries = 0;
        let mut malformed = 0;
        let mut by_level: BTreeMap<DivisionLevel, usize> = BTreeMap::new();

        for entry in by_code.values() {
            let division = &entry.division;
            *by_level.entry(division.level).or_default() += 1;

            let shape_envelope = match &entry.geometry {
                Some(geometry @ BoundaryGeometry::Valid(_)) => {
                    valid_geometries += 1;
                    geometry.bbox().map(|b| b.corners())
                }
                Some(BoundaryGeometry::Malformed(reason)) => {
                    malformed += 1;
                    warn!("Malformed boundary for {}: {}", division.code, reason);
                    division.bbox.filter(|b| b.is_valid()).map(|b| b.corners())
                }
                None => None,
            };

            if let Some(bbox) = division.bbox.filter(|b| b.is_valid()) {
                bbox_entries.push(BboxEntry {
                    entry: Arc::clone(entry),
                    envelope: AABB::from_corners(
                        [bbox.min_lon, bbox.min_lat],
                        [bbox.max_lon, bbox.max_lat],
                    ),
                });
            }

            if let Some((min, max)) = shape_envelope {
                shape_entries.push(ShapeEntry {
                    entry: Arc::clone(entry),
                    envelope: AABB::from_corners(min, max),
                });
            }
        }

        let bbox_tree = RTree::bulk_load(bbox_entries);
        let shape_tree = RTree::bulk_load(shape_entries);

        info!(
            "Division index built: {} records, {} with bbox, {} with valid geometry ({} malformed)",
            by_code.len(),
            bbox_tree.size(),
            valid_geometries,
            malformed
        );
        for (level, count) in &by_level {
            info!("  {}: {} records", level, count);
        }

        Self {
            bbox_tree,
            shape_tree,
            by_code,
            spatial_support: true,
            valid_geometries,
        }
    }

    /// Enable or disable exact polygon queries regardless of stored data.
    pub fn with_spatial_support(mut self, enabled: bool) -> Self {
        self.spatial_support = enabled;
        self
    }

    /// Get total number of records
    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }

    fn lookup_bbox(&self, lat_scaled: i64, lon_scaled: i64) -> Vec<Division> {
        let query_envelope = AABB::from_point([lon_scaled, lat_scaled]);

        let mut found: Vec<Division> = self
            .bbox_tree
            .locate_in_envelope_intersecting(&query_envelope)
            .filter(|e| {
                e.entry
                    .division
                    .bbox
                    .map(|b| b.contains_scaled(lat_scaled, lon_scaled))
                    .unwrap_or(false)
            })
            .map(|e| e.entry.division.clone())
            .collect();

        found.sort_by(|a, b| a.code.cmp(&b.code));
        found
    }

    fn lookup_exact(&self, lat: f64, lon: f64) -> Result<Vec<Division>, StoreError> {
        if !self.spatial_support {
            return Err(StoreError::Unsupported);
        }

        let query_envelope = AABB::from_point([lon, lat]);
        let mut found = Vec::new();

        for e in self.shape_tree.locate_in_envelope_intersecting(&query_envelope) {
            let Some(geometry) = &e.entry.geometry else {
                continue;
            };
            match geometry.contains(lat, lon) {
                Ok(true) => found.push(e.entry.division.clone()),
                Ok(false) => {}
                Err(reason) => {
                    return Err(StoreError::MalformedGeometry {
                        code: e.entry.division.code.clone(),
                        reason,
                    })
                }
            }
        }

        found.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(found)
    }
}

#[async_trait]
impl DivisionStore for MemoryDivisionStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn find_by_bbox(
        &self,
        lat_scaled: i64,
        lon_scaled: i64,
    ) -> Result<Vec<Division>, StoreError> {
        Ok(self.lookup_bbox(lat_scaled, lon_scaled))
    }

    async fn find_by_point_exact(&self, lat: f64, lon: f64) -> Result<Vec<Division>, StoreError> {
        self.lookup_exact(lat, lon)
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Division>, StoreError> {
        Ok(self.by_code.get(code).map(|e| e.division.clone()))
    }

    async fn has_exact_geometry_support(&self) -> Result<bool, StoreError> {
        Ok(self.spatial_support && self.valid_geometries > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{scale_coord, MultiPolygonCoords, ScaledBbox};

    fn square(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> MultiPolygonCoords {
        vec![vec![vec![
            [min_lon, min_lat],
            [max_lon, min_lat],
            [max_lon, max_lat],
            [min_lon, max_lat],
        ]]]
    }

    fn with_geometry(code: &str, level: DivisionLevel, coords: MultiPolygonCoords) -> Division {
        let mut d = Division::new(code, code, level);
        d.geometry = Some(coords);
        d
    }

    #[tokio::test]
    async fn test_empty_store() {
        let store = MemoryDivisionStore::build(vec![]);
        assert!(store.is_empty());
        assert!(store.find_by_bbox(0, 0).await.unwrap().is_empty());
        assert!(!store.has_exact_geometry_support().await.unwrap());
    }

    #[tokio::test]
    async fn test_bbox_derived_from_geometry() {
        let store = MemoryDivisionStore::build(vec![with_geometry(
            "110101",
            DivisionLevel::District,
            square(116.0, 39.0, 117.0, 40.0),
        )]);

        let d = store.find_by_code("110101").await.unwrap().unwrap();
        assert_eq!(d.bbox, Some(ScaledBbox::from_degrees(116.0, 39.0, 117.0, 40.0)));
        assert!(d.geometry.is_none());

        let hits = store
            .find_by_bbox(scale_coord(39.5), scale_coord(116.5))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_exact_excludes_bbox_corner() {
        // Triangle covering the lower-left half of its bbox
        let triangle = vec![vec![vec![[0.0, 0.0], [2.0, 0.0], [0.0, 2.0]]]];
        let store = MemoryDivisionStore::build(vec![with_geometry(
            "100001",
            DivisionLevel::District,
            triangle,
        )]);

        assert_eq!(store.find_by_point_exact(0.5, 0.5).await.unwrap().len(), 1);
        assert!(store.find_by_point_exact(1.8, 1.8).await.unwrap().is_empty());
        assert_eq!(
            store
                .find_by_bbox(scale_coord(1.8), scale_coord(1.8))
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_malformed_geometry_fails_exact_query() {
        let mut broken = Division::new("100002", "broken", DivisionLevel::District);
        broken.bbox = Some(ScaledBbox::from_degrees(0.0, 0.0, 1.0, 1.0));
        broken.geometry = Some(vec![vec![vec![[0.0, 0.0], [1.0, 1.0]]]]);

        let store = MemoryDivisionStore::build(vec![
            broken,
            with_geometry("100000", DivisionLevel::Province, square(-5.0, -5.0, 5.0, 5.0)),
        ]);

        assert!(store.has_exact_geometry_support().await.unwrap());
        let err = store.find_by_point_exact(0.5, 0.5).await.unwrap_err();
        assert!(matches!(err, StoreError::MalformedGeometry { ref code, .. } if code == "100002"));

        // Points away from the broken record still work
        assert_eq!(store.find_by_point_exact(3.0, 3.0).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_spatial_support_disabled() {
        let store = MemoryDivisionStore::build(vec![with_geometry(
            "110101",
            DivisionLevel::District,
            square(116.0, 39.0, 117.0, 40.0),
        )])
        .with_spatial_support(false);

        assert!(!store.has_exact_geometry_support().await.unwrap());
        assert!(matches!(
            store.find_by_point_exact(39.5, 116.5).await,
            Err(StoreError::Unsupported)
        ));
    }

    #[tokio::test]
    async fn test_duplicate_code_keeps_last_record_only() {
        let mut first = Division::new("440304", "旧福田区", DivisionLevel::District);
        first.bbox = Some(ScaledBbox::from_degrees(113.98, 22.50, 114.10, 22.59));
        let mut second = Division::new("440304", "福田区", DivisionLevel::District);
        second.bbox = Some(ScaledBbox::from_degrees(114.00, 22.50, 114.10, 22.59));

        let store = MemoryDivisionStore::build(vec![first, second]);
        assert_eq!(store.len(), 1);

        let hits = store
            .find_by_bbox(scale_coord(22.55), scale_coord(114.05))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "福田区");

        // Only the replaced record's bbox covered this point
        assert!(store
            .find_by_bbox(scale_coord(22.55), scale_coord(113.99))
            .await
            .unwrap()
            .is_empty());
    }
}
