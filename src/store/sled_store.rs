//! Persistent division store on top of sled.
//!
//! Layout:
//! - tree `divisions`: code -> JSON division record (no geometry)
//! - tree `geometry`: code -> JSON multipolygon coordinates
//!
//! The `geometry` tree only exists once a snapshot with boundary polygons
//! has been imported.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, info};

use super::{DivisionStore, StoreError};
use crate::models::{scale_coord, BoundaryGeometry, Division, MultiPolygonCoords};

const DIVISIONS_TREE: &str = "divisions";
const GEOMETRY_TREE: &str = "geometry";

/// Division store persisted in a sled database directory.
#[derive(Clone)]
pub struct SledDivisionStore {
    db: sled::Db,
}

impl SledDivisionStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening division database at {}", path.display());
        let db = sled::open(path).context("Failed to open division database")?;
        Ok(Self { db })
    }

    /// Write a snapshot of division records, replacing records with the same code.
    ///
    /// Returns the number of records written.
    pub fn import(&self, divisions: Vec<Division>) -> Result<usize> {
        let divisions_tree = self.db.open_tree(DIVISIONS_TREE)?;
        // Open the geometry tree when there is something to write or an
        // older polygon that may need clearing.
        let geometry_tree =
            if has_geometry_tree(&self.db) || divisions.iter().any(|d| d.geometry.is_some()) {
                Some(self.db.open_tree(GEOMETRY_TREE)?)
            } else {
                None
            };
        let mut written = 0;

        for mut division in divisions {
            let coords = division.geometry.take();

            if division.bbox.is_none() {
                division.bbox = coords
                    .as_ref()
                    .and_then(|c| BoundaryGeometry::from_coords(c).bbox());
            }

            let record = serde_json::to_vec(&division)
                .with_context(|| format!("Failed to encode division {}", division.code))?;
            divisions_tree.insert(division.code.as_bytes(), record)?;

            if let Some(tree) = &geometry_tree {
                match coords {
                    Some(coords) => {
                        tree.insert(division.code.as_bytes(), serde_json::to_vec(&coords)?)?;
                    }
                    None => {
                        tree.remove(division.code.as_bytes())?;
                    }
                }
            }

            written += 1;
        }

        self.db.flush()?;
        info!("Imported {} divisions", written);
        Ok(written)
    }

    /// Number of stored division records
    pub fn len(&self) -> Result<usize> {
        Ok(self.db.open_tree(DIVISIONS_TREE)?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&sled::Db) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?
    }
}

fn has_geometry_tree(db: &sled::Db) -> bool {
    db.tree_names()
        .iter()
        .any(|name| &name[..] == GEOMETRY_TREE.as_bytes())
}

fn decode_division(key: &[u8], value: &[u8]) -> Result<Division, StoreError> {
    serde_json::from_slice(value).map_err(|e| StoreError::Corrupt {
        key: String::from_utf8_lossy(key).into_owned(),
        reason: e.to_string(),
    })
}

fn scan_bbox(db: &sled::Db, lat_scaled: i64, lon_scaled: i64) -> Result<Vec<Division>, StoreError> {
    let tree = db.open_tree(DIVISIONS_TREE)?;
    let mut found = Vec::new();

    for item in tree.iter() {
        let (key, value) = item?;
        let division = decode_division(&key, &value)?;
        let inside = division
            .bbox
            .map(|b| b.contains_scaled(lat_scaled, lon_scaled))
            .unwrap_or(false);
        if inside {
            found.push(division);
        }
    }

    Ok(found)
}

fn scan_exact(db: &sled::Db, lat: f64, lon: f64) -> Result<Vec<Division>, StoreError> {
    if !has_geometry_tree(db) {
        return Err(StoreError::Unsupported);
    }
    let geometry = db.open_tree(GEOMETRY_TREE)?;

    let mut found = Vec::new();
    for division in scan_bbox(db, scale_coord(lat), scale_coord(lon))? {
        let Some(raw) = geometry.get(division.code.as_bytes())? else {
            continue;
        };
        let coords: MultiPolygonCoords =
            serde_json::from_slice(&raw).map_err(|e| StoreError::Corrupt {
                key: division.code.clone(),
                reason: e.to_string(),
            })?;

        match BoundaryGeometry::from_coords(&coords).contains(lat, lon) {
            Ok(true) => found.push(division),
            Ok(false) => {}
            Err(reason) => {
                return Err(StoreError::MalformedGeometry {
                    code: division.code,
                    reason,
                })
            }
        }
    }

    Ok(found)
}

#[async_trait]
impl DivisionStore for SledDivisionStore {
    fn name(&self) -> &'static str {
        "sled"
    }

    async fn find_by_bbox(
        &self,
        lat_scaled: i64,
        lon_scaled: i64,
    ) -> Result<Vec<Division>, StoreError> {
        self.blocking(move |db| scan_bbox(db, lat_scaled, lon_scaled))
            .await
    }

    async fn find_by_point_exact(&self, lat: f64, lon: f64) -> Result<Vec<Division>, StoreError> {
        self.blocking(move |db| scan_exact(db, lat, lon)).await
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Division>, StoreError> {
        let code = code.to_string();
        self.blocking(move |db| {
            let tree = db.open_tree(DIVISIONS_TREE)?;
            match tree.get(code.as_bytes())? {
                Some(value) => decode_division(code.as_bytes(), &value).map(Some),
                None => Ok(None),
            }
        })
        .await
    }

    async fn has_exact_geometry_support(&self) -> Result<bool, StoreError> {
        self.blocking(|db| {
            if !has_geometry_tree(db) {
                debug!("No geometry tree in division database");
                return Ok(false);
            }
            Ok(!db.open_tree(GEOMETRY_TREE)?.is_empty())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DivisionLevel, ScaledBbox};

    fn district(code: &str, bbox: ScaledBbox) -> Division {
        let mut d = Division::new(code, code, DivisionLevel::District);
        d.bbox = Some(bbox);
        d
    }

    #[tokio::test]
    async fn test_bbox_only_import_has_no_exact_support() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledDivisionStore::open(dir.path()).unwrap();
        store
            .import(vec![district(
                "110101",
                ScaledBbox::from_degrees(116.0, 39.0, 117.0, 40.0),
            )])
            .unwrap();

        assert_eq!(store.len().unwrap(), 1);
        assert!(!store.has_exact_geometry_support().await.unwrap());
        assert!(matches!(
            store.find_by_point_exact(39.5, 116.5).await,
            Err(StoreError::Unsupported)
        ));

        let hits = store
            .find_by_bbox(scale_coord(39.5), scale_coord(116.5))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].code, "110101");
    }

    #[tokio::test]
    async fn test_geometry_import_splits_record_and_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledDivisionStore::open(dir.path()).unwrap();
        let mut d = Division::new("441900", "东莞市", DivisionLevel::City);
        d.geometry = Some(vec![vec![vec![
            [113.5, 22.6],
            [114.3, 22.6],
            [114.3, 23.2],
            [113.5, 23.2],
        ]]]);
        store.import(vec![d]).unwrap();

        assert!(store.has_exact_geometry_support().await.unwrap());

        let d = store.find_by_code("441900").await.unwrap().unwrap();
        assert_eq!(d.name, "东莞市");
        assert!(d.geometry.is_none());
        assert_eq!(d.bbox, Some(ScaledBbox::from_degrees(113.5, 22.6, 114.3, 23.2)));

        let hits = store.find_by_point_exact(23.0, 113.8).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(store.find_by_point_exact(30.0, 113.8).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_geometry_row_fails_exact_query() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledDivisionStore::open(dir.path()).unwrap();
        store
            .import(vec![district(
                "110101",
                ScaledBbox::from_degrees(116.0, 39.0, 117.0, 40.0),
            )])
            .unwrap();
        store
            .db
            .open_tree(GEOMETRY_TREE)
            .unwrap()
            .insert("110101", "not json")
            .unwrap();

        assert!(store.has_exact_geometry_support().await.unwrap());
        assert!(matches!(
            store.find_by_point_exact(39.5, 116.5).await,
            Err(StoreError::Corrupt { .. })
        ));
        // The bbox path is unaffected
        assert_eq!(
            store
                .find_by_bbox(scale_coord(39.5), scale_coord(116.5))
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_reimport_without_geometry_clears_old_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledDivisionStore::open(dir.path()).unwrap();
        let mut d = Division::new("110101", "东城区", DivisionLevel::District);
        d.geometry = Some(vec![vec![vec![
            [116.0, 39.0],
            [117.0, 39.0],
            [117.0, 40.0],
            [116.0, 40.0],
        ]]]);
        store.import(vec![d]).unwrap();
        assert!(store.has_exact_geometry_support().await.unwrap());

        store
            .import(vec![district(
                "110101",
                ScaledBbox::from_degrees(118.0, 41.0, 119.0, 42.0),
            )])
            .unwrap();

        assert_eq!(store.len().unwrap(), 1);
        assert!(!store.has_exact_geometry_support().await.unwrap());
        assert!(store.find_by_point_exact(39.5, 116.5).await.unwrap().is_empty());
        let hits = store
            .find_by_bbox(scale_coord(41.5), scale_coord(118.5))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
    }
}
