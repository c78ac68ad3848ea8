//! Division store: read-only access to administrative division records.
//!
//! The resolver only ever reads from a store. Two backends are provided:
//! an in-memory R-tree index built from a snapshot file, and a persistent
//! sled database.

mod memory;
mod sled_store;
pub mod snapshot;

pub use memory::MemoryDivisionStore;
pub use sled_store::SledDivisionStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::Division;

/// Errors raised by a division store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backing storage cannot be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A stored boundary polygon could not be evaluated.
    #[error("Malformed geometry for {code}: {reason}")]
    MalformedGeometry { code: String, reason: String },

    /// The store has no exact geometry support.
    #[error("Exact geometry queries are not supported by this store")]
    Unsupported,

    /// A stored record could not be decoded.
    #[error("Corrupt record {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("Storage error: {0}")]
    Io(#[from] sled::Error),

    #[error("Store query timed out")]
    Timeout,
}

/// Read access to administrative divisions.
#[async_trait]
pub trait DivisionStore: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// All divisions whose scaled bbox contains the scaled point.
    async fn find_by_bbox(&self, lat_scaled: i64, lon_scaled: i64)
        -> Result<Vec<Division>, StoreError>;

    /// All divisions whose boundary polygon contains the point.
    async fn find_by_point_exact(&self, lat: f64, lon: f64) -> Result<Vec<Division>, StoreError>;

    async fn find_by_code(&self, code: &str) -> Result<Option<Division>, StoreError>;

    /// Whether exact containment queries can be answered.
    ///
    /// Requires both spatial support in the backend and at least one
    /// stored boundary polygon.
    async fn has_exact_geometry_support(&self) -> Result<bool, StoreError>;

    /// Return the store to a clean state after a failed query.
    async fn reset(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
