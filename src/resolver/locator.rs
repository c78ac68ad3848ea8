//! Candidate lookup: which divisions could contain a point.

use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use super::ResolverStats;
use crate::models::{scale_coord, Division};
use crate::store::{DivisionStore, StoreError};

/// Errors from a single lookup strategy.
#[derive(Error, Debug)]
pub enum LocateError {
    #[error("{strategy:?} lookup failed: {source}")]
    Store {
        strategy: Strategy,
        #[source]
        source: StoreError,
    },

    #[error("{strategy:?} lookup timed out after {timeout:?}")]
    Timeout { strategy: Strategy, timeout: Duration },
}

/// Spatial matching strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Point-in-polygon against stored boundaries
    Exact,
    /// Scaled bounding-box containment; may return overlapping candidates
    Approximate,
}

impl Strategy {
    /// Run this strategy once against the store.
    pub async fn try_locate(
        self,
        store: &dyn DivisionStore,
        lat: f64,
        lon: f64,
        timeout: Duration,
    ) -> Result<Vec<Division>, LocateError> {
        let query = async {
            match self {
                Strategy::Exact => store.find_by_point_exact(lat, lon).await,
                Strategy::Approximate => {
                    store.find_by_bbox(scale_coord(lat), scale_coord(lon)).await
                }
            }
        };

        match tokio::time::timeout(timeout, query).await {
            Ok(Ok(found)) => Ok(found),
            Ok(Err(source)) => Err(LocateError::Store {
                strategy: self,
                source,
            }),
            Err(_) => Err(LocateError::Timeout {
                strategy: self,
                timeout,
            }),
        }
    }
}

/// Candidates for one point and how they were found.
#[derive(Debug, Clone)]
pub struct Candidates {
    pub divisions: Vec<Division>,
    /// Strategy that produced `divisions`
    pub strategy: Strategy,
    /// Exact was requested but the approximate strategy answered
    pub fell_back: bool,
}

/// Runs a strategy with fallback to bounding boxes.
///
/// Exact failures reset the store and retry approximately for that call
/// only. Approximate failures yield an empty candidate set.
#[derive(Debug, Clone)]
pub struct CandidateLocator {
    query_timeout: Duration,
}

impl CandidateLocator {
    pub fn new(query_timeout: Duration) -> Self {
        Self { query_timeout }
    }

    pub async fn locate(
        &self,
        store: &dyn DivisionStore,
        strategy: Strategy,
        lat: f64,
        lon: f64,
        stats: &ResolverStats,
    ) -> Candidates {
        if strategy == Strategy::Exact {
            stats.record_exact();
            match Strategy::Exact
                .try_locate(store, lat, lon, self.query_timeout)
                .await
            {
                Ok(divisions) => {
                    debug!(
                        "Exact lookup at ({}, {}): {} candidates",
                        lat,
                        lon,
                        divisions.len()
                    );
                    return Candidates {
                        divisions,
                        strategy: Strategy::Exact,
                        fell_back: false,
                    };
                }
                Err(e) => {
                    warn!("{}; falling back to bounding boxes", e);
                    stats.record_fallback();
                    if let Err(reset_err) = store.reset().await {
                        warn!("Failed to reset {} store: {}", store.name(), reset_err);
                    }
                }
            }
        }

        stats.record_approximate();
        let divisions = match Strategy::Approximate
            .try_locate(store, lat, lon, self.query_timeout)
            .await
        {
            Ok(divisions) => divisions,
            Err(e) => {
                warn!("{}", e);
                Vec::new()
            }
        };

        debug!(
            "Approximate lookup at ({}, {}): {} candidates",
            lat,
            lon,
            divisions.len()
        );

        Candidates {
            divisions,
            strategy: Strategy::Approximate,
            fell_back: strategy == Strategy::Exact,
        }
    }
}
