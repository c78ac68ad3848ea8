//! Resolver facade: coordinate in, administrative names out.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::debug;

use super::{
    CandidateLocator, CapabilityDetector, CapabilityState, HierarchyResolver, ResolverConfig,
    ResolverMode, ResolverStats, StatsSnapshot, Strategy,
};
use crate::models::{LocationInfo, ResolutionResult, MEMO_INVALID_COORDINATE, MEMO_NOT_FOUND};
use crate::store::DivisionStore;

/// Resolves WGS84 coordinates against a local division store.
///
/// Never fails: problems are reported through the result's `memo`.
pub struct RegionResolver {
    store: Arc<dyn DivisionStore>,
    config: ResolverConfig,
    capability: CapabilityDetector,
    locator: CandidateLocator,
    stats: ResolverStats,
}

impl RegionResolver {
    pub fn new(store: Arc<dyn DivisionStore>, config: ResolverConfig) -> Self {
        let timeout = config.query_timeout();
        Self {
            store,
            capability: CapabilityDetector::new(timeout),
            locator: CandidateLocator::new(timeout),
            stats: ResolverStats::default(),
            config,
        }
    }

    pub fn mode(&self) -> ResolverMode {
        self.config.mode
    }

    /// Cached capability state (`Unknown` until the first auto-mode query)
    pub fn capability(&self) -> CapabilityState {
        self.capability.state()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn store(&self) -> &dyn DivisionStore {
        self.store.as_ref()
    }

    /// Strategy the configured mode selects for the next query
    pub async fn strategy(&self) -> Strategy {
        match self.config.mode {
            ResolverMode::Exact => Strategy::Exact,
            ResolverMode::Approximate => Strategy::Approximate,
            ResolverMode::Auto => {
                if self.capability.detect(self.store.as_ref()).await {
                    Strategy::Exact
                } else {
                    Strategy::Approximate
                }
            }
        }
    }

    /// Resolve a point to province / city / district.
    pub async fn resolve(&self, lat: f64, lon: f64) -> ResolutionResult {
        self.stats.record_query();

        if !is_valid_coordinate(lat, lon) {
            debug!("Rejecting invalid coordinate ({}, {})", lat, lon);
            self.stats.record_not_found();
            return ResolutionResult::failed(MEMO_INVALID_COORDINATE);
        }

        let strategy = self.strategy().await;
        let candidates = self
            .locator
            .locate(self.store.as_ref(), strategy, lat, lon, &self.stats)
            .await;

        let result = HierarchyResolver::new(self.store.as_ref())
            .resolve(&candidates.divisions, lat, lon)
            .await;

        if result.memo == MEMO_NOT_FOUND {
            self.stats.record_not_found();
        }

        debug!(
            "Resolved ({}, {}) via {:?}: {} / {} / {}",
            lat,
            lon,
            candidates.strategy,
            result.province.name,
            result.city.name,
            result.district.name
        );
        result
    }

    /// Resolve and shape into the provider-facing record.
    pub async fn reverse(&self, lat: f64, lon: f64) -> LocationInfo {
        LocationInfo::from(self.resolve(lat, lon).await)
    }

    /// Resolve many points concurrently, keeping input order.
    pub async fn resolve_many(&self, points: &[(f64, f64)]) -> Vec<ResolutionResult> {
        let concurrency = self.config.concurrency.max(1);
        stream::iter(points.iter().copied())
            .map(|(lat, lon)| self.resolve(lat, lon))
            .buffered(concurrency)
            .collect()
            .await
    }
}

fn is_valid_coordinate(lat: f64, lon: f64) -> bool {
    lat.is_finite()
        && lon.is_finite()
        && (-90.0..=90.0).contains(&lat)
        && (-180.0..=180.0).contains(&lon)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Division, DivisionLevel, ScaledBbox};
    use crate::store::MemoryDivisionStore;

    fn store() -> Arc<dyn DivisionStore> {
        let mut province = Division::new("440000", "广东省", DivisionLevel::Province);
        province.name_en = "Guangdong".into();
        province.geometry = Some(vec![vec![vec![
            [109.6, 20.2],
            [117.3, 20.2],
            [117.3, 25.5],
            [109.6, 25.5],
        ]]]);

        let mut city = Division::new("440300", "深圳市", DivisionLevel::City);
        city.province_code = Some("440000".into());
        city.bbox = Some(ScaledBbox::from_degrees(113.7, 22.4, 114.6, 22.9));

        Arc::new(MemoryDivisionStore::build(vec![province, city]))
    }

    #[tokio::test]
    async fn test_invalid_coordinate() {
        let resolver = RegionResolver::new(store(), ResolverConfig::default());
        for (lat, lon) in [(91.0, 0.0), (0.0, 181.0), (f64::NAN, 0.0)] {
            let result = resolver.resolve(lat, lon).await;
            assert!(result.is_empty());
            assert_eq!(result.memo, MEMO_INVALID_COORDINATE);
        }
        assert_eq!(resolver.capability(), CapabilityState::Unknown);
    }

    #[tokio::test]
    async fn test_auto_mode_probes_once() {
        let resolver = RegionResolver::new(store(), ResolverConfig::default());
        assert_eq!(resolver.strategy().await, Strategy::Exact);
        assert_eq!(resolver.capability(), CapabilityState::ExactAvailable);
    }

    #[tokio::test]
    async fn test_approximate_mode_never_probes() {
        let config = ResolverConfig::default().with_mode(ResolverMode::Approximate);
        let resolver = RegionResolver::new(store(), config);

        let result = resolver.resolve(22.6, 114.0).await;
        assert_eq!(result.city.name, "深圳市");
        assert_eq!(result.province.name, "广东省");
        assert_eq!(resolver.capability(), CapabilityState::Unknown);
        assert_eq!(resolver.stats().approximate_queries, 1);
    }

    #[tokio::test]
    async fn test_reverse_shapes_output() {
        let resolver = RegionResolver::new(store(), ResolverConfig::default());
        let info = resolver.reverse(24.0, 113.0).await;
        assert_eq!(info.province, "广东省");
        assert_eq!(info.province_en, "Guangdong");
        assert!(info.city.is_empty());
        assert!(info.road_name.is_empty());
        assert!(info.memo.is_empty());
    }

    #[tokio::test]
    async fn test_resolve_many_keeps_order() {
        let resolver = RegionResolver::new(store(), ResolverConfig::default());
        let results = resolver
            .resolve_many(&[(0.0, 0.0), (24.0, 113.0), (91.0, 0.0)])
            .await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].memo, MEMO_NOT_FOUND);
        assert_eq!(results[1].province.name, "广东省");
        assert_eq!(results[2].memo, MEMO_INVALID_COORDINATE);
        assert_eq!(resolver.stats().queries, 3);
        assert_eq!(resolver.stats().not_found, 2);
    }
}
