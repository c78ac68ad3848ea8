//! Geocoding provider contract.
//!
//! Every provider answers `(lat, lon) -> LocationInfo` and reports failures
//! through `memo` instead of returning errors, so callers can swap providers
//! without branching on type.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::LocationInfo;
use crate::resolver::RegionResolver;

/// Memo returned when geocoding is switched off.
pub const MEMO_DISABLED: &str = "geocoding disabled";

/// Reverse geocoding provider.
#[async_trait]
pub trait GeocodingProvider: Send + Sync {
    /// Provider identifier for logs
    fn name(&self) -> &'static str;

    /// Reverse geocode a WGS84 point. Never fails.
    async fn reverse(&self, lat: f64, lon: f64) -> LocationInfo;
}

#[async_trait]
impl GeocodingProvider for RegionResolver {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn reverse(&self, lat: f64, lon: f64) -> LocationInfo {
        RegionResolver::reverse(self, lat, lon).await
    }
}

/// Provider selection in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Local division store
    #[default]
    Local,
    /// No geocoding
    Disabled,
}

/// Configured geocoding provider.
pub enum Provider {
    Local(RegionResolver),
    Disabled,
}

impl Provider {
    pub fn kind(&self) -> ProviderKind {
        match self {
            Provider::Local(_) => ProviderKind::Local,
            Provider::Disabled => ProviderKind::Disabled,
        }
    }

    /// Local resolver, if this provider is backed by one
    pub fn resolver(&self) -> Option<&RegionResolver> {
        match self {
            Provider::Local(resolver) => Some(resolver),
            Provider::Disabled => None,
        }
    }
}

#[async_trait]
impl GeocodingProvider for Provider {
    fn name(&self) -> &'static str {
        match self {
            Provider::Local(resolver) => GeocodingProvider::name(resolver),
            Provider::Disabled => "disabled",
        }
    }

    async fn reverse(&self, lat: f64, lon: f64) -> LocationInfo {
        match self {
            Provider::Local(resolver) => resolver.reverse(lat, lon).await,
            Provider::Disabled => LocationInfo::with_memo(MEMO_DISABLED),
        }
    }
}
