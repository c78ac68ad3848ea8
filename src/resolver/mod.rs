//! Local administrative-region resolver.
//!
//! Resolves a WGS84 coordinate to province / city / district using only the
//! division store: capability detection picks a lookup strategy, the
//! locator collects candidate divisions, and the hierarchy resolver turns
//! the candidates into one consistent result.

mod capability;
mod hierarchy;
mod locator;
pub mod rules;
mod service;
mod stats;

pub use capability::{CapabilityDetector, CapabilityState};
pub use hierarchy::HierarchyResolver;
pub use locator::{CandidateLocator, Candidates, LocateError, Strategy};
pub use service::RegionResolver;
pub use stats::{ResolverStats, StatsSnapshot};

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How the resolver chooses between exact and approximate lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ResolverMode {
    /// Exact when the store supports it, approximate otherwise
    #[default]
    Auto,
    /// Always attempt polygon containment first
    Exact,
    /// Bounding-box filtering only
    Approximate,
}

/// Resolver settings, read from the `[resolver]` config section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub mode: ResolverMode,

    /// Per store query timeout in milliseconds
    pub query_timeout_ms: u64,

    /// Concurrent resolutions for batch requests
    pub concurrency: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            mode: ResolverMode::Auto,
            query_timeout_ms: 2_000,
            concurrency: 16,
        }
    }
}

impl ResolverConfig {
    pub fn with_mode(mut self, mode: ResolverMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }
}
