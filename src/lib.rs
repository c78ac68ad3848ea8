//! Quyu - local administrative-region resolver
//!
//! Resolves WGS84 coordinates to province / city / district from locally
//! stored division boundaries, without any external geocoding service.

pub mod config;
pub mod geocoding;
pub mod models;
pub mod resolver;
pub mod store;

pub use geocoding::{GeocodingProvider, Provider};
pub use models::{Division, DivisionLevel, LocationInfo, ResolutionResult};
pub use resolver::{RegionResolver, ResolverConfig, ResolverMode};
