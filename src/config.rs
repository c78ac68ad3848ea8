//! TOML configuration.
//!
//! ```toml
//! provider = "local"
//!
//! [resolver]
//! mode = "auto"            # auto | exact | approximate
//! query_timeout_ms = 2000
//! concurrency = 16
//!
//! [store]
//! backend = "memory"       # memory | sled
//! snapshot = "divisions.json"
//! path = "data/divisions.db"
//! spatial_support = true
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::geocoding::{Provider, ProviderKind};
use crate::resolver::{RegionResolver, ResolverConfig};
use crate::store::{snapshot, DivisionStore, MemoryDivisionStore, SledDivisionStore};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub provider: ProviderKind,
    pub resolver: ResolverConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Snapshot file loaded into memory
    #[default]
    Memory,
    /// Persistent sled database
    Sled,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,

    /// Snapshot file for the memory backend
    pub snapshot: Option<PathBuf>,

    /// Database directory for the sled backend
    pub path: Option<PathBuf>,

    /// Allow exact polygon queries on the memory backend
    pub spatial_support: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            snapshot: None,
            path: None,
            spatial_support: true,
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Open the configured division store.
    pub fn open_store(&self) -> Result<Arc<dyn DivisionStore>> {
        match self.store.backend {
            StoreBackend::Memory => {
                let Some(path) = &self.store.snapshot else {
                    bail!("store.snapshot is required for the memory backend");
                };
                let divisions = snapshot::load_snapshot(path)?;
                let store = MemoryDivisionStore::build(divisions)
                    .with_spatial_support(self.store.spatial_support);
                Ok(Arc::new(store))
            }
            StoreBackend::Sled => {
                let Some(path) = &self.store.path else {
                    bail!("store.path is required for the sled backend");
                };
                Ok(Arc::new(SledDivisionStore::open(path)?))
            }
        }
    }

    /// Build the configured geocoding provider.
    pub fn build_provider(&self) -> Result<Provider> {
        match self.provider {
            ProviderKind::Local => {
                let store = self.open_store()?;
                Ok(Provider::Local(RegionResolver::new(
                    store,
                    self.resolver.clone(),
                )))
            }
            ProviderKind::Disabled => Ok(Provider::Disabled),
        }
    }
}
