//! Detection of exact-geometry support in the division store.

use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use tracing::{info, warn};

use crate::store::DivisionStore;

/// Cached outcome of the capability probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityState {
    Unknown,
    ExactAvailable,
    ExactUnavailable,
}

impl CapabilityState {
    fn to_u8(self) -> u8 {
        match self {
            CapabilityState::Unknown => 0,
            CapabilityState::ExactAvailable => 1,
            CapabilityState::ExactUnavailable => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => CapabilityState::ExactAvailable,
            2 => CapabilityState::ExactUnavailable,
            _ => CapabilityState::Unknown,
        }
    }
}

/// Probes the store once and remembers the answer.
///
/// The state moves out of `Unknown` at most once. Concurrent first calls may
/// both probe; only the first write lands and the others read it back.
#[derive(Debug)]
pub struct CapabilityDetector {
    state: AtomicU8,
    probe_timeout: Duration,
}

impl CapabilityDetector {
    pub fn new(probe_timeout: Duration) -> Self {
        Self {
            state: AtomicU8::new(CapabilityState::Unknown.to_u8()),
            probe_timeout,
        }
    }

    pub fn state(&self) -> CapabilityState {
        CapabilityState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Whether exact containment queries are usable.
    ///
    /// Probe errors and timeouts count as "unavailable" and are cached like
    /// any other answer.
    pub async fn detect(&self, store: &dyn DivisionStore) -> bool {
        match self.state() {
            CapabilityState::ExactAvailable => return true,
            CapabilityState::ExactUnavailable => return false,
            CapabilityState::Unknown => {}
        }

        let available =
            match tokio::time::timeout(self.probe_timeout, store.has_exact_geometry_support())
                .await
            {
                Ok(Ok(available)) => available,
                Ok(Err(e)) => {
                    warn!("Capability probe on {} store failed: {}", store.name(), e);
                    false
                }
                Err(_) => {
                    warn!(
                        "Capability probe on {} store timed out after {:?}",
                        store.name(),
                        self.probe_timeout
                    );
                    false
                }
            };

        let probed = if available {
            CapabilityState::ExactAvailable
        } else {
            CapabilityState::ExactUnavailable
        };

        if self
            .state
            .compare_exchange(
                CapabilityState::Unknown.to_u8(),
                probed.to_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
        {
            info!(
                "Exact geometry support on {} store: {}",
                store.name(),
                if available { "available" } else { "unavailable" }
            );
        }

        self.state() == CapabilityState::ExactAvailable
    }
}
