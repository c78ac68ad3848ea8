use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for resolver activity.
#[derive(Debug, Default)]
pub struct ResolverStats {
    queries: AtomicU64,
    exact_queries: AtomicU64,
    approximate_queries: AtomicU64,
    exact_fallbacks: AtomicU64,
    not_found: AtomicU64,
}

/// Point-in-time copy of [`ResolverStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub queries: u64,
    pub exact_queries: u64,
    pub approximate_queries: u64,
    pub exact_fallbacks: u64,
    pub not_found: u64,
}

impl ResolverStats {
    pub fn record_query(&self) {
        self.queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_exact(&self) {
        self.exact_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_approximate(&self) {
        self.approximate_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fallback(&self) {
        self.exact_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_not_found(&self) {
        self.not_found.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            queries: self.queries.load(Ordering::Relaxed),
            exact_queries: self.exact_queries.load(Ordering::Relaxed),
            approximate_queries: self.approximate_queries.load(Ordering::Relaxed),
            exact_fallbacks: self.exact_fallbacks.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
        }
    }
}
