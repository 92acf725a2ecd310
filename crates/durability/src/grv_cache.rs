//! Process-wide GRV (Get-Read-Version) cache (spec §4.9, §5).
//!
//! A mutex-guarded record of the latest observed committed version and the
//! wall-clock time it was observed, supporting bounded-staleness reuse so a
//! read-only transaction can skip a network round trip to the KV store.
//! Grounded on the teacher's single global `AtomicU64` version counter
//! (`strata_concurrency::manager::TransactionManager::version`), generalized
//! from "the" version to "the latest *observed*" version plus an age bound.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

struct Observation {
    version: u64,
    observed_at: Instant,
}

/// Caches the most recently observed committed version, swappable per
/// container instance (spec §9: "expose it as a process-wide singleton
/// guarded by a mutex ... and make it swappable for tests" — here that
/// means "one instance per `Container`", not a literal global, so tests
/// never share state across containers).
pub struct GrvCache {
    state: Mutex<Option<Observation>>,
}

impl Default for GrvCache {
    fn default() -> Self {
        Self::new()
    }
}

impl GrvCache {
    /// An empty cache.
    pub fn new() -> Self {
        Self { state: Mutex::new(None) }
    }

    /// Record a newly observed committed version. Only advances forward —
    /// an older or equal version from a race never overwrites a newer one.
    pub fn record_committed_version(&self, version: u64) {
        let mut guard = self.state.lock();
        let should_update = match &*guard {
            Some(obs) => version >= obs.version,
            None => true,
        };
        if should_update {
            *guard = Some(Observation { version, observed_at: Instant::now() });
        }
    }

    /// Return a cached version if it is no older than `max_staleness`.
    pub fn cached_version_within(&self, max_staleness: Duration) -> Option<u64> {
        let guard = self.state.lock();
        guard.as_ref().and_then(|obs| {
            if obs.observed_at.elapsed() <= max_staleness {
                Some(obs.version)
            } else {
                None
            }
        })
    }

    /// Manual invalidation, and the automatic path taken on a `too_old`
    /// error from the KV driver (spec §4.9).
    pub fn invalidate(&self) {
        *self.state.lock() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reuse_within_bound() {
        let cache = GrvCache::new();
        cache.record_committed_version(42);
        assert_eq!(cache.cached_version_within(Duration::from_secs(5)), Some(42));
    }

    #[test]
    fn stale_beyond_bound_is_none() {
        let cache = GrvCache::new();
        cache.record_committed_version(42);
        assert_eq!(cache.cached_version_within(Duration::from_secs(0)), None);
    }

    #[test]
    fn invalidate_clears() {
        let cache = GrvCache::new();
        cache.record_committed_version(7);
        cache.invalidate();
        assert_eq!(cache.cached_version_within(Duration::from_secs(100)), None);
    }

    #[test]
    fn never_moves_backwards() {
        let cache = GrvCache::new();
        cache.record_committed_version(10);
        cache.record_committed_version(5);
        assert_eq!(cache.cached_version_within(Duration::from_secs(5)), Some(10));
    }
}
