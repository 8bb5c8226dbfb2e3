//! In-memory cache for hot lookups.
//!
//! Uses moka's concurrent cache implementation.

use moka::sync::Cache;

/// Thread-safe bounded cache.
///
/// Sits in front of the trigger registrations so that the admission check of
/// an inbound trigger request is answered without a store round trip.
#[derive(Clone)]
pub struct MemCache<K, V> {
    entries: Cache<K, V>,
}

impl<K, V> MemCache<K, V>
where
    K: std::hash::Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Allocate a new [`MemCache`] holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Cache::new(capacity as u64),
        }
    }

    pub fn set(
        &self,
        key: K,
        value: V,
    ) {
        self.entries.insert(key, value);
    }

    pub fn get(
        &self,
        key: &K,
    ) -> Option<V> {
        self.entries.get(key)
    }

    pub fn remove(
        &self,
        key: &K,
    ) {
        self.entries.invalidate(key);
    }
}
