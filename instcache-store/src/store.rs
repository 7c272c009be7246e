//! In-memory LRU slot store.

use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::trace;

use instcache_core::constants::SHARED_INSTANCES_CACHE_DEFAULT_SIZE;
use instcache_core::error::{InstanceCacheError, Result};
use instcache_core::traits::{SlotStore, StoreStats};
use instcache_core::types::{SlotKey, Validity};

const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(SHARED_INSTANCES_CACHE_DEFAULT_SIZE) {
    Some(capacity) => capacity,
    None => panic!("default slot store capacity must be non-zero"),
};

/// Slot held by the store.
struct Slot<V> {
    validity: Validity,
    value: V,
}

/// Store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Maximum number of entries, all namespaces included
    pub capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            capacity: SHARED_INSTANCES_CACHE_DEFAULT_SIZE,
        }
    }
}

impl StoreConfig {
    /// Creates a config with the given capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self { capacity }
    }
}

struct Inner<V> {
    slots: LruCache<SlotKey, Slot<V>>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

/// Capacity-bounded slot store with least-recently-used displacement.
///
/// Thread-safe; every operation takes one short internal lock. A successful
/// `find_valid` counts as a use and protects the key from displacement.
pub struct LruSlotStore<V> {
    inner: Mutex<Inner<V>>,
}

impl<V: Clone + Send> LruSlotStore<V> {
    /// Creates a store with the default capacity of 10 entries.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a store holding at most `capacity` entries.
    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                slots: LruCache::new(capacity),
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
        }
    }

    /// Creates a store from configuration.
    ///
    /// Fails with `ConfigError` when the capacity is zero.
    pub fn with_config(config: &StoreConfig) -> Result<Self> {
        let capacity = NonZeroUsize::new(config.capacity).ok_or_else(|| {
            InstanceCacheError::ConfigError("slot store capacity must be at least 1".into())
        })?;
        Ok(Self::with_capacity(capacity))
    }

    /// Returns the maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.inner.lock().slots.cap().get()
    }

    /// Returns the keys currently held, most recently used first.
    pub fn keys(&self) -> Vec<SlotKey> {
        self.inner.lock().slots.iter().map(|(k, _)| k.clone()).collect()
    }
}

impl<V: Clone + Send> Default for LruSlotStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + Send> SlotStore<V> for LruSlotStore<V> {
    fn insert(&self, key: SlotKey, validity: Validity, value: V) -> Option<SlotKey> {
        let mut inner = self.inner.lock();
        let displaced = inner
            .slots
            .push(key.clone(), Slot { validity, value })
            .map(|(old_key, _)| old_key)
            .filter(|old_key| *old_key != key);

        if let Some(ref evicted) = displaced {
            inner.evictions += 1;
            trace!(key = %evicted, "Displaced slot");
        }
        displaced
    }

    fn find_valid(&self, key: &SlotKey, validity: Validity) -> Option<V> {
        let mut inner = self.inner.lock();
        let found = inner
            .slots
            .get(key)
            .filter(|slot| slot.validity == validity)
            .map(|slot| slot.value.clone());

        match found {
            Some(_) => inner.hits += 1,
            None => inner.misses += 1,
        }
        found
    }

    fn contains(&self, key: &SlotKey) -> bool {
        self.inner.lock().slots.contains(key)
    }

    fn remove(&self, key: &SlotKey) -> bool {
        self.inner.lock().slots.pop(key).is_some()
    }

    fn remove_all(&self, namespace: &str) -> usize {
        let mut inner = self.inner.lock();
        let doomed: Vec<SlotKey> = inner
            .slots
            .iter()
            .filter(|(k, _)| k.namespace() == namespace)
            .map(|(k, _)| k.clone())
            .collect();

        for key in &doomed {
            inner.slots.pop(key);
        }
        doomed.len()
    }

    fn len(&self) -> usize {
        self.inner.lock().slots.len()
    }

    fn stats(&self) -> StoreStats {
        let inner = self.inner.lock();
        StoreStats {
            entries: inner.slots.len(),
            capacity: inner.slots.cap().get(),
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
        }
    }
}
