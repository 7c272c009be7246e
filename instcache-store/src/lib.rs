//! Slot store for instcache.
//!
//! Capacity-bounded, namespace-aware keyed storage with LRU displacement.
//! Several domain caches may share one store; each clears only its own
//! namespace.

mod store;

pub use store::{LruSlotStore, StoreConfig};
