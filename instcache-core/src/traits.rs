//! Collaborator traits for the shared instance cache.
//!
//! The cache orchestrates four collaborators, each behind a trait so that
//! tests and embedders can substitute their own:
//!
//! - [`SlotStore`]: capacity-bounded keyed storage
//! - [`Fetcher`] / [`ResponseBody`]: HTTP retrieval
//! - [`DocumentParser`]: bytes to immutable tree
//! - [`Clock`]: wall-clock time for admission and expiry

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{ParsedDocument, SlotKey, Validity};

// ═══════════════════════════════════════════════════════════════════════════════
// SLOT STORE TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Snapshot of slot store counters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Entries currently held
    pub entries: usize,
    /// Maximum number of entries
    pub capacity: usize,
    /// `find_valid` calls that returned a value
    pub hits: u64,
    /// `find_valid` calls that returned nothing
    pub misses: u64,
    /// Entries displaced by capacity pressure
    pub evictions: u64,
}

/// Capacity-bounded mapping from composite keys to values.
///
/// All operations take `&self` and must be safe to call concurrently.
/// Entries may vanish between calls because of capacity displacement.
pub trait SlotStore<V>: Send + Sync {
    /// Adds or replaces the value for `key`.
    ///
    /// Returns the key of an entry displaced to make room, if any.
    fn insert(&self, key: SlotKey, validity: Validity, value: V) -> Option<SlotKey>;

    /// Returns the value iff present and stored with the same validity token.
    fn find_valid(&self, key: &SlotKey, validity: Validity) -> Option<V>;

    /// Returns true if `key` is present, without touching recency.
    fn contains(&self, key: &SlotKey) -> bool;

    /// Removes `key` if present. Returns true if something was removed.
    fn remove(&self, key: &SlotKey) -> bool;

    /// Removes every entry in `namespace` and returns how many were removed.
    fn remove_all(&self, namespace: &str) -> usize;

    /// Number of entries currently held, all namespaces included.
    fn len(&self) -> usize;

    /// Returns true if the store holds nothing.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns store counters.
    fn stats(&self) -> StoreStats;
}

// ═══════════════════════════════════════════════════════════════════════════════
// FETCHER TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Readable body of a fetch response.
///
/// The underlying connection is released when the body is dropped, which
/// happens exactly once whatever path the caller takes.
#[async_trait]
pub trait ResponseBody: Send {
    /// Reads the remaining body into memory.
    async fn read_all(&mut self) -> Result<Bytes>;
}

/// Response of a [`Fetcher::get`].
pub struct FetchResponse {
    /// HTTP status code
    pub status: u16,
    /// Final URI after redirects
    pub resource_uri: String,
    /// Body handle, released on drop
    pub body: Box<dyn ResponseBody>,
}

impl std::fmt::Debug for FetchResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchResponse")
            .field("status", &self.status)
            .field("resource_uri", &self.resource_uri)
            .finish_non_exhaustive()
    }
}

/// Interface for retrieving remote documents.
///
/// A transport failure or timeout is reported as
/// [`InstanceCacheError::FetchFailed`](crate::InstanceCacheError::FetchFailed)
/// with no status. Non-200 statuses are returned as responses; the caller
/// decides what to accept.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Issues a plain GET for `url`.
    async fn get(&self, url: &str) -> Result<FetchResponse>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARSER TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Interface for turning response bytes into an immutable document.
pub trait DocumentParser: Send + Sync {
    /// Parses `bytes` read from `base_uri`.
    fn parse(&self, bytes: &[u8], base_uri: &str) -> Result<ParsedDocument>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// CLOCK TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Source of wall-clock time.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}
