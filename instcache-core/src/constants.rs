//! Cache constants.
//!
//! Names and defaults shared by the slot store, the fetcher and the
//! shared instance cache.

// ═══════════════════════════════════════════════════════════════════════════════
// SLOT STORE NAMESPACE
// ═══════════════════════════════════════════════════════════════════════════════

/// Name of the shared instances cache.
pub const SHARED_INSTANCES_CACHE_NAME: &str = "xforms.cache.shared-instances";

/// Namespace half of every slot key admitted by the shared instance cache.
///
/// Other domain caches may share a slot store as long as they use a
/// different namespace.
pub const SHARED_INSTANCE_KEY_TYPE: &str = SHARED_INSTANCES_CACHE_NAME;

/// Default number of slots in the backing store.
pub const SHARED_INSTANCES_CACHE_DEFAULT_SIZE: usize = 10;

/// Validity token stored with every shared instance.
///
/// TTL is enforced by the cache at lookup time, so the store's own validity
/// check always compares against this value.
pub const CONSTANT_VALIDITY: u64 = 0;

// ═══════════════════════════════════════════════════════════════════════════════
// TTL
// ═══════════════════════════════════════════════════════════════════════════════

/// Millisecond value reported for entries that never expire.
pub const TTL_NEVER_MILLIS: i64 = -1;

// ═══════════════════════════════════════════════════════════════════════════════
// FETCH
// ═══════════════════════════════════════════════════════════════════════════════

/// The only HTTP status accepted from the origin.
pub const FETCH_OK_STATUS: u16 = 200;

/// Default overall request timeout for instance fetches.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Default TCP connect timeout for instance fetches.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
