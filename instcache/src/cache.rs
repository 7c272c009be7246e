//! Shared instance cache.
//!
//! Lookups, explicit removals and bulk removal are serialized by one
//! cache-wide mutex. Fetching, parsing and admission run outside it:
//! a fetched document may itself pull other shared instances through this
//! cache, and holding the lock across the fetch would deadlock that chain.
//! Concurrent misses on one URI each fetch; the last admission wins.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, instrument, warn};

use instcache_core::clock::SystemClock;
use instcache_core::constants::{FETCH_OK_STATUS, SHARED_INSTANCE_KEY_TYPE};
use instcache_core::error::{InstanceCacheError, Result};
use instcache_core::traits::{Clock, DocumentParser, Fetcher, SlotStore};
use instcache_core::types::{CachedEntry, InstanceView, SlotKey, SourceKey, Validity};
use instcache_fetch::HttpFetcher;
use instcache_store::LruSlotStore;
use instcache_xml::XmlParser;

use crate::config::{FindRequest, InstanceCacheConfig};

/// Cache statistics.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups that returned a live entry
    pub hits: u64,
    /// Lookups that found nothing or an expired entry
    pub misses: u64,
    /// Entries removed because their TTL had elapsed
    pub expirations: u64,
    /// GET requests issued
    pub fetches: u64,
    /// Fetches that failed or returned a non-200 status
    pub fetch_failures: u64,
    /// Responses that could not be parsed
    pub parse_failures: u64,
    /// Entries admitted
    pub admissions: u64,
    /// Explicit single-key removals
    pub removals: u64,
    /// Entries currently held by the slot store
    pub entries: usize,
    /// Slot store capacity
    pub capacity: usize,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    expirations: AtomicU64,
    fetches: AtomicU64,
    fetch_failures: AtomicU64,
    parse_failures: AtomicU64,
    admissions: AtomicU64,
    removals: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// Cache for shared and immutable XML instances, keyed by source URI.
///
/// Build one per process and share it behind an `Arc`.
///
/// # Example
///
/// ```rust,ignore
/// let cache = SharedInstanceCache::new()?;
/// let view = cache
///     .find(FindRequest::new("countries", "model", "http://example.org/countries.xml").with_ttl_millis(60_000))
///     .await?;
/// println!("{}", view.document.root().name);
/// ```
pub struct SharedInstanceCache {
    store: Arc<dyn SlotStore<CachedEntry>>,
    fetcher: Arc<dyn Fetcher>,
    parser: Arc<dyn DocumentParser>,
    clock: Arc<dyn Clock>,
    lookup_lock: Mutex<()>,
    counters: Counters,
}

impl SharedInstanceCache {
    /// Creates a cache with default configuration.
    pub fn new() -> Result<Self> {
        Self::with_config(InstanceCacheConfig::default())
    }

    /// Creates a cache backed by an HTTP fetcher, the XML parser, an LRU
    /// store and the system clock.
    pub fn with_config(config: InstanceCacheConfig) -> Result<Self> {
        Self::builder()
            .store(Arc::new(LruSlotStore::with_config(&config.store)?))
            .fetcher(Arc::new(HttpFetcher::with_config(config.fetch)?))
            .build()
    }

    /// Starts a builder for injecting collaborators.
    pub fn builder() -> SharedInstanceCacheBuilder {
        SharedInstanceCacheBuilder::default()
    }

    /// Returns a view of the shared instance at `request.source_uri`,
    /// fetching and admitting it on a miss.
    ///
    /// Failures are never cached; the next call for the same URI fetches
    /// again.
    #[instrument(skip(self, request), fields(id = %request.instance_id, uri = %request.source_uri))]
    pub async fn find(&self, request: FindRequest) -> Result<InstanceView> {
        if let Some(entry) = self.lookup_or_expire(&request.instance_id, &request.source_uri) {
            return Ok(entry.view(request.instance_id, request.model_id));
        }

        let entry = self.load(&request).await?;
        self.add(&request.instance_id, entry.clone());

        Ok(entry.view(request.instance_id, request.model_id))
    }

    /// Removes the entry for `source_uri`, if any.
    pub fn remove(&self, source_uri: &str) {
        let _guard = self.lookup_lock.lock();

        debug!(uri = source_uri, "Removing instance");
        if self.store.remove(&SlotKey::shared_instance(source_uri)) {
            bump(&self.counters.removals);
        }
    }

    /// Removes every shared instance and returns how many were removed.
    pub fn remove_all(&self) -> usize {
        let _guard = self.lookup_lock.lock();

        let count = self.store.remove_all(SHARED_INSTANCE_KEY_TYPE);
        debug!(count, "Removed all instances");
        count
    }

    /// Returns true if an entry for `source_uri` is held, expired or not.
    ///
    /// Does not expire entries and does not count as a use.
    pub fn contains(&self, source_uri: &str) -> bool {
        self.store.contains(&SlotKey::shared_instance(source_uri))
    }

    /// Returns cache statistics.
    pub fn stats(&self) -> CacheStats {
        let store = self.store.stats();
        let c = &self.counters;
        CacheStats {
            hits: c.hits.load(Ordering::Relaxed),
            misses: c.misses.load(Ordering::Relaxed),
            expirations: c.expirations.load(Ordering::Relaxed),
            fetches: c.fetches.load(Ordering::Relaxed),
            fetch_failures: c.fetch_failures.load(Ordering::Relaxed),
            parse_failures: c.parse_failures.load(Ordering::Relaxed),
            admissions: c.admissions.load(Ordering::Relaxed),
            removals: c.removals.load(Ordering::Relaxed),
            entries: store.entries,
            capacity: store.capacity,
        }
    }

    /// Looks up a live entry, removing it if its TTL has elapsed.
    ///
    /// The expiry check and the removal happen under the cache mutex, so no
    /// other lookup or removal can observe the entry in between.
    fn lookup_or_expire(&self, instance_id: &str, source_uri: &SourceKey) -> Option<CachedEntry> {
        let _guard = self.lookup_lock.lock();

        let key = SlotKey::shared_instance(source_uri.clone());
        let Some(entry) = self.store.find_valid(&key, Validity::CONSTANT) else {
            bump(&self.counters.misses);
            return None;
        };

        if entry.is_expired(self.clock.now()) {
            debug!(id = instance_id, uri = %source_uri, "Expiring instance");
            self.store.remove(&key);
            bump(&self.counters.expirations);
            bump(&self.counters.misses);
            return None;
        }

        debug!(id = instance_id, uri = %source_uri, "Found instance");
        bump(&self.counters.hits);
        Some(entry)
    }

    /// Fetches and parses the instance. Runs without any cache lock held.
    async fn load(&self, request: &FindRequest) -> Result<CachedEntry> {
        let source_uri = request.source_uri.as_str();
        let url = url::Url::parse(source_uri).map_err(|e| InstanceCacheError::MalformedSource {
            uri: source_uri.to_string(),
            reason: e.to_string(),
        })?;

        debug!(id = %request.instance_id, uri = source_uri, "Loading instance");
        bump(&self.counters.fetches);

        let mut response = self.fetcher.get(url.as_str()).await.map_err(|e| {
            bump(&self.counters.fetch_failures);
            warn!(uri = source_uri, error = %e, "Failed to fetch instance");
            e
        })?;

        if response.status != FETCH_OK_STATUS {
            bump(&self.counters.fetch_failures);
            warn!(uri = source_uri, status = response.status, "Got invalid return code while loading instance");
            return Err(InstanceCacheError::bad_status(source_uri, response.status));
        }

        let bytes = response.body.read_all().await.map_err(|e| {
            bump(&self.counters.fetch_failures);
            warn!(uri = source_uri, error = %e, "Failed to read instance body");
            e
        })?;
        let resource_uri = response.resource_uri;
        // Release the connection before parsing
        drop(response.body);

        let document = self.parser.parse(&bytes, &resource_uri).map_err(|e| {
            bump(&self.counters.parse_failures);
            warn!(uri = source_uri, error = %e, "Failed to parse instance");
            e
        })?;

        Ok(CachedEntry::new(
            document,
            request.source_uri.clone(),
            self.clock.now(),
            request.ttl,
            request.validation_hint.clone(),
        ))
    }

    /// Admits an entry, overwriting whatever is stored for its URI.
    ///
    /// Not serialized with lookups; relies on the store's own locking.
    fn add(&self, instance_id: &str, entry: CachedEntry) {
        debug!(id = instance_id, uri = %entry.source_uri(), ttl = %entry.ttl(), "Adding instance");

        let key = SlotKey::shared_instance(entry.source_uri().clone());
        if let Some(displaced) = self.store.insert(key, Validity::CONSTANT, entry) {
            debug!(displaced = %displaced, "Displaced entry to make room");
        }
        bump(&self.counters.admissions);
    }
}

/// Builder for [`SharedInstanceCache`].
///
/// Collaborators left unset default to an LRU store of 10 entries, an HTTP
/// fetcher, the XML parser and the system clock.
#[derive(Default)]
pub struct SharedInstanceCacheBuilder {
    store: Option<Arc<dyn SlotStore<CachedEntry>>>,
    fetcher: Option<Arc<dyn Fetcher>>,
    parser: Option<Arc<dyn DocumentParser>>,
    clock: Option<Arc<dyn Clock>>,
}

impl SharedInstanceCacheBuilder {
    /// Uses the given slot store, possibly shared with other caches.
    pub fn store(mut self, store: Arc<dyn SlotStore<CachedEntry>>) -> Self {
        self.store = Some(store);
        self
    }

    /// Uses the given fetcher.
    pub fn fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Uses the given parser.
    pub fn parser(mut self, parser: Arc<dyn DocumentParser>) -> Self {
        self.parser = Some(parser);
        self
    }

    /// Uses the given clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Builds the cache.
    pub fn build(self) -> Result<SharedInstanceCache> {
        let fetcher: Arc<dyn Fetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(HttpFetcher::new()?),
        };

        Ok(SharedInstanceCache {
            store: self.store.unwrap_or_else(|| Arc::new(LruSlotStore::new())),
            fetcher,
            parser: self.parser.unwrap_or_else(|| Arc::new(XmlParser::new())),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            lookup_lock: Mutex::new(()),
            counters: Counters::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;
    use bytes::Bytes;
    use instcache_core::clock::ManualClock;
    use instcache_core::traits::{FetchResponse, ResponseBody};
    use instcache_core::types::{ParsedDocument, Ttl};

    /// Body that counts how many times it is released.
    struct CountingBody {
        bytes: Bytes,
        released: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ResponseBody for CountingBody {
        async fn read_all(&mut self) -> Result<Bytes> {
            Ok(self.bytes.clone())
        }
    }

    impl Drop for CountingBody {
        fn drop(&mut self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// In-memory fetcher serving canned responses.
    #[derive(Default)]
    struct MockFetcher {
        responses: parking_lot::Mutex<HashMap<String, (u16, &'static str)>>,
        gets: AtomicUsize,
        released: Arc<AtomicUsize>,
    }

    impl MockFetcher {
        fn serve(&self, url: &str, status: u16, body: &'static str) {
            self.responses.lock().insert(url.to_string(), (status, body));
        }

        fn gets(&self) -> usize {
            self.gets.load(Ordering::SeqCst)
        }

        fn released(&self) -> usize {
            self.released.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fetcher for MockFetcher {
        async fn get(&self, url: &str) -> Result<FetchResponse> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            let (status, body) = self
                .responses
                .lock()
                .get(url)
                .copied()
                .unwrap_or((404, ""));
            Ok(FetchResponse {
                status,
                resource_uri: url.to_string(),
                body: Box::new(CountingBody {
                    bytes: Bytes::from_static(body.as_bytes()),
                    released: Arc::clone(&self.released),
                }),
            })
        }
    }

    const A: &str = "http://ex/a.xml";

    fn setup() -> (SharedInstanceCache, Arc<MockFetcher>, ManualClock) {
        let fetcher = Arc::new(MockFetcher::default());
        fetcher.serve(A, 200, "<r/>");
        let clock = ManualClock::at_epoch();
        let cache = SharedInstanceCache::builder()
            .fetcher(fetcher.clone())
            .clock(Arc::new(clock.clone()))
            .build()
            .unwrap();
        (cache, fetcher, clock)
    }

    fn request(id: &str, uri: &str, ttl_ms: i64) -> FindRequest {
        FindRequest::new(id, "model", uri).with_ttl_millis(ttl_ms)
    }

    #[tokio::test]
    async fn test_cold_then_warm_hit() {
        let (cache, fetcher, clock) = setup();

        let first = cache.find(request("a", A, 60_000)).await.unwrap();
        assert_eq!(first.document.root().name, "r");
        assert_eq!(fetcher.gets(), 1);

        clock.advance_millis(59_000);
        let second = cache.find(request("a", A, 60_000)).await.unwrap();

        assert!(first.shares_document_with(&second));
        assert_eq!(fetcher.gets(), 1);
        assert_eq!(cache.stats().hits, 1);
    }

    #[tokio::test]
    async fn test_expiry_refetches() {
        let (cache, fetcher, clock) = setup();

        let first = cache.find(request("a", A, 10)).await.unwrap();
        clock.advance_millis(20);
        let second = cache.find(request("a", A, 10)).await.unwrap();

        assert_eq!(fetcher.gets(), 2);
        assert!(!first.shares_document_with(&second));
        assert_eq!(cache.stats().expirations, 1);
        assert!(cache.contains(A));
    }

    #[tokio::test]
    async fn test_fresh_admission_time_after_expiry() {
        let (cache, _fetcher, clock) = setup();

        cache.find(request("a", A, 10)).await.unwrap();
        clock.advance_millis(20);
        cache.find(request("a", A, 10)).await.unwrap();

        // Admitted at t=20, so still live at t=30 and gone at t=31
        clock.advance_millis(10);
        cache.find(request("a", A, 10)).await.unwrap();
        assert_eq!(cache.stats().fetches, 2);
        clock.advance_millis(1);
        cache.find(request("a", A, 10)).await.unwrap();
        assert_eq!(cache.stats().fetches, 3);
    }

    #[tokio::test]
    async fn test_zero_ttl_expires_on_next_lookup() {
        let (cache, fetcher, clock) = setup();

        cache.find(request("a", A, 0)).await.unwrap();
        clock.advance_millis(1);
        cache.find(request("a", A, 0)).await.unwrap();
        assert_eq!(fetcher.gets(), 2);
    }

    #[tokio::test]
    async fn test_never_expires() {
        let (cache, fetcher, clock) = setup();

        for _ in 0..20 {
            cache.find(request("a", A, -1)).await.unwrap();
            clock.advance_millis(86_400_000);
        }
        assert_eq!(fetcher.gets(), 1);
    }

    #[tokio::test]
    async fn test_stored_ttl_wins_on_hit() {
        let (cache, fetcher, clock) = setup();

        cache.find(request("a", A, 10)).await.unwrap();
        let view = cache.find(request("b", A, -1)).await.unwrap();
        assert_eq!(view.ttl, Ttl::Millis(10));

        clock.advance_millis(20);
        cache.find(request("c", A, -1)).await.unwrap();
        assert_eq!(fetcher.gets(), 2);
    }

    #[tokio::test]
    async fn test_views_are_independent() {
        let (cache, _fetcher, _clock) = setup();

        let a = cache
            .find(FindRequest::new("a", "m1", A).with_validation("xs:codes"))
            .await
            .unwrap();
        let b = cache.find(FindRequest::new("b", "m2", A)).await.unwrap();

        assert_eq!(a.instance_id, "a");
        assert_eq!(b.instance_id, "b");
        assert_eq!(b.model_id, "m2");
        assert!(a.shares_document_with(&b));
        // The hint stored at admission is the one propagated
        assert_eq!(b.validation_hint.as_deref(), Some("xs:codes"));
        assert!(a.is_shared && b.is_shared);
    }

    #[tokio::test]
    async fn test_remove_then_miss() {
        let (cache, fetcher, _clock) = setup();

        cache.find(request("a", A, -1)).await.unwrap();
        cache.remove(A);
        cache.remove(A);
        assert!(!cache.contains(A));

        cache.find(request("a", A, -1)).await.unwrap();
        assert_eq!(fetcher.gets(), 2);
        assert_eq!(cache.stats().removals, 1);
    }

    #[tokio::test]
    async fn test_view_survives_removal() {
        let (cache, _fetcher, _clock) = setup();

        let view = cache.find(request("a", A, -1)).await.unwrap();
        cache.remove_all();
        assert_eq!(view.document.root().name, "r");
        assert_eq!(view.document.handle_count(), 1);
    }

    #[tokio::test]
    async fn test_bad_status_not_cached() {
        let (cache, fetcher, _clock) = setup();
        let missing = "http://ex/missing";

        let err = cache.find(request("a", missing, -1)).await.unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert!(!cache.contains(missing));

        cache.find(request("a", missing, -1)).await.unwrap_err();
        assert_eq!(fetcher.gets(), 2);
        assert_eq!(cache.stats().fetch_failures, 2);
    }

    #[tokio::test]
    async fn test_parse_failure_not_cached() {
        let (cache, fetcher, _clock) = setup();
        let broken = "http://ex/broken.xml";
        fetcher.serve(broken, 200, "<r>");

        let err = cache.find(request("a", broken, -1)).await.unwrap_err();
        assert!(matches!(err, InstanceCacheError::ParseFailed { .. }));
        assert!(!cache.contains(broken));
        assert_eq!(cache.stats().parse_failures, 1);
        assert_eq!(cache.stats().admissions, 0);
    }

    #[tokio::test]
    async fn test_malformed_source_does_not_fetch() {
        let (cache, fetcher, _clock) = setup();

        let err = cache.find(request("a", "not a uri", -1)).await.unwrap_err();
        assert!(matches!(err, InstanceCacheError::MalformedSource { .. }));
        assert_eq!(fetcher.gets(), 0);
        assert_eq!(cache.stats().entries, 0);
    }

    #[tokio::test]
    async fn test_body_released_exactly_once_per_fetch() {
        let (cache, fetcher, clock) = setup();
        fetcher.serve("http://ex/broken.xml", 200, "<r>");

        cache.find(request("a", A, 0)).await.unwrap();
        assert_eq!(fetcher.released(), 1);

        clock.advance_millis(1);
        cache.find(request("a", A, 0)).await.unwrap();
        assert_eq!(fetcher.released(), 2);

        cache.find(request("a", "http://ex/missing", -1)).await.unwrap_err();
        assert_eq!(fetcher.released(), 3);

        cache.find(request("a", "http://ex/broken.xml", -1)).await.unwrap_err();
        assert_eq!(fetcher.released(), 4);

        assert_eq!(fetcher.gets(), fetcher.released());
    }

    #[tokio::test]
    async fn test_remove_all_counts_only_own_namespace() {
        let store: Arc<LruSlotStore<CachedEntry>> = Arc::new(LruSlotStore::new());
        let fetcher = Arc::new(MockFetcher::default());
        for i in 0..3 {
            fetcher.serve(&format!("http://ex/{}.xml", i), 200, "<r/>");
        }
        let cache = SharedInstanceCache::builder()
            .store(store.clone())
            .fetcher(fetcher.clone())
            .build()
            .unwrap();

        // A co-tenant entry sharing the same store
        let foreign = CachedEntry::new(
            ParsedDocument::new(XmlParser::new().parse_str("<x/>", "urn:x").unwrap()),
            "urn:x",
            ManualClock::at_epoch().now(),
            Ttl::Never,
            None,
        );
        store.insert(SlotKey::new("other.cache", "urn:x"), Validity::CONSTANT, foreign);

        for i in 0..3 {
            cache.find(request("a", &format!("http://ex/{}.xml", i), -1)).await.unwrap();
        }

        assert_eq!(cache.remove_all(), 3);
        assert_eq!(store.len(), 1);
        for i in 0..3 {
            assert!(!cache.contains(&format!("http://ex/{}.xml", i)));
        }
    }

    #[tokio::test]
    async fn test_capacity_displacement() {
        let fetcher = Arc::new(MockFetcher::default());
        for i in 0..3 {
            fetcher.serve(&format!("http://ex/{}.xml", i), 200, "<r/>");
        }
        let cache = SharedInstanceCache::builder()
            .store(Arc::new(
                LruSlotStore::with_config(&instcache_store::StoreConfig::with_capacity(2)).unwrap(),
            ))
            .fetcher(fetcher.clone())
            .build()
            .unwrap();

        for i in 0..3 {
            cache.find(request("a", &format!("http://ex/{}.xml", i), -1)).await.unwrap();
        }
        assert!(!cache.contains("http://ex/0.xml"));

        cache.find(request("a", "http://ex/0.xml", -1)).await.unwrap();
        assert_eq!(fetcher.gets(), 4);
        assert_eq!(cache.stats().capacity, 2);
    }
}
