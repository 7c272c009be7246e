//! End-to-end scenarios against a mock HTTP origin.

use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use async_trait::async_trait;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use instcache::{FindRequest, HttpFetcher, InstanceCacheConfig, InstanceCacheError, SharedInstanceCache};
use instcache_core::traits::{FetchResponse, Fetcher};

async fn serve(server: &MockServer, route: &str, status: u16, body: &str, expected_gets: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .expect(expected_gets)
        .mount(server)
        .await;
}

fn cache() -> SharedInstanceCache {
    SharedInstanceCache::with_config(InstanceCacheConfig::default().with_fetch_timeout(5)).unwrap()
}

#[tokio::test]
async fn test_cold_hit_then_warm_hit() {
    let server = MockServer::start().await;
    serve(&server, "/a.xml", 200, "<r/>", 1).await;
    let uri = format!("{}/a.xml", server.uri());
    let cache = cache();

    let first = cache
        .find(FindRequest::new("a", "m", uri.as_str()).with_ttl_millis(60_000))
        .await
        .unwrap();
    let second = cache
        .find(FindRequest::new("a", "m", uri.as_str()).with_ttl_millis(60_000))
        .await
        .unwrap();

    assert_eq!(first.document.root().name, "r");
    assert!(first.shares_document_with(&second));
    assert_eq!(cache.stats().fetches, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_miss_both_fetch_last_admission_wins() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/b.xml"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<r/>")
                .set_delay(Duration::from_millis(200)),
        )
        .expect(2)
        .mount(&server)
        .await;
    let uri = format!("{}/b.xml", server.uri());
    let cache = Arc::new(cache());

    let (a, b) = tokio::join!(
        cache.find(FindRequest::new("a", "m", uri.as_str())),
        cache.find(FindRequest::new("b", "m", uri.as_str())),
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    assert!(!a.shares_document_with(&b));

    let third = cache.find(FindRequest::new("c", "m", uri.as_str())).await.unwrap();
    assert!(third.shares_document_with(&a) ^ third.shares_document_with(&b));
    assert_eq!(cache.stats().admissions, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_spawned_tasks_share_cache() {
    let server = MockServer::start().await;
    serve(&server, "/shared.xml", 200, "<codes><code>1</code></codes>", 1).await;
    let uri = format!("{}/shared.xml", server.uri());
    let cache = Arc::new(cache());

    // Warm the entry so the spawned tasks all hit
    let warm = cache.find(FindRequest::new("warm", "m", uri.as_str())).await.unwrap();

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let cache = Arc::clone(&cache);
            let uri = uri.clone();
            tokio::spawn(async move {
                cache
                    .find(FindRequest::new(format!("instance-{}", i), "m", uri))
                    .await
            })
        })
        .collect();

    for (i, view) in futures::future::join_all(handles).await.into_iter().enumerate() {
        let view = view.unwrap().unwrap();
        assert_eq!(view.instance_id, format!("instance-{}", i));
        assert!(view.shares_document_with(&warm));
    }
    assert_eq!(cache.stats().hits, 16);
}

#[tokio::test]
async fn test_remove_during_live_entry() {
    let server = MockServer::start().await;
    serve(&server, "/a.xml", 200, "<r/>", 2).await;
    let uri = format!("{}/a.xml", server.uri());
    let cache = cache();

    cache.find(FindRequest::new("a", "m", uri.as_str())).await.unwrap();
    cache.remove(&uri);
    cache.find(FindRequest::new("a", "m", uri.as_str())).await.unwrap();

    assert_eq!(cache.stats().fetches, 2);
}

#[tokio::test]
async fn test_fetch_404_is_not_cached() {
    let server = MockServer::start().await;
    serve(&server, "/missing", 404, "", 2).await;
    let uri = format!("{}/missing", server.uri());
    let cache = cache();

    let err = cache
        .find(FindRequest::new("a", "m", uri.as_str()))
        .await
        .unwrap_err();
    assert!(matches!(err, InstanceCacheError::FetchFailed { status: Some(404), .. }));
    assert!(!cache.contains(&uri));

    let err = cache
        .find(FindRequest::new("a", "m", uri.as_str()))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert_eq!(cache.stats().entries, 0);
}

#[tokio::test]
async fn test_only_200_is_accepted() {
    let server = MockServer::start().await;
    serve(&server, "/created.xml", 201, "<r/>", 1).await;
    let uri = format!("{}/created.xml", server.uri());

    let err = cache()
        .find(FindRequest::new("a", "m", uri.as_str()))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(201));
}

#[tokio::test]
async fn test_invalid_xml_is_parse_failure() {
    let server = MockServer::start().await;
    serve(&server, "/broken.xml", 200, "<r>", 1).await;
    let uri = format!("{}/broken.xml", server.uri());
    let cache = cache();

    let err = cache
        .find(FindRequest::new("a", "m", uri.as_str()))
        .await
        .unwrap_err();
    assert!(matches!(err, InstanceCacheError::ParseFailed { .. }));
    assert!(!cache.contains(&uri));
}

#[tokio::test]
async fn test_bulk_clear() {
    let server = MockServer::start().await;
    for name in ["one", "two", "three"] {
        serve(&server, &format!("/{}.xml", name), 200, "<r/>", 2).await;
    }
    let uris: Vec<String> = ["one", "two", "three"]
        .iter()
        .map(|name| format!("{}/{}.xml", server.uri(), name))
        .collect();
    let cache = cache();

    for uri in &uris {
        cache.find(FindRequest::new("a", "m", uri.as_str())).await.unwrap();
    }
    assert!(cache.remove_all() >= uris.len());

    for uri in &uris {
        assert!(!cache.contains(uri));
        cache.find(FindRequest::new("a", "m", uri.as_str())).await.unwrap();
    }
    assert_eq!(cache.stats().fetches, 6);
}

/// Fetcher that resolves a referenced instance through the cache before
/// fetching the referencing one.
struct ChainingFetcher {
    http: HttpFetcher,
    outer: String,
    inner: String,
    cache: OnceLock<Weak<SharedInstanceCache>>,
}

#[async_trait]
impl Fetcher for ChainingFetcher {
    async fn get(&self, url: &str) -> instcache::Result<FetchResponse> {
        if url == self.outer {
            if let Some(cache) = self.cache.get().and_then(Weak::upgrade) {
                cache
                    .find(FindRequest::new("inner", "m", self.inner.as_str()))
                    .await?;
            }
        }
        self.http.get(url).await
    }
}

#[tokio::test]
async fn test_chained_reference_does_not_deadlock() {
    let server = MockServer::start().await;
    serve(&server, "/outer.xml", 200, "<outer/>", 1).await;
    serve(&server, "/inner.xml", 200, "<inner/>", 1).await;
    let outer = format!("{}/outer.xml", server.uri());
    let inner = format!("{}/inner.xml", server.uri());

    let fetcher = Arc::new(ChainingFetcher {
        http: HttpFetcher::new().unwrap(),
        outer: outer.clone(),
        inner: inner.clone(),
        cache: OnceLock::new(),
    });
    let cache = Arc::new(
        SharedInstanceCache::builder()
            .fetcher(fetcher.clone())
            .build()
            .unwrap(),
    );
    let _ = fetcher.cache.set(Arc::downgrade(&cache));

    let view = tokio::time::timeout(
        Duration::from_secs(5),
        cache.find(FindRequest::new("outer", "m", outer.as_str())),
    )
    .await
    .expect("find must not deadlock")
    .unwrap();

    assert_eq!(view.document.root().name, "outer");
    assert!(cache.contains(&inner));
    assert!(cache.contains(&outer));
}
