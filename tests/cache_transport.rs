//! End-to-end behaviour of `CacheTransport` against counting origins.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use diskcache::cache::{CACHE_TIME_HEADER, derive_key, stored_at};
use diskcache::{
    CacheSettings, CacheTransport, Request, Response, StatusCode, TcpTransport, Transport,
    TransportError,
};

/// Replies with a fixed status and body, counting calls.
struct Origin {
    calls: AtomicUsize,
    status: StatusCode,
}

impl Origin {
    fn new(status: StatusCode) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            status,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for Origin {
    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Response::new(self.status)
            .header("Content-Type", "text/plain")
            .header("X-Served-By", format!("origin-{n}"))
            .body(format!("{} #{n}", request.url().path())))
    }
}

/// Always fails.
struct Unreachable;

#[async_trait]
impl Transport for Unreachable {
    async fn send(&self, _request: Request) -> Result<Response, TransportError> {
        Err(TransportError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "connection refused",
        )))
    }
}

fn get(url: &str) -> Request {
    Request::get(url.parse().unwrap()).header("Accept", "text/plain")
}

async fn body_of(response: Response) -> String {
    String::from_utf8(response.into_body_bytes().await.unwrap().to_vec()).unwrap()
}

fn entries(dir: &TempDir) -> usize {
    match std::fs::read_dir(dir.path().join("cache")) {
        Ok(entries) => entries.count(),
        Err(_) => 0,
    }
}

fn settings(dir: &TempDir) -> CacheSettings {
    CacheSettings::new(dir.path().join("cache"))
        .domains(["example.com"])
        .ttl(Duration::from_secs(60))
}

#[tokio::test]
async fn miss_then_hit() {
    let dir = TempDir::new().unwrap();
    let origin = Origin::new(StatusCode::OK);
    let cache = CacheTransport::new(Arc::clone(&origin), settings(&dir));

    let first = cache.round_trip(get("http://api.example.com/items")).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(body_of(first).await, "/items #1");
    assert_eq!(origin.calls(), 1);
    assert_eq!(entries(&dir), 1);

    let second = cache.round_trip(get("http://api.example.com/items")).await.unwrap();
    assert_eq!(origin.calls(), 1, "second request must not reach the origin");
    assert_eq!(second.headers().get("x-served-by"), Some("origin-1"));
    assert!(second.headers().contains(CACHE_TIME_HEADER));
    assert_eq!(body_of(second).await, "/items #1");
}

#[tokio::test]
async fn other_domains_are_never_cached() {
    let dir = TempDir::new().unwrap();
    let origin = Origin::new(StatusCode::OK);
    let cache = CacheTransport::new(Arc::clone(&origin), settings(&dir));

    for url in [
        "http://example.org/items",
        "http://example.com.evil.com/items",
        "http://notexample.com/items",
    ] {
        for _ in 0..3 {
            cache.round_trip(get(url)).await.unwrap();
        }
    }
    assert_eq!(origin.calls(), 9);
    assert_eq!(entries(&dir), 0);
}

#[tokio::test]
async fn expired_entry_is_refetched_and_overwritten() {
    let dir = TempDir::new().unwrap();
    let origin = Origin::new(StatusCode::OK);
    let cache = CacheTransport::new(Arc::clone(&origin), settings(&dir));

    let mut request = get("http://example.com/report");
    let key = derive_key(&mut request).await.unwrap();
    let stale_at = Utc::now() - TimeDelta::seconds(120);
    let mut stale = Response::new(StatusCode::OK).body("stale");
    cache
        .store()
        .save_at(key.as_str(), &mut stale, stale_at)
        .await
        .unwrap();

    let response = cache.round_trip(request).await.unwrap();
    assert_eq!(origin.calls(), 1);
    assert_eq!(body_of(response).await, "/report #1");

    let stored = cache.store().load(key.as_str()).await.unwrap();
    let fresh_at = stored_at(&stored).unwrap();
    assert!(fresh_at > stale_at + TimeDelta::seconds(60));
    assert_eq!(body_of(stored).await, "/report #1");
}

#[tokio::test]
async fn fresh_entry_within_ttl_is_served() {
    let dir = TempDir::new().unwrap();
    let origin = Origin::new(StatusCode::OK);
    let cache = CacheTransport::new(Arc::clone(&origin), settings(&dir));

    let mut request = get("http://example.com/report");
    let key = derive_key(&mut request).await.unwrap();
    let mut recent = Response::new(StatusCode::OK).body("recent");
    cache
        .store()
        .save_at(key.as_str(), &mut recent, Utc::now() - TimeDelta::seconds(30))
        .await
        .unwrap();

    let response = cache.round_trip(request).await.unwrap();
    assert_eq!(origin.calls(), 0);
    assert_eq!(body_of(response).await, "recent");
}

#[tokio::test]
async fn non_200_responses_are_not_stored() {
    for status in [
        StatusCode::NOT_FOUND,
        StatusCode::INTERNAL_SERVER_ERROR,
        StatusCode::CREATED,
        StatusCode::NOT_MODIFIED,
    ] {
        let dir = TempDir::new().unwrap();
        let origin = Origin::new(status);
        let cache = CacheTransport::new(Arc::clone(&origin), settings(&dir));

        let mut request = get("http://example.com/missing");
        let key = derive_key(&mut request).await.unwrap();

        let first = cache.round_trip(request).await.unwrap();
        assert_eq!(first.status(), status);
        assert!(!cache.store().exists(key.as_str()).await);

        cache.round_trip(get("http://example.com/missing")).await.unwrap();
        assert_eq!(origin.calls(), 2);
        assert_eq!(entries(&dir), 0);
    }
}

#[tokio::test]
async fn transport_errors_pass_through() {
    let dir = TempDir::new().unwrap();
    let cache = CacheTransport::new(Unreachable, settings(&dir));

    let err = cache
        .send(get("http://example.com/items"))
        .await
        .unwrap_err();
    assert!(
        matches!(err, TransportError::Io(ref e) if e.kind() == std::io::ErrorKind::ConnectionRefused)
    );
    assert_eq!(entries(&dir), 0);
}

#[tokio::test]
async fn zero_ttl_serves_old_entries() {
    let dir = TempDir::new().unwrap();
    let origin = Origin::new(StatusCode::OK);
    let cache = CacheTransport::new(
        Arc::clone(&origin),
        CacheSettings::new(dir.path().join("cache")),
    );

    let mut request = get("http://anything.test/");
    let key = derive_key(&mut request).await.unwrap();
    let mut ancient = Response::new(StatusCode::OK).body("ancient");
    cache
        .store()
        .save_at(key.as_str(), &mut ancient, Utc::now() - TimeDelta::days(3650))
        .await
        .unwrap();

    let response = cache.round_trip(request).await.unwrap();
    assert_eq!(origin.calls(), 0);
    assert_eq!(body_of(response).await, "ancient");
}

#[tokio::test]
async fn stored_entry_round_trips_the_response() {
    let dir = TempDir::new().unwrap();
    let origin = Origin::new(StatusCode::OK);
    let cache = CacheTransport::new(Arc::clone(&origin), settings(&dir));

    let mut request = get("http://example.com/items?page=2");
    let key = derive_key(&mut request).await.unwrap();
    let live = cache.round_trip(request).await.unwrap();

    let stored = cache.store().load(key.as_str()).await.unwrap();
    assert_eq!(stored.status(), live.status());
    assert_eq!(stored.headers(), live.headers());
    assert_eq!(body_of(stored).await, body_of(live).await);
}

#[tokio::test]
async fn differing_requests_get_separate_entries() {
    let dir = TempDir::new().unwrap();
    let origin = Origin::new(StatusCode::OK);
    let cache = CacheTransport::new(Arc::clone(&origin), settings(&dir));

    cache.round_trip(get("http://example.com/a")).await.unwrap();
    cache.round_trip(get("http://example.com/a?v=2")).await.unwrap();
    cache
        .round_trip(get("http://example.com/a").header("Accept-Language", "fi"))
        .await
        .unwrap();
    cache
        .round_trip(Request::post("http://example.com/a".parse().unwrap()).body("q"))
        .await
        .unwrap();

    assert_eq!(origin.calls(), 4);
    assert_eq!(entries(&dir), 4);
}

#[tokio::test]
async fn caches_over_real_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&accepted);
    tokio::spawn(async move {
        loop {
            let (mut socket, _) = listener.accept().await.unwrap();
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let mut received = Vec::new();
                let mut chunk = [0u8; 1024];
                while !received.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = socket.read(&mut chunk).await.unwrap();
                    if n == 0 {
                        return;
                    }
                    received.extend_from_slice(&chunk[..n]);
                }
                socket
                    .write_all(b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n4\r\npong\r\n0\r\n\r\n")
                    .await
                    .unwrap();
                socket.shutdown().await.unwrap();
            });
        }
    });

    let dir = TempDir::new().unwrap();
    let cache = CacheTransport::new(
        TcpTransport::new(),
        CacheSettings::new(dir.path().join("cache")),
    );
    let url = format!("http://{addr}/ping");

    for _ in 0..3 {
        let response = cache.round_trip(get(&url)).await.unwrap();
        assert_eq!(body_of(response).await, "pong");
    }
    assert_eq!(accepted.load(Ordering::SeqCst), 1);
}
