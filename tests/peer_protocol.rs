// ==============================================
// PEER PROTOCOL TESTS (integration, real sockets)
// ==============================================
//
// Every node binds 127.0.0.1:0 and serves PeerPool::router with axum; requests
// go through reqwest exactly as they would between processes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use peercache::error::BoxError;
use peercache::prelude::*;
use tokio::net::TcpListener;

/// Origin that answers `{tag}:{key}` and counts calls; "unknown" fails.
struct TaggedOrigin {
    tag: String,
    calls: AtomicUsize,
}

#[async_trait]
impl Loader for TaggedOrigin {
    async fn load(&self, key: &str) -> Result<Bytes, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if key == "unknown" {
            return Err(format!("{key} not exist").into());
        }
        Ok(Bytes::from(format!("{}:{key}", self.tag)))
    }
}

struct Node {
    url: String,
    pool: Arc<PeerPool>,
    group: Arc<CacheGroup>,
    origin: Arc<TaggedOrigin>,
}

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    (listener, url)
}

/// A URL nobody listens on.
fn dead_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    format!("http://{}", listener.local_addr().unwrap())
}

fn start_node(listener: TcpListener, url: String, tag: &str, peers: &[String]) -> Node {
    let origin = Arc::new(TaggedOrigin {
        tag: tag.to_owned(),
        calls: AtomicUsize::new(0),
    });
    let registry = Arc::new(GroupRegistry::new());
    let group = registry.register(
        GroupBuilder::new("scores")
            .capacity(64)
            .shared_loader(origin.clone())
            .build()
            .unwrap(),
    );

    let pool = Arc::new(PeerPool::new(url.clone()).unwrap());
    pool.set_peers(peers.iter().cloned());
    group.register_peers(pool.clone()).unwrap();

    let app = pool.router(registry);
    tokio::spawn(async move { axum::serve(listener, app).await });

    Node {
        url,
        pool,
        group,
        origin,
    }
}

/// First candidate key the ring assigns to `owner`.
fn key_owned_by(pool: &PeerPool, owner: &str) -> String {
    (0..1_000)
        .map(|i| format!("key-{i}"))
        .find(|key| pool.owner_of(key).as_deref() == Some(owner))
        .expect("some key maps to every peer")
}

// ==============================================
// Server responses
// ==============================================

mod server {
    use super::*;

    async fn single_node() -> Node {
        let (listener, url) = bind().await;
        start_node(listener, url.clone(), "solo", &[url])
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn serves_raw_bytes() {
        let node = single_node().await;
        let response = reqwest::get(format!("{}/_mycache/scores/Tom", node.url))
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"],
            "application/octet-stream"
        );
        assert_eq!(response.bytes().await.unwrap(), Bytes::from("solo:Tom"));
        assert_eq!(node.group.stats().server_requests, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn escaped_keys_round_trip() {
        let node = single_node().await;
        let response = reqwest::get(format!("{}/_mycache/scores/a%2Fb%20c", node.url))
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert_eq!(response.bytes().await.unwrap(), Bytes::from("solo:a/b c"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn client_errors_are_bad_requests() {
        let node = single_node().await;
        let cases = [
            ("/_mycache/bogusGroup/Tom", "no such group: bogusGroup"),
            ("/_mycache/scores", "malformed request path"),
            ("/_mycache/scores/unknown", "unknown not exist"),
            ("/_mycache/scores/", "key is required"),
        ];

        for (path, message) in cases {
            let response = reqwest::get(format!("{}{path}", node.url)).await.unwrap();
            assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST, "{path}");
            let body = response.text().await.unwrap();
            assert!(body.contains(message), "{path}: {body}");
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn paths_outside_the_base_are_not_found() {
        let node = single_node().await;
        let response = reqwest::get(format!("{}/elsewhere/scores/Tom", node.url))
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn http_getter_reports_non_ok_status() {
        let node = single_node().await;
        let getter = HttpPeerGetter::new(node.url.clone(), "/_mycache/", reqwest::Client::new());

        assert_eq!(
            getter.get("scores", "Jack").await.unwrap(),
            Bytes::from("solo:Jack")
        );
        let err = getter.get("bogusGroup", "Jack").await.unwrap_err();
        assert!(matches!(err, Error::PeerFetch { .. }));
        assert!(err.to_string().contains("400"), "{err}");
    }
}

// ==============================================
// Two-node cluster
// ==============================================

mod cluster {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn owner_loads_and_requester_does_not_cache() {
        let (listener_a, url_a) = bind().await;
        let (listener_b, url_b) = bind().await;
        let peers = [url_a.clone(), url_b.clone()];
        let a = start_node(listener_a, url_a, "A", &peers);
        let b = start_node(listener_b, url_b, "B", &peers);

        let key = key_owned_by(&a.pool, &b.url);
        assert_eq!(b.pool.owner_of(&key).as_deref(), Some(b.url.as_str()));

        let expected = Bytes::from(format!("B:{key}"));
        assert_eq!(a.group.get(&key).await.unwrap(), expected);
        assert_eq!(a.group.get(&key).await.unwrap(), expected);

        assert_eq!(a.origin.calls.load(Ordering::SeqCst), 0);
        assert_eq!(b.origin.calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.group.cached_len(), 0);
        assert_eq!(b.group.cached_len(), 1);
        assert_eq!(a.group.stats().peer_loads, 2);
        assert_eq!(b.group.stats().server_requests, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn keys_owned_locally_stay_local() {
        let (listener_a, url_a) = bind().await;
        let (listener_b, url_b) = bind().await;
        let peers = [url_a.clone(), url_b.clone()];
        let a = start_node(listener_a, url_a, "A", &peers);
        let b = start_node(listener_b, url_b, "B", &peers);

        let key = key_owned_by(&a.pool, &a.url);
        assert_eq!(a.group.get(&key).await.unwrap(), Bytes::from(format!("A:{key}")));
        assert_eq!(a.group.cached_len(), 1);
        assert_eq!(b.group.stats().server_requests, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn unreachable_owner_falls_back_to_origin() {
        let (listener_a, url_a) = bind().await;
        let dead = dead_url();
        let peers = [url_a.clone(), dead.clone()];
        let a = start_node(listener_a, url_a, "A", &peers);

        let key = key_owned_by(&a.pool, &dead);
        assert_eq!(a.group.get(&key).await.unwrap(), Bytes::from(format!("A:{key}")));
        assert_eq!(a.group.stats().peer_errors, 1);
        assert_eq!(a.group.cached_len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn silent_owner_times_out_and_falls_back() {
        let (silent, silent_url) = bind().await;
        // Accepts connections and never answers.
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = silent.accept().await {
                held.push(stream);
            }
        });

        let origin = Arc::new(TaggedOrigin {
            tag: "A".to_owned(),
            calls: AtomicUsize::new(0),
        });
        let group = GroupBuilder::new("scores")
            .capacity(8)
            .shared_loader(origin.clone())
            .build()
            .unwrap();
        let options = PoolOptions {
            timeout: Duration::from_millis(200),
            ..PoolOptions::default()
        };
        let self_url = dead_url();
        let pool = Arc::new(PeerPool::with_options(self_url.clone(), options).unwrap());
        pool.set_peers([self_url, silent_url.clone()]);
        group.register_peers(pool.clone()).unwrap();

        let key = key_owned_by(&pool, &silent_url);
        let ctx = RequestContext::with_timeout(Duration::from_secs(10));
        assert_eq!(
            group.get_with(&key, &ctx).await.unwrap(),
            Bytes::from(format!("A:{key}"))
        );
        assert_eq!(group.stats().peer_errors, 1);
        assert_eq!(origin.calls.load(Ordering::SeqCst), 1);
    }
}
