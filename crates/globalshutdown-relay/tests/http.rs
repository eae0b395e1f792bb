use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use globalshutdown_relay::{
    Admission, HttpOptions, Identity, InsertOutcome, MemoryStore, OriginHash, OriginHasher,
    Policy, Relay, RelayError, SignalEntry, SignalStore, serve,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct TestRelay {
    base: String,
    client: reqwest::Client,
    relay: Arc<Relay>,
    token: CancellationToken,
    handle: JoinHandle<std::io::Result<()>>,
}

impl TestRelay {
    async fn start(policy: Policy, options: HttpOptions) -> Self {
        Self::start_with_store(Arc::new(MemoryStore::new()), policy, options).await
    }

    async fn start_with_store(
        store: Arc<dyn SignalStore>,
        policy: Policy,
        options: HttpOptions,
    ) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        let relay = Arc::new(Relay::new(store, OriginHasher::random(), policy));
        let token = CancellationToken::new();
        let handle = tokio::spawn(serve(listener, Arc::clone(&relay), options, token.clone()));
        Self {
            base: format!("http://{addr}"),
            client: reqwest::Client::new(),
            relay,
            token,
            handle,
        }
    }

    async fn post(&self, path: &str, body: &str) -> reqwest::Response {
        self.client
            .post(format!("{}{path}", self.base))
            .header("content-type", "application/json")
            .body(body.to_string())
            .send()
            .await
            .unwrap()
    }

    async fn arm(&self, identity: &str) -> u16 {
        self.post("/shutdown", &json(identity)).await.status().as_u16()
    }

    async fn pending(&self, identity: &str) -> bool {
        let resp = self.post("/pending", &json(identity)).await;
        assert_eq!(resp.status().as_u16(), 200);
        serde_json::from_str(&resp.text().await.unwrap()).unwrap()
    }

    async fn stop(self) {
        let TestRelay {
            client,
            token,
            handle,
            ..
        } = self;
        // Close pooled keep-alive connections so graceful shutdown has nothing to wait for
        drop(client);
        token.cancel();
        handle.await.unwrap().unwrap();
    }
}

/// Reads go to `inner`; every write fails as if the database went away.
#[derive(Default)]
struct ReadOnlyStore {
    inner: MemoryStore,
}

fn unavailable() -> RelayError {
    RelayError::StoreUnavailable("disk detached".to_string())
}

impl SignalStore for ReadOnlyStore {
    fn insert(&self, _: Identity, _: OriginHash, _: DateTime<Utc>) -> Result<bool, RelayError> {
        Err(unavailable())
    }

    fn insert_within_limit(
        &self,
        _: Identity,
        _: OriginHash,
        _: DateTime<Utc>,
        _: Admission,
    ) -> Result<InsertOutcome, RelayError> {
        Err(unavailable())
    }

    fn count_by_origin(&self, origin: &OriginHash) -> Result<usize, RelayError> {
        self.inner.count_by_origin(origin)
    }

    fn take_if_present(&self, _: &Identity) -> Result<bool, RelayError> {
        Err(unavailable())
    }

    fn sweep(&self, _: DateTime<Utc>, _: Duration) -> Result<usize, RelayError> {
        Err(unavailable())
    }

    fn evict_over_capacity(&self, _: usize) -> Result<usize, RelayError> {
        Err(unavailable())
    }

    fn get(&self, identity: &Identity) -> Result<Option<SignalEntry>, RelayError> {
        self.inner.get(identity)
    }

    fn len(&self) -> Result<usize, RelayError> {
        self.inner.len()
    }
}

fn json(s: &str) -> String {
    serde_json::to_string(s).unwrap()
}

fn new_id() -> String {
    Identity::generate().to_string()
}

#[tokio::test]
async fn arm_then_consume_once() {
    let relay = TestRelay::start(Policy::default(), HttpOptions::default()).await;
    let id = new_id();

    assert!(!relay.pending(&id).await);
    assert_eq!(relay.arm(&id).await, 200);
    assert_eq!(relay.arm(&id).await, 200);
    assert_eq!(relay.relay.store().len().unwrap(), 1);
    assert!(relay.pending(&id).await);
    assert!(!relay.pending(&id).await);

    relay.stop().await;
}

#[tokio::test]
async fn pending_answers_json_bool() {
    let relay = TestRelay::start(Policy::default(), HttpOptions::default()).await;
    let id = new_id();
    relay.arm(&id).await;

    let resp = relay.post("/pending", &json(&id)).await;
    assert_eq!(
        resp.headers()["content-type"].to_str().unwrap(),
        "application/json"
    );
    assert_eq!(resp.text().await.unwrap(), "true");

    relay.stop().await;
}

#[tokio::test]
async fn malformed_requests_are_client_errors() {
    let relay = TestRelay::start(Policy::default(), HttpOptions::default()).await;

    for body in [json(""), json("machine-1"), "not json".to_string(), "42".to_string()] {
        assert_eq!(relay.post("/shutdown", &body).await.status().as_u16(), 400);
        assert_eq!(relay.post("/pending", &body).await.status().as_u16(), 400);
    }
    assert!(relay.relay.store().is_empty().unwrap());

    relay.stop().await;
}

#[tokio::test]
async fn body_decoded_without_content_type() {
    let relay = TestRelay::start(Policy::default(), HttpOptions::default()).await;
    let id = new_id();

    let resp = relay
        .client
        .post(format!("{}/shutdown", relay.base))
        .body(json(&id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    assert!(relay.pending(&id).await);

    relay.stop().await;
}

#[tokio::test]
async fn sixth_arm_is_rate_limited() {
    let relay = TestRelay::start(
        Policy::unrestricted().with_rate_limit(5),
        HttpOptions::default(),
    )
    .await;

    for _ in 0..5 {
        assert_eq!(relay.arm(&new_id()).await, 200);
    }
    let sixth = new_id();
    assert_eq!(relay.arm(&sixth).await, 429);
    assert!(!relay.pending(&sixth).await);

    relay.stop().await;
}

#[tokio::test]
async fn forwarded_for_separates_origins_when_trusted() {
    let relay = TestRelay::start(
        Policy::unrestricted().with_rate_limit(1),
        HttpOptions {
            trust_forwarded_for: true,
        },
    )
    .await;

    for client_ip in ["203.0.113.1", "203.0.113.2"] {
        let resp = relay
            .client
            .post(format!("{}/shutdown", relay.base))
            .header("x-forwarded-for", client_ip)
            .body(json(&new_id()))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200, "{client_ip}");
    }

    relay.stop().await;
}

#[tokio::test]
async fn forwarded_for_ignored_when_untrusted() {
    let relay = TestRelay::start(
        Policy::unrestricted().with_rate_limit(1),
        HttpOptions::default(),
    )
    .await;

    let mut statuses = Vec::new();
    for client_ip in ["203.0.113.1", "203.0.113.2"] {
        let resp = relay
            .client
            .post(format!("{}/shutdown", relay.base))
            .header("x-forwarded-for", client_ip)
            .body(json(&new_id()))
            .send()
            .await
            .unwrap();
        statuses.push(resp.status().as_u16());
    }
    assert_eq!(statuses, vec![200, 429]);

    relay.stop().await;
}

#[tokio::test]
async fn client_supplied_forwarded_entries_ignored() {
    let relay = TestRelay::start(
        Policy::unrestricted().with_rate_limit(1),
        HttpOptions {
            trust_forwarded_for: true,
        },
    )
    .await;

    // Same proxy-appended address, different client-forged prefixes
    let mut statuses = Vec::new();
    for forged in ["198.51.100.7", "198.51.100.8"] {
        let resp = relay
            .client
            .post(format!("{}/shutdown", relay.base))
            .header("x-forwarded-for", format!("{forged}, 203.0.113.1"))
            .body(json(&new_id()))
            .send()
            .await
            .unwrap();
        statuses.push(resp.status().as_u16());
    }
    assert_eq!(statuses, vec![200, 429]);

    relay.stop().await;
}

#[tokio::test]
async fn store_failure_is_server_error_without_mutation() {
    let store = Arc::new(ReadOnlyStore::default());
    let armed = Identity::generate();
    store
        .inner
        .insert(armed, OriginHasher::random().hash("192.0.2.1"), Utc::now())
        .unwrap();
    let relay = TestRelay::start_with_store(
        store.clone(),
        Policy::default(),
        HttpOptions::default(),
    )
    .await;

    let resp = relay.post("/shutdown", &json(&new_id())).await;
    assert_eq!(resp.status().as_u16(), 500);
    let resp = relay.post("/pending", &json(&armed.to_string())).await;
    assert_eq!(resp.status().as_u16(), 500);

    assert_eq!(store.len().unwrap(), 1);
    assert!(store.get(&armed).unwrap().is_some());

    relay.stop().await;
}

#[tokio::test]
async fn concurrent_pollers_see_signal_once() {
    let relay = Arc::new(TestRelay::start(Policy::default(), HttpOptions::default()).await);
    let id = new_id();
    relay.arm(&id).await;

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let relay = Arc::clone(&relay);
        let id = id.clone();
        tasks.push(tokio::spawn(async move { relay.pending(&id).await }));
    }
    let mut hits = 0;
    for task in tasks {
        if task.await.unwrap() {
            hits += 1;
        }
    }
    assert_eq!(hits, 1);

    let relay = Arc::into_inner(relay).unwrap();
    relay.stop().await;
}

#[tokio::test]
async fn health_is_ok() {
    let relay = TestRelay::start(Policy::default(), HttpOptions::default()).await;
    let resp = relay
        .client
        .get(format!("{}/health", relay.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(resp.text().await.unwrap(), "ok");
    relay.stop().await;
}
