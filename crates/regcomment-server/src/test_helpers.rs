use std::sync::Arc;

use axum::Router;
use regcomment_core::paths::normalize_prefix;
use regcomment_core::AttachmentPolicy;
use regcomment_store::MemoryStore;
use tokio::net::TcpListener;

use crate::routes::{build_router, AppState, InnerAppState};
use crate::signer::{LocalSigner, UploadBindings};

/// State with an in-memory store and the local signer rooted at `base_url`.
pub fn test_state(
    base_url: &str,
    policy: AttachmentPolicy,
    store: Arc<MemoryStore>,
) -> AppState {
    let bindings = Arc::new(UploadBindings::default());
    Arc::new(InnerAppState {
        policy,
        signer: Arc::new(LocalSigner::new(base_url, bindings.clone())),
        store,
        bindings,
        base_url: base_url.to_string(),
    })
}

/// Build a test router mounted under `prefix`, default policy.
pub fn test_router(prefix: &str) -> Router {
    test_router_with_policy(prefix, AttachmentPolicy::default())
}

pub fn test_router_with_policy(prefix: &str, policy: AttachmentPolicy) -> Router {
    let prefix = normalize_prefix(prefix);
    let state = test_state(
        &format!("http://test.invalid{prefix}"),
        policy,
        Arc::new(MemoryStore::new()),
    );
    build_router(state, &prefix)
}

/// A running test server and handles on its storage.
pub struct TestServer {
    /// Origin plus prefix, e.g. "http://127.0.0.1:12345/".
    pub base_url: String,
    /// Bare origin, e.g. "http://127.0.0.1:12345".
    pub origin: String,
    pub prefix: String,
    pub store: Arc<MemoryStore>,
    pub state: AppState,
    _handle: tokio::task::JoinHandle<()>,
}

/// Spawn an axum test server on a random port with the default policy.
pub async fn spawn_test_server() -> TestServer {
    spawn_test_server_with("/", AttachmentPolicy::default()).await
}

pub async fn spawn_test_server_with(prefix: &str, policy: AttachmentPolicy) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let prefix = normalize_prefix(prefix);
    let origin = format!("http://{addr}");
    let base_url = format!("{origin}{prefix}");
    let store = Arc::new(MemoryStore::new());
    let state = test_state(&base_url, policy, store.clone());
    let app = build_router(state.clone(), &prefix);
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    TestServer {
        base_url,
        origin,
        prefix,
        store,
        state,
        _handle: handle,
    }
}
