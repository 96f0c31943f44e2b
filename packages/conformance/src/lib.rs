//! Shared helpers for the Kinship conformance test suite.
//!
//! Provides [`spawn_node`], which binds a `TcpListener` on an
//! ephemeral port, wires up an in-process node, and returns the local URL
//! together with the storage the node writes to, so tests can check stored
//! documents directly after driving the HTTP API.

use std::sync::Arc;

use kinship_node::{
    build_router, CredentialIssuer, MemoryStorage, NodeConfig, SignedTokenIssuer, SqliteStorage,
    Storage,
};

/// Start an ephemeral in-memory node and return `(base_url, storage)`.
///
/// The node runs in a background `tokio` task and is bound to an OS-assigned
/// port on `127.0.0.1`. The returned `String` is the base URL, e.g.
/// `http://127.0.0.1:51234`.
///
/// # Panics
///
/// Panics if the TCP listener cannot be bound.
pub async fn spawn_node() -> (String, Arc<dyn Storage>) {
    spawn_node_with(Arc::new(MemoryStorage::new())).await
}

/// Like [`spawn_node`], backed by an in-memory SQLite database.
pub async fn spawn_sqlite_node() -> (String, Arc<dyn Storage>) {
    let storage = SqliteStorage::open_in_memory().expect("open in-memory SQLite");
    spawn_node_with(Arc::new(storage)).await
}

/// Start a node over the given storage backend.
pub async fn spawn_node_with(storage: Arc<dyn Storage>) -> (String, Arc<dyn Storage>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("get local addr");
    let base_url = format!("http://{addr}");

    // Cheap Argon2 cost: every scenario registers several accounts.
    let config = NodeConfig {
        bind_addr: addr,
        password_memory_kib: 64,
        ..NodeConfig::default()
    };
    let credentials: Arc<dyn CredentialIssuer> = Arc::new(
        SignedTokenIssuer::load_or_generate(&storage, config.token_ttl_secs)
            .await
            .expect("load signing key"),
    );
    let router = build_router(Arc::clone(&storage), credentials, config);

    tokio::spawn(async move {
        axum::serve(listener, router)
            .await
            .expect("conformance node error");
    });

    (base_url, storage)
}
