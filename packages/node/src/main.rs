//! `kinship-node`: the Kinship social-graph server.
//!
//! # Quick start
//!
//! ```sh
//! # In-memory node on the default port:
//! kinship-node
//!
//! # Persistent SQLite node:
//! KINSHIP_DB=./kinship.db kinship-node
//!
//! # Custom bind address and a per-IP request cap:
//! KINSHIP_BIND=127.0.0.1:8080 KINSHIP_RATE_LIMIT_PER_MINUTE=120 kinship-node
//! ```
//!
//! # Environment variables
//!
//! See [`kinship_node::NodeConfig::from_env`] for the full list.

use std::sync::Arc;

use kinship_node::{
    build_router, CredentialIssuer, MemoryStorage, NodeConfig, SignedTokenIssuer, SqliteStorage,
    Storage,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kinship_node=info,tower_http=debug".into()),
        )
        .init();

    let config = NodeConfig::from_env();

    let storage: Arc<dyn Storage> = match &config.db_path {
        Some(path) => {
            tracing::info!("storage: SQLite at {path}");
            Arc::new(
                SqliteStorage::open(path)
                    .unwrap_or_else(|e| panic!("failed to open SQLite database at {path}: {e}")),
            )
        }
        None => {
            tracing::info!("storage: in-memory (data will not survive restart)");
            Arc::new(MemoryStorage::new())
        }
    };

    let credentials: Arc<dyn CredentialIssuer> = Arc::new(
        SignedTokenIssuer::load_or_generate(&storage, config.token_ttl_secs)
            .await
            .unwrap_or_else(|e| panic!("failed to load credential signing key: {e}")),
    );

    let app = build_router(storage, credentials, config.clone());

    tracing::info!("listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {e}", config.bind_addr));

    axum::serve(listener, app).await.expect("server error");
}
