//! Liveness check at `GET /health`.

use axum::Json;
use serde_json::{json, Value};

/// `GET /health`
///
/// Answers without touching storage so orchestrators can poll it cheaply.
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
