//! Assembles the Axum [`Router`] from all handler modules.

use std::sync::Arc;

use axum::{
    routing::{get, patch, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::{
    config::NodeConfig,
    credentials::CredentialIssuer,
    handlers::{auth, node, social, users, AppState},
    middleware::rate_limit::{rate_limit_middleware, RateLimiter},
    passwords::Passwords,
    social::SocialGraph,
    storage::Storage,
};

/// Build the complete application router with shared state.
pub fn build_router(
    storage: Arc<dyn Storage>,
    credentials: Arc<dyn CredentialIssuer>,
    config: NodeConfig,
) -> Router {
    // Build the per-IP rate limiter from config (0 = disabled).
    let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit_per_minute));

    let state = AppState {
        graph: SocialGraph::new(Arc::clone(&storage), config.max_commit_attempts),
        passwords: Passwords::new(config.password_memory_kib),
        storage,
        config,
        credentials,
    };

    let social_routes = Router::new()
        .route("/toggle-follow/{target_user_id}", post(social::toggle_follow))
        .route("/accept-request/{requester_id}", post(social::accept_request))
        .route("/reject-request/{requester_id}", post(social::reject_request))
        .route("/followers/{user_id}", get(social::followers))
        .route("/following/{user_id}", get(social::following))
        .route("/follow-requests", get(social::follow_requests))
        .route("/toggle-privacy", patch(social::toggle_privacy));

    let user_routes = Router::new()
        .route("/register", post(users::register))
        .route("/users", get(users::list_users))
        .route("/users/id/{user_id}", get(users::get_user))
        .route(
            "/users/{user_id}",
            get(users::find_by_name)
                .put(users::update_user)
                .delete(users::delete_user),
        );

    let auth_routes = Router::new()
        .route("/signin", post(auth::signin))
        .route("/logout", post(auth::logout));

    Router::new()
        .route("/health", get(node::health))
        .nest("/api/social", social_routes)
        .nest("/api/user", user_routes)
        .nest("/api/auth", auth_routes)
        .with_state(state)
        // Rate limiting layer applied after routing so it can see the full request.
        .layer(axum::middleware::from_fn(move |req, next| {
            rate_limit_middleware(Arc::clone(&rate_limiter), req, next)
        }))
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::{body::Body, http::Request, http::StatusCode};
    use tower::ServiceExt;

    use crate::{credentials::SignedTokenIssuer, storage::memory::MemoryStorage};

    #[tokio::test]
    async fn rate_limit_applies_per_client() {
        let config = NodeConfig {
            rate_limit_per_minute: 2,
            ..NodeConfig::default()
        };
        let app = build_router(
            Arc::new(MemoryStorage::new()),
            Arc::new(SignedTokenIssuer::ephemeral(60)),
            config,
        );

        let health_from = |ip: &str| {
            Request::builder()
                .uri("/health")
                .header("x-forwarded-for", ip)
                .body(Body::empty())
                .unwrap()
        };

        for _ in 0..2 {
            let resp = app.clone().oneshot(health_from("1.1.1.1")).await.unwrap();
            assert_eq!(resp.status(), StatusCode::OK);
        }
        let resp = app.clone().oneshot(health_from("1.1.1.1")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(resp.headers().contains_key("retry-after"));

        let resp = app.clone().oneshot(health_from("2.2.2.2")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let app = build_router(
            Arc::new(MemoryStorage::new()),
            Arc::new(SignedTokenIssuer::ephemeral(60)),
            NodeConfig::default(),
        );
        let resp = app
            .oneshot(Request::builder().uri("/v1/units").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
