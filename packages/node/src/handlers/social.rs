//! Social-graph handlers, mounted under `/api/social`.
//!
//! - `POST  /toggle-follow/{targetUserId}`: follow, unfollow, request, or cancel.
//! - `POST  /accept-request/{requesterId}`: accept a pending request.
//! - `POST  /reject-request/{requesterId}`: reject a pending request.
//! - `GET   /followers/{userId}`: who follows `userId`.
//! - `GET   /following/{userId}`: whom `userId` follows.
//! - `GET   /follow-requests`: the caller's pending requests.
//! - `PATCH /toggle-privacy`: flip the caller's privacy.
//!
//! Auth extractors are listed before `Path`, so a missing credential is
//! reported before a malformed id.

use axum::{
    extract::{Path, State},
    Json,
};
use kinship::{FollowStatus, PrivacyChange};
use kinship_node_api::{
    ApiResponse, FollowersResponse, FollowingResponse, PendingRequestsResponse, PrivacyResponse,
    ToggleFollowResponse,
};

use crate::error::AppError;
use crate::middleware::auth::{OptionalAuth, RequireAuth};

use super::{parse_user_id, AppState};

/// `POST /api/social/toggle-follow/{targetUserId}`
pub async fn toggle_follow(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(target): Path<String>,
) -> Result<Json<ApiResponse<ToggleFollowResponse>>, AppError> {
    let target = parse_user_id(&target, "Invalid target user ID format.")?;
    let outcome = state.graph.toggle_follow(auth.user_id, target).await?;

    let message = match outcome.status {
        FollowStatus::Followed => "Followed public account.",
        FollowStatus::Unfollowed if outcome.target_private => "Unfollowed private account.",
        FollowStatus::Unfollowed => "Unfollowed public account.",
        FollowStatus::Requested => "Follow request sent.",
        FollowStatus::RequestCancelled => "Follow request cancelled.",
    };
    Ok(Json(ApiResponse::ok(
        ToggleFollowResponse {
            status: outcome.status,
        },
        message,
    )))
}

/// `POST /api/social/accept-request/{requesterId}`
pub async fn accept_request(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(requester): Path<String>,
) -> Result<Json<ApiResponse<Option<()>>>, AppError> {
    let requester = parse_user_id(&requester, "Invalid requester ID format.")?;
    let requester = state.graph.accept_request(auth.user_id, requester).await?;
    Ok(Json(ApiResponse::message_only(format!(
        "Follow request from {} accepted.",
        requester.full_name
    ))))
}

/// `POST /api/social/reject-request/{requesterId}`
pub async fn reject_request(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(requester): Path<String>,
) -> Result<Json<ApiResponse<Option<()>>>, AppError> {
    let requester = parse_user_id(&requester, "Invalid requester ID format.")?;
    state.graph.reject_request(auth.user_id, requester).await?;
    Ok(Json(ApiResponse::message_only(format!(
        "Follow request from {requester} rejected."
    ))))
}

/// `GET /api/social/followers/{userId}`
///
/// Open for public accounts. For private accounts the caller must be the
/// owner or a follower: 401 when anonymous, 403 otherwise.
pub async fn followers(
    State(state): State<AppState>,
    OptionalAuth(viewer): OptionalAuth,
    Path(user): Path<String>,
) -> Result<Json<ApiResponse<FollowersResponse>>, AppError> {
    let user = parse_user_id(&user, "Invalid user ID format.")?;
    let list = state.graph.followers(viewer, user).await?;
    Ok(Json(ApiResponse::ok(
        FollowersResponse::new(list),
        "Followers fetched successfully.",
    )))
}

/// `GET /api/social/following/{userId}`
pub async fn following(
    State(state): State<AppState>,
    OptionalAuth(viewer): OptionalAuth,
    Path(user): Path<String>,
) -> Result<Json<ApiResponse<FollowingResponse>>, AppError> {
    let user = parse_user_id(&user, "Invalid user ID format.")?;
    let list = state.graph.following(viewer, user).await?;
    Ok(Json(ApiResponse::ok(
        FollowingResponse::new(list),
        "Following fetched successfully.",
    )))
}

/// `GET /api/social/follow-requests`
pub async fn follow_requests(
    State(state): State<AppState>,
    auth: RequireAuth,
) -> Result<Json<ApiResponse<PendingRequestsResponse>>, AppError> {
    let pending = state.graph.pending_requests(auth.user_id).await?;
    Ok(Json(ApiResponse::ok(
        PendingRequestsResponse::new(pending),
        "Pending follow requests fetched successfully.",
    )))
}

/// `PATCH /api/social/toggle-privacy`
pub async fn toggle_privacy(
    State(state): State<AppState>,
    auth: RequireAuth,
) -> Result<Json<ApiResponse<PrivacyResponse>>, AppError> {
    let change: PrivacyChange = state.graph.toggle_privacy(auth.user_id).await?;
    let is_private = change.is_private();
    let mode = if is_private { "private" } else { "public" };
    Ok(Json(ApiResponse::ok(
        PrivacyResponse { is_private },
        format!("Account privacy set to {mode}."),
    )))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use kinship::UserId;

    use crate::handlers::test_support::TestApp;

    fn toggle(id: &str) -> String {
        format!("/api/social/toggle-follow/{id}")
    }

    #[tokio::test]
    async fn public_follow_roundtrip() {
        let app = TestApp::new();
        let a = app.register("alice", false).await;
        let b = app.register("bob", false).await;

        let (s, body) = app.send("POST", &toggle(&b.id), Some(&a.token), None).await;
        assert_eq!(s, StatusCode::OK);
        assert_eq!(body["data"]["status"], "followed");
        assert_eq!(body["message"], "Followed public account.");
        assert_eq!(body["statusCode"], 200);

        let (_, body) = app
            .send("GET", &format!("/api/social/followers/{}", b.id), None, None)
            .await;
        assert_eq!(body["data"]["noOfFollowers"], 1);
        assert_eq!(body["data"]["followers"][0]["_id"], a.id.as_str());

        let (_, body) = app.send("POST", &toggle(&b.id), Some(&a.token), None).await;
        assert_eq!(body["data"]["status"], "unfollowed");
        assert_eq!(body["message"], "Unfollowed public account.");

        let (_, body) = app
            .send("GET", &format!("/api/social/following/{}", a.id), None, None)
            .await;
        assert_eq!(body["data"]["noOfFollowing"], 0);
    }

    #[tokio::test]
    async fn private_request_then_accept() {
        let app = TestApp::new();
        let a = app.register("alice", false).await;
        let c = app.register("carol", true).await;

        let (_, body) = app.send("POST", &toggle(&c.id), Some(&a.token), None).await;
        assert_eq!(body["data"]["status"], "requested");
        assert_eq!(body["message"], "Follow request sent.");

        let (s, body) = app
            .send("GET", "/api/social/follow-requests", Some(&c.token), None)
            .await;
        assert_eq!(s, StatusCode::OK);
        assert_eq!(body["data"]["noOfPendingRequests"], 1);

        let (s, body) = app
            .send(
                "POST",
                &format!("/api/social/accept-request/{}", a.id),
                Some(&c.token),
                None,
            )
            .await;
        assert_eq!(s, StatusCode::OK);
        assert_eq!(body["message"], "Follow request from alice full accepted.");
        assert!(body["data"].is_null());

        // Now a follower, alice may see carol's lists.
        let (s, _) = app
            .send(
                "GET",
                &format!("/api/social/followers/{}", c.id),
                Some(&a.token),
                None,
            )
            .await;
        assert_eq!(s, StatusCode::OK);

        let (_, body) = app.send("POST", &toggle(&c.id), Some(&a.token), None).await;
        assert_eq!(body["message"], "Unfollowed private account.");
    }

    #[tokio::test]
    async fn cancel_and_reject() {
        let app = TestApp::new();
        let a = app.register("alice", false).await;
        let c = app.register("carol", true).await;

        app.send("POST", &toggle(&c.id), Some(&a.token), None).await;
        let (_, body) = app.send("POST", &toggle(&c.id), Some(&a.token), None).await;
        assert_eq!(body["data"]["status"], "request_cancelled");

        app.send("POST", &toggle(&c.id), Some(&a.token), None).await;
        let uri = format!("/api/social/reject-request/{}", a.id);
        let (s, body) = app.send("POST", &uri, Some(&c.token), None).await;
        assert_eq!(s, StatusCode::OK);
        assert_eq!(body["message"], format!("Follow request from {} rejected.", a.id));

        let (s, body) = app.send("POST", &uri, Some(&c.token), None).await;
        assert_eq!(s, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "not_found");
    }

    #[tokio::test]
    async fn refusals_map_to_status_codes() {
        let app = TestApp::new();
        let a = app.register("alice", false).await;
        let c = app.register("carol", true).await;

        // No credential at all.
        let (s, body) = app.send("POST", &toggle(&c.id), None, None).await;
        assert_eq!(s, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "unauthorized");

        // Auth is checked before the id format.
        let (s, _) = app.send("POST", &toggle("not-a-uuid"), None, None).await;
        assert_eq!(s, StatusCode::UNAUTHORIZED);
        let (s, body) = app
            .send("POST", &toggle("not-a-uuid"), Some(&a.token), None)
            .await;
        assert_eq!(s, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid_identifier");

        let (s, body) = app.send("POST", &toggle(&a.id), Some(&a.token), None).await;
        assert_eq!(s, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "self_reference");

        let (s, _) = app
            .send("POST", &toggle(&UserId::generate().to_string()), Some(&a.token), None)
            .await;
        assert_eq!(s, StatusCode::NOT_FOUND);

        // Public accounts have no requests to list.
        let (s, body) = app
            .send("GET", "/api/social/follow-requests", Some(&a.token), None)
            .await;
        assert_eq!(s, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid_state");

        // Private lists: 401 anonymous, 403 stranger.
        let uri = format!("/api/social/following/{}", c.id);
        let (s, _) = app.send("GET", &uri, None, None).await;
        assert_eq!(s, StatusCode::UNAUTHORIZED);
        let (s, body) = app.send("GET", &uri, Some(&a.token), None).await;
        assert_eq!(s, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "forbidden");

        // A garbage token counts as anonymous on optional-auth routes.
        let (s, _) = app.send("GET", &uri, Some("garbage"), None).await;
        assert_eq!(s, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn going_public_accepts_pending() {
        let app = TestApp::new();
        let a = app.register("alice", false).await;
        let b = app.register("bob", false).await;
        let c = app.register("carol", true).await;

        app.send("POST", &toggle(&c.id), Some(&a.token), None).await;
        app.send("POST", &toggle(&c.id), Some(&b.token), None).await;

        let (s, body) = app
            .send("PATCH", "/api/social/toggle-privacy", Some(&c.token), None)
            .await;
        assert_eq!(s, StatusCode::OK);
        assert_eq!(body["data"]["isPrivate"], false);
        assert_eq!(body["message"], "Account privacy set to public.");

        let (_, body) = app
            .send("GET", &format!("/api/social/followers/{}", c.id), None, None)
            .await;
        assert_eq!(body["data"]["noOfFollowers"], 2);

        let (_, body) = app
            .send("PATCH", "/api/social/toggle-privacy", Some(&c.token), None)
            .await;
        assert_eq!(body["data"]["isPrivate"], true);
        assert_eq!(body["message"], "Account privacy set to private.");
    }
}
