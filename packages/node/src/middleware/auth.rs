//! Access-token authentication extractors.
//!
//! Provides two extractors:
//! - [`RequireAuth`]: requires a valid access token naming an existing user;
//!   returns 401 if absent or invalid.
//! - [`OptionalAuth`]: accepts requests with or without a valid token. An
//!   unusable token is treated as anonymous, but a storage failure while
//!   checking it is still a 500.
//!
//! The token is read from `Authorization: Bearer <token>` first (scheme
//! matched case-insensitively), then from an `accessToken` cookie.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use kinship::UserId;

use crate::{error::AppError, handlers::AppState};

/// Name of the cookie carrying the access token.
pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";

// ---------------------------------------------------------------------------
// RequireAuth extractor
// ---------------------------------------------------------------------------

/// Axum extractor that requires a valid access token.
///
/// Returns 401 if the token is missing, malformed, expired, or names a user
/// that no longer exists.
pub struct RequireAuth {
    pub user_id: UserId,
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let app_state = AppState::from_ref(state);
        let token = extract_token(parts);
        async move {
            let token = token.ok_or_else(|| {
                AppError::Unauthorized(
                    "Access Denied / Unauthorized request: No access token provided.".into(),
                )
            })?;
            let user_id = authenticate(&app_state, &token).await?;
            Ok(RequireAuth { user_id })
        }
    }
}

// ---------------------------------------------------------------------------
// OptionalAuth extractor
// ---------------------------------------------------------------------------

/// Axum extractor that accepts requests with or without a valid token.
///
/// Yields `Some(user_id)` if a valid token is present, `None` if the token is
/// absent, invalid, expired or names a deleted user. Rejects only with
/// [`AppError::Internal`].
pub struct OptionalAuth(pub Option<UserId>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let app_state = AppState::from_ref(state);
        let token = extract_token(parts);
        async move {
            let Some(token) = token else {
                return Ok(OptionalAuth(None));
            };
            match authenticate(&app_state, &token).await {
                Ok(user_id) => Ok(OptionalAuth(Some(user_id))),
                Err(e @ AppError::Internal(_)) => Err(e),
                Err(e) => {
                    tracing::debug!(error = ?e, "ignoring unusable access token");
                    Ok(OptionalAuth(None))
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Core verification logic
// ---------------------------------------------------------------------------

/// Verify `token` and confirm the user it names still exists.
async fn authenticate(state: &AppState, token: &str) -> Result<UserId, AppError> {
    let user_id = state.credentials.verify(token)?;
    match state.storage.get_user(&user_id).await? {
        Some(_) => Ok(user_id),
        None => Err(AppError::Unauthorized(
            "Access Denied / Unauthorized request: User not found or token invalid.".into(),
        )),
    }
}

/// Pull the raw token from the `Authorization` header or the cookie jar.
fn extract_token(parts: &Parts) -> Option<String> {
    let bearer = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim_start().split_once(' '))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
        .map(|(_, token)| token.trim())
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == ACCESS_TOKEN_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|t| !t.is_empty())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use axum::http::{Request, StatusCode};

    use crate::handlers::test_support::{FailingReads, TestApp};

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/");
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn bearer_header_wins() {
        let p = parts(&[
            ("authorization", "Bearer abc"),
            ("cookie", "accessToken=def"),
        ]);
        assert_eq!(extract_token(&p).as_deref(), Some("abc"));
    }

    #[test]
    fn bearer_scheme_ignores_case() {
        for header in ["bearer abc", "BEARER abc", "BeArEr   abc "] {
            let p = parts(&[("authorization", header)]);
            assert_eq!(extract_token(&p).as_deref(), Some("abc"), "{header}");
        }
    }

    #[test]
    fn cookie_is_fallback() {
        let p = parts(&[("cookie", "theme=dark; accessToken=def; other=1")]);
        assert_eq!(extract_token(&p).as_deref(), Some("def"));
    }

    #[test]
    fn no_token_anywhere() {
        assert!(extract_token(&parts(&[])).is_none());
        assert!(extract_token(&parts(&[("authorization", "Basic Zm9v")])).is_none());
        assert!(extract_token(&parts(&[("cookie", "accessToken=")])).is_none());
        assert!(extract_token(&parts(&[("authorization", "Bearerabc")])).is_none());
    }

    #[tokio::test]
    async fn optional_auth_surfaces_storage_failure() {
        let storage = Arc::new(FailingReads::default());
        let app = TestApp::with_storage(storage.clone());
        let viewer = app.register("viewer", false).await;
        let target = app.register("target", false).await;

        let uri = format!("/api/social/followers/{}", target.id);
        let (s, _) = app.send("GET", &uri, Some(&viewer.token), None).await;
        assert_eq!(s, StatusCode::OK);

        storage.fail_reads_of(viewer.id.parse().unwrap());
        let (s, body) = app.send("GET", &uri, Some(&viewer.token), None).await;
        assert_eq!(s, StatusCode::INTERNAL_SERVER_ERROR, "{body}");
        assert_eq!(body["code"], "internal_error");

        // Without a token the viewer's document is never read.
        let (s, _) = app.send("GET", &uri, None, None).await;
        assert_eq!(s, StatusCode::OK);
    }

    #[tokio::test]
    async fn optional_auth_treats_bad_tokens_as_anonymous() {
        let app = TestApp::new();
        let target = app.register("target", false).await;
        let uri = format!("/api/social/followers/{}", target.id);

        let (s, _) = app.send("GET", &uri, Some("not-a-token"), None).await;
        assert_eq!(s, StatusCode::OK);

        let ghost = app.register("ghost", false).await;
        let (s, _) = app
            .send("DELETE", &format!("/api/user/users/{}", ghost.id), Some(&ghost.token), None)
            .await;
        assert_eq!(s, StatusCode::OK);
        let (s, _) = app.send("GET", &uri, Some(&ghost.token), None).await;
        assert_eq!(s, StatusCode::OK);
    }
}
