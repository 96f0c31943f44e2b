//! Session handlers, mounted under `/api/auth`.
//!
//! - `POST /signin`: check a username/password pair and issue a fresh token.
//! - `POST /logout`: expire the `accessToken` cookie.
//!
//! Tokens are stateless, so logging out cannot revoke one that the client
//! kept; it stays valid until its `expiresAt`.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderValue},
    response::IntoResponse,
    Json,
};
use kinship::User;
use kinship_node_api::{ApiResponse, SessionResponse, SignInRequest};

use crate::credentials::Credential;
use crate::error::AppError;
use crate::middleware::auth::{RequireAuth, ACCESS_TOKEN_COOKIE};

use super::AppState;

/// `POST /api/auth/signin`
///
/// 400 for a missing field, 404 for an unknown username, 401 for a wrong
/// password. On success the token is returned in the body and set as a
/// cookie, exactly as at registration.
pub async fn signin(
    State(state): State<AppState>,
    body: Result<Json<SignInRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let username = req.username.trim();
    if username.is_empty() {
        return Err(AppError::BadRequest("Username is required to sign in.".into()));
    }
    if req.password.is_empty() {
        return Err(AppError::BadRequest("Password is required to sign in.".into()));
    }

    let user = state.storage.find_by_username(username).await?.ok_or_else(|| {
        AppError::NotFound(
            "User not found with the provided credentials. Please register or check your input."
                .into(),
        )
    })?;
    let hash = state
        .storage
        .get_password_hash(&user.id)
        .await?
        .ok_or_else(|| {
            AppError::Internal(format!("user {} has no stored password hash", user.id))
        })?;

    if !state.passwords.verify_password(req.password, hash).await? {
        tracing::debug!(user = %user.id, "sign-in refused: wrong password");
        return Err(AppError::Unauthorized(
            "Invalid credentials. Please check your password.".into(),
        ));
    }

    tracing::info!(user = %user.id, "signed in");
    let (cookie, session) = open_session(&state, &user)?;
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(ApiResponse::ok(session, "User logged in successfully")),
    ))
}

/// `POST /api/auth/logout`
///
/// Requires a valid token so that a stray request cannot be mistaken for a
/// successful logout.
pub async fn logout(
    State(state): State<AppState>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, AppError> {
    let cookie = expired_cookie(state.config.secure_cookies)?;
    tracing::info!(user = %auth.user_id, "logged out");
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(ApiResponse::message_only("You are logged out successfully.")),
    ))
}

/// Issue a credential for `user`: the `Set-Cookie` value plus the response
/// payload. Shared by registration and sign-in.
pub(crate) fn open_session(
    state: &AppState,
    user: &User,
) -> Result<(HeaderValue, SessionResponse), AppError> {
    let credential = state.credentials.issue(&user.id);
    let cookie = access_cookie(&credential, state.config.secure_cookies)?;
    let session = SessionResponse {
        user: user.profile(),
        access_token: credential.token,
        expires_at: credential
            .expires_at
            .to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
    };
    Ok((cookie, session))
}

fn access_cookie(credential: &Credential, secure: bool) -> Result<HeaderValue, AppError> {
    let max_age = (credential.expires_at - chrono::Utc::now()).num_seconds().max(0);
    cookie_header(&credential.token, max_age, secure)
}

fn expired_cookie(secure: bool) -> Result<HeaderValue, AppError> {
    cookie_header("", 0, secure)
}

fn cookie_header(value: &str, max_age: i64, secure: bool) -> Result<HeaderValue, AppError> {
    let mut cookie =
        format!("{ACCESS_TOKEN_COOKIE}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).map_err(|e| AppError::Internal(format!("bad cookie: {e}")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
