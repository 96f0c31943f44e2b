//! Account handlers, mounted under `/api/user`.
//!
//! - `POST   /register`: create an account and issue an access token.
//! - `GET    /users`: paginated directory sorted by full name.
//! - `GET    /users/{name}`: the same directory filtered to one exact full name.
//! - `GET    /users/id/{userId}`: public profile with follower counts.
//! - `PUT    /users/{userId}`: edit the caller's own profile.
//! - `DELETE /users/{userId}`: delete the caller's own account.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use kinship::{validate_password, validate_user, User, UserProfile};
use kinship_node_api::{ApiResponse, RegisterRequest, UpdateProfileRequest, UserListParams, UserPage};

use crate::error::AppError;
use crate::middleware::auth::RequireAuth;
use crate::storage::{StorageError, UserQuery};

use super::auth::open_session;
use super::{parse_user_id, AppState};

const DEFAULT_PAGE_SIZE: i64 = 10;
const MAX_PAGE_SIZE: i64 = 100;

/// `POST /api/user/register`
///
/// Returns 400 for an unreadable body, 422 if a field fails validation, 409
/// if the username is taken, and 201 with the profile and an access token on
/// success. The token is also set as an `HttpOnly` cookie.
pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let mut user = User::new(req.username.trim(), req.full_name.trim());
    user.avatar = req.avatar.map(|a| a.trim().to_string()).filter(|a| !a.is_empty());
    user.bio = req.bio.filter(|b| !b.trim().is_empty());
    user.is_private = req.is_private;
    validate_user(&user)?;
    validate_password(&req.password)?;

    let hash = state.passwords.hash_password(req.password).await?;
    state
        .storage
        .create_user(&user, Some(&hash))
        .await
        .map_err(|e| match e {
            StorageError::Conflict(_) => {
                AppError::Conflict(format!("Username {} is already taken.", user.username))
            }
            other => other.into(),
        })?;

    let (cookie, session) = open_session(&state, &user)?;
    tracing::info!(user = %user.id, username = %user.username, private = user.is_private, "registered user");

    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie)],
        Json(ApiResponse::new(
            StatusCode::CREATED.as_u16(),
            session,
            "User registered successfully",
        )),
    ))
}

/// `GET /api/user/users?page=&limit=`
///
/// Requires a token. `page` defaults to 1 and `limit` to 10; non-positive
/// values and limits above 100 are refused with 400.
pub async fn list_users(
    State(state): State<AppState>,
    _auth: RequireAuth,
    params: Result<Query<UserListParams>, QueryRejection>,
) -> Result<Json<ApiResponse<UserPage>>, AppError> {
    let Query(params) = params.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let page = directory_page(&state, &params, None).await?;
    Ok(Json(ApiResponse::ok(page, "All users fetched with pagination and sorting.")))
}

/// `GET /api/user/users/{name}?page=&limit=`
///
/// Exact match on the trimmed full name. No match is an empty page, not 404.
pub async fn find_by_name(
    State(state): State<AppState>,
    _auth: RequireAuth,
    Path(name): Path<String>,
    params: Result<Query<UserListParams>, QueryRejection>,
) -> Result<Json<ApiResponse<UserPage>>, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("Name is required to get the user.".into()));
    }
    let Query(params) = params.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let page = directory_page(&state, &params, Some(name.to_string())).await?;
    Ok(Json(ApiResponse::ok(
        page,
        format!("Users found successfully with name {name}"),
    )))
}

async fn directory_page(
    state: &AppState,
    params: &UserListParams,
    full_name: Option<String>,
) -> Result<UserPage, AppError> {
    let page = params.page.unwrap_or(1);
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    if page < 1 {
        return Err(AppError::BadRequest("Page number must be a positive integer.".into()));
    }
    if limit < 1 {
        return Err(AppError::BadRequest("Limit must be a positive integer.".into()));
    }
    if limit > MAX_PAGE_SIZE {
        return Err(AppError::BadRequest(format!("Limit must not exceed {MAX_PAGE_SIZE}.")));
    }

    let (page, limit) = (page as u64, limit as u64);
    let listing = state
        .storage
        .list_users(&UserQuery {
            full_name,
            offset: (page - 1).saturating_mul(limit),
            limit,
        })
        .await?;
    let users = listing.users.iter().map(User::profile).collect();
    Ok(UserPage::new(users, page, limit, listing.total))
}

/// `GET /api/user/users/id/{userId}`
///
/// Profiles carry counts only, never relation contents, so they are served
/// for private accounts too.
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<UserProfile>>, AppError> {
    let id = parse_user_id(&user_id, "Invalid user ID format.")?;
    let user = state
        .storage
        .get_user(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user not found with given id {id}")))?;
    Ok(Json(ApiResponse::ok(
        user.profile(),
        format!("user found successfully with Id {id}"),
    )))
}

/// `PUT /api/user/users/{userId}`
///
/// Owner only. Absent fields are kept; the edited document is validated and
/// committed like any other graph write, so a follow landing at the same
/// time is preserved.
pub async fn update_user(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(user_id): Path<String>,
    body: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<UserProfile>>, AppError> {
    let id = parse_user_id(&user_id, "Invalid user ID format.")?;
    let Json(req) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let user = state
        .graph
        .update_profile(auth.user_id, id, req.into())
        .await?;
    Ok(Json(ApiResponse::ok(
        user.profile(),
        format!("User profile updated successfully for userId {id}"),
    )))
}

/// `DELETE /api/user/users/{userId}`
///
/// Only the account owner may delete it. Every reference to the account in
/// other users' relation sets is removed in the same commit.
pub async fn delete_user(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<Option<()>>>, AppError> {
    let id = parse_user_id(&user_id, "Invalid user ID format.")?;
    state.graph.delete_account(auth.user_id, id).await?;
    Ok(Json(ApiResponse::message_only(format!(
        "User deleted successfully with userId {id}"
    ))))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
