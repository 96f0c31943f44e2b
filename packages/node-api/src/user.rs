//! Account payloads under `/api/user` and `/api/auth`.

use kinship::UserProfile;
use serde::{Deserialize, Serialize};

/// Request body for `POST /api/user/register`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,

    pub full_name: String,

    /// Plain-text password; only its Argon2 hash is stored.
    pub password: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,

    /// Start the account in private mode. Defaults to public.
    #[serde(default)]
    pub is_private: bool,
}

/// Request body for `POST /api/auth/signin`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SignInRequest {
    pub username: String,
    pub password: String,
}

/// `data` of `POST /api/user/register` and `POST /api/auth/signin`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user: UserProfile,

    /// Bearer credential for subsequent requests.
    pub access_token: String,

    /// RFC 3339 expiry of `access_token`.
    pub expires_at: String,
}

/// Request body for `PUT /api/user/users/{userId}`.
///
/// Absent fields are left unchanged. An empty `avatar` or `bio` clears it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

impl From<UpdateProfileRequest> for kinship::ProfileEdit {
    fn from(req: UpdateProfileRequest) -> Self {
        Self {
            full_name: req.full_name,
            avatar: req.avatar,
            bio: req.bio,
        }
    }
}

/// Query string of `GET /api/user/users` and `GET /api/user/users/{name}`.
///
/// `page` and `limit` are signed so that zero and negative values reach the
/// handler and get a specific error instead of a generic parse failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserListParams {
    #[serde(default)]
    pub page: Option<i64>,

    #[serde(default)]
    pub limit: Option<i64>,
}

/// `data` of `GET /api/user/users` and `GET /api/user/users/{name}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserPage {
    /// Profiles on this page, sorted by `fullName` (case-insensitive).
    pub users: Vec<UserProfile>,
    pub current_page: u64,
    /// `0` when nothing matches.
    pub total_pages: u64,
    pub total_count: u64,
    pub limit: u64,
}

impl UserPage {
    pub fn new(users: Vec<UserProfile>, page: u64, limit: u64, total_count: u64) -> Self {
        Self {
            users,
            current_page: page,
            total_pages: total_count.div_ceil(limit.max(1)),
            total_count,
            limit,
        }
    }
}
