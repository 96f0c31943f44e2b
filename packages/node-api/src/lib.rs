//! Request and response types for the Kinship node API.
//!
//! Every success body is wrapped in an [`ApiResponse`] envelope and every
//! failure in an [`ErrorResponse`]. The payload types below are what sits in
//! the envelope's `data` field.
//!
//! # Endpoints covered
//!
//! | Method | Path | Type |
//! |--------|------|------|
//! | POST | `/api/social/toggle-follow/{targetUserId}` | → [`ToggleFollowResponse`] |
//! | POST | `/api/social/accept-request/{requesterId}` | → `null` |
//! | POST | `/api/social/reject-request/{requesterId}` | → `null` |
//! | GET | `/api/social/followers/{userId}` | → [`FollowersResponse`] |
//! | GET | `/api/social/following/{userId}` | → [`FollowingResponse`] |
//! | GET | `/api/social/follow-requests` | → [`PendingRequestsResponse`] |
//! | PATCH | `/api/social/toggle-privacy` | → [`PrivacyResponse`] |
//! | POST | `/api/user/register` | [`RegisterRequest`] → [`SessionResponse`] |
//! | GET | `/api/user/users` | [`UserListParams`] → [`UserPage`] |
//! | GET | `/api/user/users/{name}` | [`UserListParams`] → [`UserPage`] |
//! | GET | `/api/user/users/id/{userId}` | → [`kinship::UserProfile`] |
//! | PUT | `/api/user/users/{userId}` | [`UpdateProfileRequest`] → [`kinship::UserProfile`] |
//! | DELETE | `/api/user/users/{userId}` | → `null` |
//! | POST | `/api/auth/signin` | [`SignInRequest`] → [`SessionResponse`] |
//! | POST | `/api/auth/logout` | → `null` |

pub mod envelope;
pub mod error;
pub mod follow;
pub mod user;

pub use envelope::ApiResponse;
pub use error::ErrorResponse;
pub use follow::{
    FollowersResponse, FollowingResponse, PendingRequestsResponse, PrivacyResponse,
    ToggleFollowResponse,
};
pub use user::{
    RegisterRequest, SessionResponse, SignInRequest, UpdateProfileRequest, UserListParams,
    UserPage,
};
