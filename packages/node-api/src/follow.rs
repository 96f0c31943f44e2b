//! Social-graph payloads under `/api/social`.
//!
//! Field names are camelCase on the wire (`noOfFollowers`,
//! `pendingRequests`, ...).

use kinship::{FollowStatus, UserSummary};
use serde::{Deserialize, Serialize};

/// `data` of `POST /api/social/toggle-follow/{targetUserId}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToggleFollowResponse {
    pub status: FollowStatus,
}

/// `data` of `GET /api/social/followers/{userId}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FollowersResponse {
    pub followers: Vec<UserSummary>,
    pub no_of_followers: usize,
}

impl FollowersResponse {
    pub fn new(followers: Vec<UserSummary>) -> Self {
        let no_of_followers = followers.len();
        Self {
            followers,
            no_of_followers,
        }
    }
}

/// `data` of `GET /api/social/following/{userId}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FollowingResponse {
    pub following: Vec<UserSummary>,
    pub no_of_following: usize,
}

impl FollowingResponse {
    pub fn new(following: Vec<UserSummary>) -> Self {
        let no_of_following = following.len();
        Self {
            following,
            no_of_following,
        }
    }
}

/// `data` of `GET /api/social/follow-requests`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PendingRequestsResponse {
    pub pending_requests: Vec<UserSummary>,
    pub no_of_pending_requests: usize,
}

impl PendingRequestsResponse {
    pub fn new(pending_requests: Vec<UserSummary>) -> Self {
        let no_of_pending_requests = pending_requests.len();
        Self {
            pending_requests,
            no_of_pending_requests,
        }
    }
}

/// `data` of `PATCH /api/social/toggle-privacy`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PrivacyResponse {
    pub is_private: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinship::User;

    #[test]
    fn toggle_status_wire_values() {
        let json = serde_json::to_string(&ToggleFollowResponse {
            status: FollowStatus::RequestCancelled,
        })
        .unwrap();
        assert_eq!(json, r#"{"status":"request_cancelled"}"#);
    }

    #[test]
    fn counts_match_list_length() {
        let a = User::new("alice", "Alice").summary();
        let b = User::new("bob", "Bob").summary();
        let resp = FollowersResponse::new(vec![a, b]);
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["noOfFollowers"], 2);
        assert_eq!(json["followers"][0]["fullName"], "Alice");
    }

    #[test]
    fn pending_requests_field_names() {
        let json = serde_json::to_value(PendingRequestsResponse::new(vec![])).unwrap();
        assert!(json["pendingRequests"].as_array().unwrap().is_empty());
        assert_eq!(json["noOfPendingRequests"], 0);
    }
}
