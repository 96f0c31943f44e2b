use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// UserId
// ---------------------------------------------------------------------------

/// Opaque identifier of a user document.
///
/// Backed by a UUIDv7, so ids sort in creation order. Serialises as the
/// canonical hyphenated string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    /// Mint a fresh, time-ordered id.
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Returned when a path segment or token does not hold a well-formed id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid user id: {0:?}")]
pub struct InvalidUserId(pub String);

impl FromStr for UserId {
    type Err = InvalidUserId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match Uuid::parse_str(trimmed) {
            Ok(u) if !u.is_nil() => Ok(Self(u)),
            _ => Err(InvalidUserId(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Relation
// ---------------------------------------------------------------------------

/// The three membership sets carried on every user document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    Followers,
    Following,
    FollowRequests,
}

impl Relation {
    pub const ALL: [Relation; 3] = [
        Relation::Followers,
        Relation::Following,
        Relation::FollowRequests,
    ];

    /// Stable storage key for this relation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Relation::Followers => "followers",
            Relation::Following => "following",
            Relation::FollowRequests => "follow_requests",
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Relation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "followers" => Ok(Relation::Followers),
            "following" => Ok(Relation::Following),
            "follow_requests" => Ok(Relation::FollowRequests),
            other => Err(format!("unknown relation {other:?}")),
        }
    }
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A user document.
///
/// The follow graph is stored as mirrored back-references: an edge
/// `A -> B` lives in both `A.following` and `B.followers`. Pending requests
/// live only on the target. The transitions in [`crate::graph`] keep both
/// halves in step; [`crate::graph::check_pair`] verifies them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: UserId,

    pub username: String,

    pub full_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,

    #[serde(default)]
    pub is_private: bool,

    #[serde(default)]
    pub followers: BTreeSet<UserId>,

    #[serde(default)]
    pub following: BTreeSet<UserId>,

    #[serde(default)]
    pub follow_requests: BTreeSet<UserId>,

    /// RFC 3339 creation timestamp.
    pub created_at: String,

    /// Revision counter used by storage for compare-and-swap. Starts at 0 and
    /// is bumped by every successful commit.
    #[serde(default)]
    pub version: u64,
}

impl User {
    /// Create a public user with empty relation sets.
    pub fn new(username: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            id: UserId::generate(),
            username: username.into(),
            full_name: full_name.into(),
            avatar: None,
            bio: None,
            is_private: false,
            followers: BTreeSet::new(),
            following: BTreeSet::new(),
            follow_requests: BTreeSet::new(),
            created_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            version: 0,
        }
    }

    pub fn relation(&self, relation: Relation) -> &BTreeSet<UserId> {
        match relation {
            Relation::Followers => &self.followers,
            Relation::Following => &self.following,
            Relation::FollowRequests => &self.follow_requests,
        }
    }

    pub fn relation_mut(&mut self, relation: Relation) -> &mut BTreeSet<UserId> {
        match relation {
            Relation::Followers => &mut self.followers,
            Relation::Following => &mut self.following,
            Relation::FollowRequests => &mut self.follow_requests,
        }
    }

    /// `true` if `id` appears in any of this user's relation sets.
    pub fn references(&self, id: &UserId) -> bool {
        Relation::ALL.iter().any(|r| self.relation(*r).contains(id))
    }

    /// Remove `id` from every relation set. Returns `true` if anything changed.
    pub fn forget(&mut self, id: &UserId) -> bool {
        let mut changed = false;
        for r in Relation::ALL {
            changed |= self.relation_mut(r).remove(id);
        }
        changed
    }

    /// Apply a profile edit. Relation sets, privacy and `version` are
    /// untouched.
    pub fn apply_edit(&mut self, edit: &ProfileEdit) {
        if let Some(name) = &edit.full_name {
            self.full_name = name.trim().to_string();
        }
        if let Some(avatar) = &edit.avatar {
            self.avatar = Some(avatar.trim().to_string()).filter(|a| !a.is_empty());
        }
        if let Some(bio) = &edit.bio {
            self.bio = Some(bio.clone()).filter(|b| !b.trim().is_empty());
        }
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            username: self.username.clone(),
            full_name: self.full_name.clone(),
            avatar: self.avatar.clone(),
        }
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            username: self.username.clone(),
            full_name: self.full_name.clone(),
            avatar: self.avatar.clone(),
            bio: self.bio.clone(),
            is_private: self.is_private,
            no_of_followers: self.followers.len(),
            no_of_following: self.following.len(),
            created_at: self.created_at.clone(),
        }
    }
}

/// Changes to a user's profile fields.
///
/// `None` leaves a field as it is. An empty `avatar` or `bio` clears it; an
/// empty `full_name` is kept and then fails validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileEdit {
    pub full_name: Option<String>,
    pub avatar: Option<String>,
    pub bio: Option<String>,
}

impl ProfileEdit {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none() && self.avatar.is_none() && self.bio.is_none()
    }
}

// ---------------------------------------------------------------------------
// Projections
// ---------------------------------------------------------------------------

/// The public projection returned in follower/following/request lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    #[serde(rename = "_id")]
    pub id: UserId,
    pub username: String,
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// Profile view: summary fields plus counts. Never includes set contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(rename = "_id")]
    pub id: UserId,
    pub username: String,
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    pub is_private: bool,
    pub no_of_followers: usize,
    pub no_of_following: usize,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_parses_canonical_uuid() {
        let id = UserId::generate();
        let parsed: UserId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn user_id_rejects_garbage_and_nil() {
        assert!("not-an-id".parse::<UserId>().is_err());
        assert!("".parse::<UserId>().is_err());
        assert!("00000000-0000-0000-0000-000000000000"
            .parse::<UserId>()
            .is_err());
    }

    #[test]
    fn user_ids_sort_in_creation_order() {
        let a = UserId::generate();
        let b = UserId::generate();
        assert!(a < b);
    }

    #[test]
    fn forget_scrubs_every_set() {
        let other = UserId::generate();
        let mut u = User::new("alice", "Alice");
        u.followers.insert(other);
        u.following.insert(other);
        u.follow_requests.insert(other);
        assert!(u.references(&other));
        assert!(u.forget(&other));
        assert!(!u.references(&other));
        assert!(!u.forget(&other));
    }

    #[test]
    fn user_serialises_with_wire_names() {
        let u = User::new("alice", "Alice Liddell");
        let json = serde_json::to_value(&u).unwrap();
        assert_eq!(json["_id"], u.id.to_string());
        assert_eq!(json["fullName"], "Alice Liddell");
        assert_eq!(json["isPrivate"], false);
        assert!(json["followRequests"].as_array().unwrap().is_empty());
        assert!(json.get("avatar").is_none());
    }

    #[test]
    fn profile_counts_edges() {
        let mut u = User::new("bob", "Bob");
        u.followers.insert(UserId::generate());
        u.followers.insert(UserId::generate());
        u.following.insert(UserId::generate());
        let p = u.profile();
        assert_eq!(p.no_of_followers, 2);
        assert_eq!(p.no_of_following, 1);
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["noOfFollowers"], 2);
        assert!(json.get("followers").is_none());
    }

    #[test]
    fn edit_replaces_and_clears_fields() {
        let mut u = User::new("bob", "Bob");
        u.bio = Some("old bio".into());
        u.avatar = Some("https://img.example/bob.png".into());
        u.followers.insert(UserId::generate());

        u.apply_edit(&ProfileEdit {
            full_name: Some("  Robert  ".into()),
            avatar: Some(" ".into()),
            bio: None,
        });
        assert_eq!(u.full_name, "Robert");
        assert!(u.avatar.is_none());
        assert_eq!(u.bio.as_deref(), Some("old bio"));
        assert_eq!(u.followers.len(), 1);

        assert!(ProfileEdit::default().is_empty());
    }

    #[test]
    fn relation_keys_roundtrip() {
        for r in Relation::ALL {
            assert_eq!(r.as_str().parse::<Relation>().unwrap(), r);
        }
    }
}
