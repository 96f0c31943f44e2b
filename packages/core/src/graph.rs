//! The follow/privacy state machine.
//!
//! Every transition here is pure: it takes the user documents involved by
//! `&mut`, mutates the in-memory copies, and reports what happened. Nothing
//! is persisted. Callers commit the touched documents together in a single
//! atomic write so that neither half of an edge is ever observable alone.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Relation, User, UserId};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a social-graph transition was refused.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SocialError {
    /// The caller targeted their own account.
    #[error("{0}")]
    SelfReference(String),

    /// A user or a pending request does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The action is undefined for the account's current privacy mode.
    #[error("{0}")]
    InvalidState(String),

    /// The caller is authenticated but may not see the requested data.
    #[error("{0}")]
    Forbidden(String),

    /// The action requires an authenticated caller.
    #[error("{0}")]
    Unauthorized(String),
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Result of [`toggle_follow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowStatus {
    Followed,
    Unfollowed,
    Requested,
    RequestCancelled,
}

impl std::fmt::Display for FollowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            FollowStatus::Followed => "followed",
            FollowStatus::Unfollowed => "unfollowed",
            FollowStatus::Requested => "requested",
            FollowStatus::RequestCancelled => "request_cancelled",
        })
    }
}

/// Result of [`toggle_privacy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrivacyChange {
    /// public -> private. Existing edges are untouched.
    MadePrivate,
    /// private -> public. `accepted` requesters became followers; `dropped`
    /// were pending ids with no loaded document (deleted accounts).
    MadePublic {
        accepted: Vec<UserId>,
        dropped: Vec<UserId>,
    },
}

impl PrivacyChange {
    pub fn is_private(&self) -> bool {
        matches!(self, PrivacyChange::MadePrivate)
    }
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

/// Follow, unfollow, request or cancel a request, depending on current state.
///
/// | State | Outcome |
/// |-------|---------|
/// | edge exists (either half) | both halves removed, `Unfollowed` |
/// | target private, request pending | request removed, `RequestCancelled` |
/// | target private | request added, `Requested` |
/// | target public | both halves added, `Followed` |
pub fn toggle_follow(actor: &mut User, target: &mut User) -> Result<FollowStatus, SocialError> {
    if actor.id == target.id {
        return Err(SocialError::SelfReference("You cannot follow yourself.".into()));
    }

    // Either half is enough: removing both repairs a one-sided edge.
    if target.followers.contains(&actor.id) || actor.following.contains(&target.id) {
        unlink(actor, target);
        return Ok(FollowStatus::Unfollowed);
    }

    if target.is_private {
        if target.follow_requests.remove(&actor.id) {
            return Ok(FollowStatus::RequestCancelled);
        }
        target.follow_requests.insert(actor.id);
        return Ok(FollowStatus::Requested);
    }

    target.follow_requests.remove(&actor.id);
    link(actor, target);
    Ok(FollowStatus::Followed)
}

/// Turn `requester`'s pending request on `actor` into a confirmed edge.
pub fn accept_follow_request(actor: &mut User, requester: &mut User) -> Result<(), SocialError> {
    if actor.id == requester.id {
        return Err(SocialError::SelfReference(
            "You cannot accept your own follow request.".into(),
        ));
    }
    if !actor.is_private {
        return Err(SocialError::InvalidState(
            "Your account is public. No follow requests to accept.".into(),
        ));
    }
    if !actor.follow_requests.remove(&requester.id) {
        return Err(SocialError::NotFound(
            "No pending follow request from this user.".into(),
        ));
    }
    link(requester, actor);
    Ok(())
}

/// Drop `requester`'s pending request on `actor` without creating an edge.
///
/// Only the actor's document changes, so the requester need not exist.
pub fn reject_follow_request(actor: &mut User, requester: &UserId) -> Result<(), SocialError> {
    if !actor.is_private {
        return Err(SocialError::InvalidState(
            "Your account is public. No follow requests to reject.".into(),
        ));
    }
    if !actor.follow_requests.remove(requester) {
        return Err(SocialError::NotFound(
            "No pending follow request from this user to reject.".into(),
        ));
    }
    Ok(())
}

/// Flip `actor.is_private`.
///
/// Going public drains every pending request into a confirmed edge.
/// `requesters` must hold the loaded documents of the pending ids; ids with
/// no matching document are reported as dropped. The request set is always
/// empty afterwards.
pub fn toggle_privacy(actor: &mut User, requesters: &mut [User]) -> PrivacyChange {
    actor.is_private = !actor.is_private;
    if actor.is_private {
        return PrivacyChange::MadePrivate;
    }

    let pending = std::mem::take(&mut actor.follow_requests);
    let mut by_id: HashMap<UserId, &mut User> = requesters
        .iter_mut()
        .filter(|u| u.id != actor.id)
        .map(|u| (u.id, u))
        .collect();

    let mut accepted = Vec::new();
    let mut dropped = Vec::new();
    for id in pending {
        match by_id.get_mut(&id) {
            Some(requester) => {
                link(requester, actor);
                accepted.push(id);
            }
            None => dropped.push(id),
        }
    }

    PrivacyChange::MadePublic { accepted, dropped }
}

/// Enforce the visibility rule for follower/following lists.
///
/// Public accounts are open to everyone. Private accounts are open to the
/// owner and to confirmed followers; anonymous viewers get `Unauthorized`,
/// other viewers `Forbidden`.
pub fn ensure_can_view(
    viewer: Option<&UserId>,
    target: &User,
    what: &str,
) -> Result<(), SocialError> {
    if !target.is_private {
        return Ok(());
    }
    let Some(viewer) = viewer else {
        return Err(SocialError::Unauthorized(
            "Unauthorized: Log in to view private account details.".into(),
        ));
    };
    if *viewer == target.id || target.followers.contains(viewer) {
        return Ok(());
    }
    Err(SocialError::Forbidden(format!(
        "Forbidden: This is a private account. You must be following to view {what}."
    )))
}

/// The actor's pending requests. Only defined for private accounts.
pub fn pending_requests(actor: &User) -> Result<&BTreeSet<UserId>, SocialError> {
    if !actor.is_private {
        return Err(SocialError::InvalidState(
            "Your account is public. No pending follow requests.".into(),
        ));
    }
    Ok(&actor.follow_requests)
}

fn link(follower: &mut User, followee: &mut User) {
    follower.following.insert(followee.id);
    followee.followers.insert(follower.id);
}

fn unlink(follower: &mut User, followee: &mut User) {
    follower.following.remove(&followee.id);
    followee.followers.remove(&follower.id);
}

// ---------------------------------------------------------------------------
// Invariants
// ---------------------------------------------------------------------------

/// A broken consistency rule between user documents.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("user {user} lists itself in {relation}")]
    SelfRelation { user: UserId, relation: Relation },

    #[error("edge {follower} -> {followee} is stored on one side only")]
    OneSidedEdge { follower: UserId, followee: UserId },

    #[error("request {requester} -> {target} coexists with an edge")]
    RequestWithEdge { requester: UserId, target: UserId },
}

/// Check the single-document rules of `user`.
pub fn check_user(user: &User) -> Vec<InvariantViolation> {
    Relation::ALL
        .into_iter()
        .filter(|r| user.relation(*r).contains(&user.id))
        .map(|relation| InvariantViolation::SelfRelation {
            user: user.id,
            relation,
        })
        .collect()
}

/// Check every cross-document rule between `a` and `b`, in both directions.
pub fn check_pair(a: &User, b: &User) -> Vec<InvariantViolation> {
    let mut out = Vec::new();
    for (x, y) in [(a, b), (b, a)] {
        // x -> y
        if x.following.contains(&y.id) != y.followers.contains(&x.id) {
            out.push(InvariantViolation::OneSidedEdge {
                follower: x.id,
                followee: y.id,
            });
        }
        if y.follow_requests.contains(&x.id)
            && (y.followers.contains(&x.id) || x.following.contains(&y.id))
        {
            out.push(InvariantViolation::RequestWithEdge {
                requester: x.id,
                target: y.id,
            });
        }
    }
    out
}

/// Check all rules across a set of loaded documents.
///
/// References to ids outside `users` are not judged; they may belong to
/// documents the caller did not load.
pub fn check_all(users: &[User]) -> Vec<InvariantViolation> {
    let mut out: Vec<InvariantViolation> = users.iter().flat_map(check_user).collect();
    for (i, a) in users.iter().enumerate() {
        for b in &users[i + 1..] {
            out.extend(check_pair(a, b));
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
