//! The social-graph service.
//!
//! [`SocialGraph`] is the only writer of follow state. Every operation has the
//! same shape: read the documents involved, run the pure transition from
//! [`kinship::graph`] on local copies, and commit every touched document in a
//! single [`WriteBatch`]. If a concurrent writer got there first the commit
//! comes back [`StorageError::Stale`] and the whole read/transition/commit
//! cycle is re-run against fresh state, up to `max_attempts` times.

use std::future::Future;
use std::sync::Arc;

use kinship::{
    graph, validate_user, FollowStatus, PrivacyChange, ProfileEdit, SocialError, User, UserId,
    UserSummary, ValidationError,
};

use crate::storage::{Storage, StorageError, WriteBatch};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure of a [`SocialGraph`] operation.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error(transparent)]
    Social(#[from] SocialError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Invalid(#[from] ValidationError),

    /// Every attempt lost a race with a concurrent writer.
    #[error("gave up after {0} attempts; the documents kept changing")]
    Contended(u32),
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// What [`SocialGraph::toggle_follow`] did, and to what kind of account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToggleOutcome {
    pub status: FollowStatus,
    /// Privacy of the target at the time of the toggle.
    pub target_private: bool,
}

// ---------------------------------------------------------------------------
// SocialGraph
// ---------------------------------------------------------------------------

/// Follow/request/privacy operations over a [`Storage`] backend.
#[derive(Clone)]
pub struct SocialGraph {
    storage: Arc<dyn Storage>,
    max_attempts: u32,
}

impl SocialGraph {
    pub fn new(storage: Arc<dyn Storage>, max_attempts: u32) -> Self {
        Self {
            storage,
            max_attempts: max_attempts.max(1),
        }
    }

    // --- Mutations -----------------------------------------------------------

    /// Follow, unfollow, request, or cancel a request.
    pub async fn toggle_follow(
        &self,
        actor: UserId,
        target: UserId,
    ) -> Result<ToggleOutcome, GraphError> {
        if actor == target {
            return Err(SocialError::SelfReference("You cannot follow yourself.".into()).into());
        }
        self.with_retry("toggle_follow", || async move {
            let mut actor_doc = self.load(&actor, "Authenticated user not found.").await?;
            let mut target_doc = self.load(&target, "Target user not found.").await?;

            let status = graph::toggle_follow(&mut actor_doc, &mut target_doc)?;
            let target_private = target_doc.is_private;
            self.storage
                .commit(&WriteBatch::new().update(actor_doc).update(target_doc))
                .await?;

            tracing::info!(%actor, %target, %status, "toggled follow");
            Ok::<_, GraphError>(ToggleOutcome {
                status,
                target_private,
            })
        })
        .await
    }

    /// Accept `requester`'s pending request on `actor`. Returns the
    /// requester's updated document.
    pub async fn accept_request(
        &self,
        actor: UserId,
        requester: UserId,
    ) -> Result<User, GraphError> {
        if actor == requester {
            return Err(SocialError::SelfReference(
                "You cannot accept your own follow request.".into(),
            )
            .into());
        }
        self.with_retry("accept_request", || async move {
            let mut actor_doc = self.load(&actor, "Authenticated user not found.").await?;
            let mut requester_doc = self.load(&requester, "Requester user not found.").await?;

            graph::accept_follow_request(&mut actor_doc, &mut requester_doc)?;
            self.storage
                .commit(
                    &WriteBatch::new()
                        .update(actor_doc)
                        .update(requester_doc.clone()),
                )
                .await?;

            tracing::info!(%actor, %requester, "accepted follow request");
            Ok::<_, GraphError>(requester_doc)
        })
        .await
    }

    /// Drop `requester`'s pending request on `actor`.
    pub async fn reject_request(&self, actor: UserId, requester: UserId) -> Result<(), GraphError> {
        self.with_retry("reject_request", || async move {
            let mut actor_doc = self.load(&actor, "Authenticated user not found.").await?;
            graph::reject_follow_request(&mut actor_doc, &requester)?;
            self.storage
                .commit(&WriteBatch::new().update(actor_doc))
                .await?;

            tracing::info!(%actor, %requester, "rejected follow request");
            Ok::<_, GraphError>(())
        })
        .await
    }

    /// Flip the actor's privacy. Going public accepts every pending request
    /// in the same commit.
    pub async fn toggle_privacy(&self, actor: UserId) -> Result<PrivacyChange, GraphError> {
        self.with_retry("toggle_privacy", || async move {
            let mut actor_doc = self.load(&actor, "Authenticated user not found.").await?;

            let mut requesters = if actor_doc.is_private {
                let pending: Vec<UserId> = actor_doc.follow_requests.iter().copied().collect();
                self.storage.get_users(&pending).await?
            } else {
                Vec::new()
            };

            let change = graph::toggle_privacy(&mut actor_doc, &mut requesters);
            let mut batch = WriteBatch::new().update(actor_doc);
            if let PrivacyChange::MadePublic { accepted, .. } = &change {
                for requester in requesters {
                    if accepted.contains(&requester.id) {
                        batch = batch.update(requester);
                    }
                }
            }
            self.storage.commit(&batch).await?;

            match &change {
                PrivacyChange::MadePrivate => {
                    tracing::info!(%actor, "account made private");
                }
                PrivacyChange::MadePublic { accepted, dropped } => {
                    tracing::info!(
                        %actor,
                        accepted = accepted.len(),
                        dropped = dropped.len(),
                        "account made public"
                    );
                }
            }
            Ok::<_, GraphError>(change)
        })
        .await
    }

    /// Remove `id` and scrub it from every other user's relation sets in one
    /// commit.
    pub async fn delete_account(&self, actor: UserId, id: UserId) -> Result<(), GraphError> {
        if actor != id {
            return Err(
                SocialError::Forbidden("You can only delete your own account.".into()).into(),
            );
        }
        self.with_retry("delete_account", || async move {
            let doc = self.load(&id, "User not found.").await?;
            let mut batch = WriteBatch::new();
            for mut other in self.storage.find_referencing(&id).await? {
                if other.forget(&id) {
                    batch = batch.update(other);
                }
            }
            let scrubbed = batch.updates.len();
            self.storage.commit(&batch.delete(doc)).await?;

            tracing::info!(user = %id, scrubbed, "deleted account");
            Ok::<_, GraphError>(())
        })
        .await
    }

    /// Apply `edit` to the actor's own profile. Relation sets and privacy are
    /// untouched; the whole document still goes through the CAS commit so a
    /// concurrent follow is never overwritten.
    pub async fn update_profile(
        &self,
        actor: UserId,
        id: UserId,
        edit: ProfileEdit,
    ) -> Result<User, GraphError> {
        if actor != id {
            return Err(
                SocialError::Forbidden("You can only update your own profile.".into()).into(),
            );
        }
        let edit = &edit;
        self.with_retry("update_profile", || async move {
            let mut doc = self.load(&id, "User not found.").await?;
            doc.apply_edit(edit);
            validate_user(&doc)?;
            self.storage
                .commit(&WriteBatch::new().update(doc.clone()))
                .await?;
            doc.version += 1;

            tracing::info!(user = %id, "updated profile");
            Ok::<_, GraphError>(doc)
        })
        .await
    }

    // --- Queries -------------------------------------------------------------

    /// Who follows `target`, subject to the private-account visibility rule.
    pub async fn followers(
        &self,
        viewer: Option<UserId>,
        target: UserId,
    ) -> Result<Vec<UserSummary>, GraphError> {
        let doc = self.load(&target, "User not found.").await?;
        graph::ensure_can_view(viewer.as_ref(), &doc, "followers")?;
        self.summaries(doc.followers.iter().copied()).await
    }

    /// Whom `target` follows, subject to the private-account visibility rule.
    pub async fn following(
        &self,
        viewer: Option<UserId>,
        target: UserId,
    ) -> Result<Vec<UserSummary>, GraphError> {
        let doc = self.load(&target, "User not found.").await?;
        graph::ensure_can_view(viewer.as_ref(), &doc, "who they follow")?;
        self.summaries(doc.following.iter().copied()).await
    }

    /// Users waiting on the actor's approval.
    pub async fn pending_requests(&self, actor: UserId) -> Result<Vec<UserSummary>, GraphError> {
        let doc = self.load(&actor, "Authenticated user not found.").await?;
        let pending = graph::pending_requests(&doc)?;
        self.summaries(pending.iter().copied()).await
    }

    // --- Internals -----------------------------------------------------------

    async fn load(&self, id: &UserId, missing: &str) -> Result<User, GraphError> {
        self.storage
            .get_user(id)
            .await?
            .ok_or_else(|| SocialError::NotFound(missing.to_string()).into())
    }

    /// Resolve ids to summaries. Ids whose document is gone are skipped.
    async fn summaries(
        &self,
        ids: impl Iterator<Item = UserId>,
    ) -> Result<Vec<UserSummary>, GraphError> {
        let ids: Vec<UserId> = ids.collect();
        let users = self.storage.get_users(&ids).await?;
        Ok(users.iter().map(User::summary).collect())
    }

    /// Run `attempt` until it commits, fails for a reason other than a stale
    /// read, or `max_attempts` is used up.
    async fn with_retry<T, F, Fut>(&self, op: &'static str, mut attempt: F) -> Result<T, GraphError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GraphError>>,
    {
        for n in 1..=self.max_attempts {
            match attempt().await {
                Err(GraphError::Storage(StorageError::Stale(why))) => {
                    tracing::debug!(op, attempt = n, %why, "stale commit, re-reading");
                }
                other => return other,
            }
        }
        tracing::warn!(op, attempts = self.max_attempts, "giving up on contended write");
        Err(GraphError::Contended(self.max_attempts))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
