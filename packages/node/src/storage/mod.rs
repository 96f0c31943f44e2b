//! Storage abstraction layer for the Kinship node (the identity store).
//!
//! The [`Storage`] trait defines the contract between the social-graph
//! service and persistence. All follow/privacy rules live in
//! [`kinship::graph`] and the handlers; storage only guarantees that a
//! [`WriteBatch`] lands atomically or not at all.
//!
//! # Implementations
//!
//! | Type | When to use |
//! |------|-------------|
//! | [`MemoryStorage`] | Tests, conformance suite, ephemeral nodes |
//! | [`SqliteStorage`] | Production; durable single-file database |
//!
//! [`MemoryStorage`]: memory::MemoryStorage
//! [`SqliteStorage`]: sqlite::SqliteStorage

pub mod memory;
pub mod sqlite;

use std::collections::HashSet;

use async_trait::async_trait;
use kinship::{User, UserId};

// ---------------------------------------------------------------------------
// StorageError
// ---------------------------------------------------------------------------

/// Errors that storage operations can return.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested item does not exist.
    #[error("not found")]
    NotFound,

    /// A uniqueness constraint was violated (duplicate id or username).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A document in a [`WriteBatch`] changed (or vanished) since it was
    /// read. Nothing in the batch was applied.
    #[error("stale write: {0}")]
    Stale(String),

    /// An unexpected error in the underlying storage backend.
    #[error("internal storage error: {0}")]
    Internal(String),
}

// ---------------------------------------------------------------------------
// WriteBatch
// ---------------------------------------------------------------------------

/// A set of user documents to commit as one unit.
///
/// Every document carries the `version` it was read at. The commit succeeds
/// only if every stored version still matches, in which case all updates are
/// written with `version + 1` and all deletions are removed. Otherwise the
/// whole batch is rejected with [`StorageError::Stale`].
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    pub updates: Vec<User>,
    pub deletions: Vec<User>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(mut self, user: User) -> Self {
        self.updates.push(user);
        self
    }

    pub fn delete(mut self, user: User) -> Self {
        self.deletions.push(user);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.deletions.is_empty()
    }

    /// Every document in the batch, updates first.
    pub fn documents(&self) -> impl Iterator<Item = &User> {
        self.updates.iter().chain(self.deletions.iter())
    }

    /// Reject batches that name the same document twice; the version check
    /// would be ambiguous.
    pub(crate) fn ensure_distinct(&self) -> Result<(), StorageError> {
        let mut seen = HashSet::new();
        for user in self.documents() {
            if !seen.insert(user.id) {
                return Err(StorageError::Internal(format!(
                    "write batch lists user {} more than once",
                    user.id
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Directory listing
// ---------------------------------------------------------------------------

/// Filter and window for [`Storage::list_users`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserQuery {
    /// Only users whose `full_name` equals this exactly.
    pub full_name: Option<String>,
    pub offset: u64,
    pub limit: u64,
}

/// One window of matching users plus the number of matches overall.
#[derive(Debug, Clone, Default)]
pub struct UserListing {
    pub users: Vec<User>,
    pub total: u64,
}

// ---------------------------------------------------------------------------
// Storage trait
// ---------------------------------------------------------------------------

/// The persistence contract for a Kinship node.
///
/// All methods are `async` and return `Result<_, StorageError>`. Implementations
/// must be `Send + Sync + 'static` so they can be held in an `Arc<dyn Storage>`.
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    // --- Users ---------------------------------------------------------------

    /// Persist a new user together with its password hash, if any. Returns
    /// [`StorageError::Conflict`] if the id or the username is already taken.
    async fn create_user(
        &self,
        user: &User,
        password_hash: Option<&str>,
    ) -> Result<(), StorageError>;

    /// Retrieve a user by id. Returns `None` if not found.
    async fn get_user(&self, id: &UserId) -> Result<Option<User>, StorageError>;

    /// Retrieve a user by exact username. Returns `None` if not found.
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StorageError>;

    /// The stored password hash (PHC string) for `id`, if the account has one.
    async fn get_password_hash(&self, id: &UserId) -> Result<Option<String>, StorageError>;

    /// Retrieve several users at once, ordered by id. Ids with no stored
    /// document are skipped; duplicates are collapsed.
    async fn get_users(&self, ids: &[UserId]) -> Result<Vec<User>, StorageError>;

    /// Return every user whose `followers`, `following` or `followRequests`
    /// mention `id`, ordered by id.
    async fn find_referencing(&self, id: &UserId) -> Result<Vec<User>, StorageError>;

    /// Users matching `query`, ordered by `full_name` case-insensitively and
    /// then by id, windowed by `offset`/`limit`.
    async fn list_users(&self, query: &UserQuery) -> Result<UserListing, StorageError>;

    /// Apply `batch` atomically. See [`WriteBatch`] for the version rules.
    /// Deleting a user also drops its password hash.
    async fn commit(&self, batch: &WriteBatch) -> Result<(), StorageError>;

    // --- Node configuration -------------------------------------------------

    /// Retrieve a node-level config value by key (e.g. `"credential_signing_seed"`).
    /// Returns `None` if the key has never been set.
    async fn get_node_config(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Persist a node-level config value (upsert by key).
    async fn set_node_config(&self, key: &str, value: &str) -> Result<(), StorageError>;
}
