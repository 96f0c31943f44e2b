//! In-memory storage implementation.
//!
//! All data is held in RAM behind a [`RwLock`] and is lost when the process
//! exits. Use this for tests, the conformance suite, and ephemeral nodes.
//!
//! Users live in a [`BTreeMap`] keyed by [`UserId`]; UUIDv7 ordering means
//! iteration is creation order. [`Storage::commit`] holds the write lock for
//! the whole check-then-apply, which is what makes a batch atomic here.

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use kinship::{User, UserId};

use super::{Storage, StorageError, UserListing, UserQuery, WriteBatch};

// ---------------------------------------------------------------------------
// Internal state
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Inner {
    users: BTreeMap<UserId, User>,
    /// username -> id, for the uniqueness constraint.
    usernames: HashMap<String, UserId>,
    password_hashes: HashMap<UserId, String>,
    node_config: HashMap<String, String>,
}

// ---------------------------------------------------------------------------
// MemoryStorage
// ---------------------------------------------------------------------------

/// Thread-safe, in-memory implementation of [`Storage`].
pub struct MemoryStorage {
    inner: RwLock<Inner>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Number of stored users.
    pub fn user_count(&self) -> usize {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.users.len()
    }

    /// Snapshot of every stored user, in id order.
    pub fn all_users(&self) -> Vec<User> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.users.values().cloned().collect()
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Storage impl
// ---------------------------------------------------------------------------

#[async_trait]
impl Storage for MemoryStorage {
    // --- Users ---------------------------------------------------------------

    async fn create_user(
        &self,
        user: &User,
        password_hash: Option<&str>,
    ) -> Result<(), StorageError> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if inner.users.contains_key(&user.id) {
            return Err(StorageError::Conflict(format!(
                "user {} already exists",
                user.id
            )));
        }
        if inner.usernames.contains_key(&user.username) {
            return Err(StorageError::Conflict(format!(
                "username {} is already taken",
                user.username
            )));
        }
        inner.usernames.insert(user.username.clone(), user.id);
        inner.users.insert(user.id, user.clone());
        if let Some(hash) = password_hash {
            inner.password_hashes.insert(user.id, hash.to_string());
        }
        Ok(())
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<User>, StorageError> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(inner.users.get(id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StorageError> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(inner
            .usernames
            .get(username)
            .and_then(|id| inner.users.get(id))
            .cloned())
    }

    async fn get_password_hash(&self, id: &UserId) -> Result<Option<String>, StorageError> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(inner.password_hashes.get(id).cloned())
    }

    async fn get_users(&self, ids: &[UserId]) -> Result<Vec<User>, StorageError> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let mut ids = ids.to_vec();
        ids.sort();
        ids.dedup();
        Ok(ids
            .iter()
            .filter_map(|id| inner.users.get(id))
            .cloned()
            .collect())
    }

    async fn find_referencing(&self, id: &UserId) -> Result<Vec<User>, StorageError> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(inner
            .users
            .values()
            .filter(|u| u.id != *id && u.references(id))
            .cloned()
            .collect())
    }

    async fn list_users(&self, query: &UserQuery) -> Result<UserListing, StorageError> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let mut matching: Vec<&User> = inner
            .users
            .values()
            .filter(|u| query.full_name.as_ref().is_none_or(|n| u.full_name == *n))
            .collect();
        matching.sort_by_cached_key(|u| (u.full_name.to_lowercase(), u.id));

        let total = matching.len() as u64;
        let users = matching
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .cloned()
            .collect();
        Ok(UserListing { users, total })
    }

    async fn commit(&self, batch: &WriteBatch) -> Result<(), StorageError> {
        batch.ensure_distinct()?;
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);

        // Check every version before touching anything.
        for user in batch.documents() {
            match inner.users.get(&user.id) {
                Some(stored) if stored.version == user.version => {}
                Some(stored) => {
                    return Err(StorageError::Stale(format!(
                        "user {} is at version {}, batch read version {}",
                        user.id, stored.version, user.version
                    )))
                }
                None => {
                    return Err(StorageError::Stale(format!(
                        "user {} no longer exists",
                        user.id
                    )))
                }
            }
        }
        for user in &batch.updates {
            if let Some(owner) = inner.usernames.get(&user.username) {
                if *owner != user.id {
                    return Err(StorageError::Conflict(format!(
                        "username {} is already taken",
                        user.username
                    )));
                }
            }
        }

        for user in &batch.deletions {
            inner.users.remove(&user.id);
            inner.usernames.remove(&user.username);
            inner.password_hashes.remove(&user.id);
        }
        for user in &batch.updates {
            let mut next = user.clone();
            next.version += 1;
            if let Some(previous) = inner.users.insert(next.id, next) {
                if previous.username != user.username {
                    inner.usernames.remove(&previous.username);
                }
            }
            inner.usernames.insert(user.username.clone(), user.id);
        }
        Ok(())
    }

    // --- Node configuration -------------------------------------------------

    async fn get_node_config(&self, key: &str) -> Result<Option<String>, StorageError> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(inner.node_config.get(key).cloned())
    }

    async fn set_node_config(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.node_config.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
