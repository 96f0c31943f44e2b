//! SQLite-backed storage implementation.
//!
//! Uses `rusqlite` (with bundled SQLite) wrapped in an `Arc<Mutex<Connection>>`
//! to satisfy the `Send + Sync` requirements. All blocking calls are offloaded
//! to a thread-pool via `tokio::task::spawn_blocking`.
//!
//! # Schema
//!
//! - `users`: profile columns, the optional Argon2 `password_hash` and the
//!   `version` counter used for CAS. Deleting the row drops the hash with it.
//! - `user_relations`: one row per member of an owner's `followers`,
//!   `following` or `follow_requests` set. Indexed by member so account
//!   deletion can find every back-reference.
//! - `node_config`: key/value settings such as the credential signing seed.
//!
//! [`Storage::commit`] runs in a single `IMMEDIATE` transaction; any version
//! mismatch rolls the whole batch back.

use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use kinship::{Relation, User, UserId};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, TransactionBehavior};

use super::{Storage, StorageError, UserListing, UserQuery, WriteBatch};

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id          TEXT PRIMARY KEY,
    username    TEXT NOT NULL UNIQUE,
    full_name   TEXT NOT NULL,
    avatar      TEXT,
    bio         TEXT,
    is_private  INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL,
    password_hash TEXT,
    version     INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_users_full_name ON users(full_name COLLATE NOCASE);

-- One row per set member: (owner, 'followers' | 'following' | 'follow_requests', member).
CREATE TABLE IF NOT EXISTS user_relations (
    owner     TEXT NOT NULL,
    relation  TEXT NOT NULL,
    member    TEXT NOT NULL,
    PRIMARY KEY (owner, relation, member)
);
CREATE INDEX IF NOT EXISTS idx_user_relations_member ON user_relations(member);

CREATE TABLE IF NOT EXISTS node_config (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";

// ---------------------------------------------------------------------------
// SqliteStorage
// ---------------------------------------------------------------------------

/// SQLite-backed implementation of [`Storage`].
///
/// Holds a single database connection protected by a `Mutex`. All operations
/// run inside `spawn_blocking` to avoid blocking the async runtime.
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    /// Open (or create) the SQLite database at `path` and apply the schema.
    pub fn open(path: &str) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database (data is lost when dropped).
    pub fn open_in_memory() -> Result<Self, rusqlite::Error> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

// ---------------------------------------------------------------------------
// Error conversions
// ---------------------------------------------------------------------------

fn map_err(e: rusqlite::Error) -> StorageError {
    match e.sqlite_error_code() {
        Some(ErrorCode::ConstraintViolation) => StorageError::Conflict(e.to_string()),
        _ => StorageError::Internal(e.to_string()),
    }
}

fn map_join_err(e: tokio::task::JoinError) -> StorageError {
    StorageError::Internal(format!("task join error: {e}"))
}

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>, StorageError> {
    conn.lock()
        .map_err(|_| StorageError::Internal("connection mutex poisoned".into()))
}

// ---------------------------------------------------------------------------
// Row helpers
// ---------------------------------------------------------------------------

fn parse_id(raw: &str) -> Result<UserId, StorageError> {
    UserId::from_str(raw).map_err(|e| StorageError::Internal(format!("corrupt user id: {e}")))
}

fn load_user(conn: &Connection, id: &UserId) -> Result<Option<User>, StorageError> {
    let row = conn
        .query_row(
            "SELECT username, full_name, avatar, bio, is_private, created_at, version
             FROM users WHERE id = ?1",
            params![id.to_string()],
            |row| {
                Ok(User {
                    id: *id,
                    username: row.get(0)?,
                    full_name: row.get(1)?,
                    avatar: row.get(2)?,
                    bio: row.get(3)?,
                    is_private: row.get(4)?,
                    followers: BTreeSet::new(),
                    following: BTreeSet::new(),
                    follow_requests: BTreeSet::new(),
                    created_at: row.get(5)?,
                    version: row.get::<_, i64>(6)? as u64,
                })
            },
        )
        .optional()
        .map_err(map_err)?;

    let Some(mut user) = row else {
        return Ok(None);
    };

    let mut stmt = conn
        .prepare("SELECT relation, member FROM user_relations WHERE owner = ?1")
        .map_err(map_err)?;
    let rows = stmt
        .query_map(params![id.to_string()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })
        .map_err(map_err)?;
    for row in rows {
        let (relation, member) = row.map_err(map_err)?;
        let relation = Relation::from_str(&relation).map_err(StorageError::Internal)?;
        user.relation_mut(relation).insert(parse_id(&member)?);
    }
    Ok(Some(user))
}

fn insert_relations(conn: &Connection, user: &User) -> Result<(), StorageError> {
    let owner = user.id.to_string();
    let mut stmt = conn
        .prepare("INSERT INTO user_relations (owner, relation, member) VALUES (?1, ?2, ?3)")
        .map_err(map_err)?;
    for relation in Relation::ALL {
        for member in user.relation(relation) {
            stmt.execute(params![owner, relation.as_str(), member.to_string()])
                .map_err(map_err)?;
        }
    }
    Ok(())
}

fn delete_relations(conn: &Connection, id: &UserId) -> Result<(), StorageError> {
    conn.execute(
        "DELETE FROM user_relations WHERE owner = ?1",
        params![id.to_string()],
    )
    .map_err(map_err)?;
    Ok(())
}

fn stale(user: &User) -> StorageError {
    StorageError::Stale(format!(
        "user {} changed since version {} was read",
        user.id, user.version
    ))
}

// ---------------------------------------------------------------------------
// Storage impl
// ---------------------------------------------------------------------------

#[async_trait]
impl Storage for SqliteStorage {
    // --- Users ---------------------------------------------------------------

    async fn create_user(
        &self,
        user: &User,
        password_hash: Option<&str>,
    ) -> Result<(), StorageError> {
        let conn = Arc::clone(&self.conn);
        let user = user.clone();
        let password_hash = password_hash.map(str::to_string);

        tokio::task::spawn_blocking(move || {
            let mut conn = lock(&conn)?;
            let tx = conn.transaction().map_err(map_err)?;
            tx.execute(
                "INSERT INTO users
                     (id, username, full_name, avatar, bio, is_private, created_at, password_hash, version)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    user.id.to_string(),
                    user.username,
                    user.full_name,
                    user.avatar,
                    user.bio,
                    user.is_private,
                    user.created_at,
                    password_hash,
                    user.version as i64,
                ],
            )
            .map_err(|e| match map_err(e) {
                StorageError::Conflict(_) => StorageError::Conflict(format!(
                    "user {} or username {} already exists",
                    user.id, user.username
                )),
                other => other,
            })?;
            insert_relations(&tx, &user)?;
            tx.commit().map_err(map_err)
        })
        .await
        .map_err(map_join_err)?
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<User>, StorageError> {
        let conn = Arc::clone(&self.conn);
        let id = *id;

        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn)?;
            load_user(&conn, &id)
        })
        .await
        .map_err(map_join_err)?
    }

    async fn get_users(&self, ids: &[UserId]) -> Result<Vec<User>, StorageError> {
        let conn = Arc::clone(&self.conn);
        let ids: BTreeSet<UserId> = ids.iter().copied().collect();

        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn)?;
            let mut users = Vec::with_capacity(ids.len());
            for id in &ids {
                if let Some(user) = load_user(&conn, id)? {
                    users.push(user);
                }
            }
            Ok(users)
        })
        .await
        .map_err(map_join_err)?
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StorageError> {
        let conn = Arc::clone(&self.conn);
        let username = username.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn)?;
            let id: Option<String> = conn
                .query_row(
                    "SELECT id FROM users WHERE username = ?1",
                    params![username],
                    |row| row.get(0),
                )
                .optional()
                .map_err(map_err)?;
            match id {
                Some(id) => load_user(&conn, &parse_id(&id)?),
                None => Ok(None),
            }
        })
        .await
        .map_err(map_join_err)?
    }

    async fn get_password_hash(&self, id: &UserId) -> Result<Option<String>, StorageError> {
        let conn = Arc::clone(&self.conn);
        let id = *id;

        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn)?;
            let hash: Option<Option<String>> = conn
                .query_row(
                    "SELECT password_hash FROM users WHERE id = ?1",
                    params![id.to_string()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(map_err)?;
            Ok(hash.flatten())
        })
        .await
        .map_err(map_join_err)?
    }

    async fn list_users(&self, query: &UserQuery) -> Result<UserListing, StorageError> {
        let conn = Arc::clone(&self.conn);
        let query = query.clone();

        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn)?;
            let total: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM users WHERE ?1 IS NULL OR full_name = ?1",
                    params![query.full_name],
                    |row| row.get(0),
                )
                .map_err(map_err)?;

            let ids: Vec<String> = {
                let mut stmt = conn
                    .prepare(
                        "SELECT id FROM users
                         WHERE ?1 IS NULL OR full_name = ?1
                         ORDER BY full_name COLLATE NOCASE, id
                         LIMIT ?2 OFFSET ?3",
                    )
                    .map_err(map_err)?;
                let rows = stmt
                    .query_map(
                        params![
                            query.full_name,
                            i64::try_from(query.limit).unwrap_or(i64::MAX),
                            i64::try_from(query.offset).unwrap_or(i64::MAX),
                        ],
                        |row| row.get::<_, String>(0),
                    )
                    .map_err(map_err)?;
                rows.collect::<Result<_, _>>().map_err(map_err)?
            };

            let mut users = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(user) = load_user(&conn, &parse_id(&id)?)? {
                    users.push(user);
                }
            }
            Ok(UserListing {
                users,
                total: total as u64,
            })
        })
        .await
        .map_err(map_join_err)?
    }

    async fn find_referencing(&self, id: &UserId) -> Result<Vec<User>, StorageError> {
        let conn = Arc::clone(&self.conn);
        let id = *id;

        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn)?;
            let owners: Vec<String> = {
                let mut stmt = conn
                    .prepare(
                        "SELECT DISTINCT owner FROM user_relations
                         WHERE member = ?1 AND owner != ?1
                         ORDER BY owner",
                    )
                    .map_err(map_err)?;
                let rows = stmt
                    .query_map(params![id.to_string()], |row| row.get::<_, String>(0))
                    .map_err(map_err)?;
                rows.collect::<Result<_, _>>().map_err(map_err)?
            };

            let mut users = Vec::with_capacity(owners.len());
            for owner in owners {
                if let Some(user) = load_user(&conn, &parse_id(&owner)?)? {
                    users.push(user);
                }
            }
            Ok(users)
        })
        .await
        .map_err(map_join_err)?
    }

    async fn commit(&self, batch: &WriteBatch) -> Result<(), StorageError> {
        batch.ensure_distinct()?;
        let conn = Arc::clone(&self.conn);
        let batch = batch.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = lock(&conn)?;
            // Dropping `tx` without commit rolls back.
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(map_err)?;

            for user in &batch.updates {
                let changed = tx
                    .execute(
                        "UPDATE users
                         SET username = ?1, full_name = ?2, avatar = ?3, bio = ?4,
                             is_private = ?5, version = version + 1
                         WHERE id = ?6 AND version = ?7",
                        params![
                            user.username,
                            user.full_name,
                            user.avatar,
                            user.bio,
                            user.is_private,
                            user.id.to_string(),
                            user.version as i64,
                        ],
                    )
                    .map_err(map_err)?;
                if changed == 0 {
                    return Err(stale(user));
                }
                delete_relations(&tx, &user.id)?;
                insert_relations(&tx, user)?;
            }

            for user in &batch.deletions {
                let changed = tx
                    .execute(
                        "DELETE FROM users WHERE id = ?1 AND version = ?2",
                        params![user.id.to_string(), user.version as i64],
                    )
                    .map_err(map_err)?;
                if changed == 0 {
                    return Err(stale(user));
                }
                delete_relations(&tx, &user.id)?;
            }

            tx.commit().map_err(map_err)
        })
        .await
        .map_err(map_join_err)?
    }

    // --- Node configuration -------------------------------------------------

    async fn get_node_config(&self, key: &str) -> Result<Option<String>, StorageError> {
        let conn = Arc::clone(&self.conn);
        let key = key.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn)?;
            conn.query_row(
                "SELECT value FROM node_config WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(map_err)
        })
        .await
        .map_err(map_join_err)?
    }

    async fn set_node_config(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let conn = Arc::clone(&self.conn);
        let key = key.to_string();
        let value = value.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn)?;
            conn.execute(
                "INSERT INTO node_config (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )
            .map_err(map_err)?;
            Ok(())
        })
        .await
        .map_err(map_join_err)?
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use kinship::graph;

    async fn seeded(names: &[&str]) -> (SqliteStorage, Vec<User>) {
        let s = SqliteStorage::open_in_memory().unwrap();
        let mut users = Vec::new();
        for name in names {
            let u = User::new(*name, name.to_uppercase());
            s.create_user(&u, None).await.unwrap();
            users.push(u);
        }
        (s, users)
    }

    #[tokio::test]
    async fn create_and_get_user() {
        let (s, users) = seeded(&["alice"]).await;
        let got = s.get_user(&users[0].id).await.unwrap().unwrap();
        assert_eq!(got, users[0]);
        assert!(s.get_user(&UserId::generate()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_username_conflicts() {
        let (s, _) = seeded(&["alice"]).await;
        let err = s
            .create_user(&User::new("alice", "Second"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
    }

    #[tokio::test]
    async fn commit_persists_relation_sets() {
        let (s, users) = seeded(&["alice", "bob"]).await;
        let (mut a, mut b) = (users[0].clone(), users[1].clone());
        b.is_private = true;
        s.commit(&WriteBatch::new().update(b.clone())).await.unwrap();
        b.version += 1;

        graph::toggle_follow(&mut a, &mut b).unwrap();
        s.commit(&WriteBatch::new().update(a.clone()).update(b.clone()))
            .await
            .unwrap();

        let stored = s.get_user(&b.id).await.unwrap().unwrap();
        assert!(stored.is_private);
        assert!(stored.follow_requests.contains(&a.id));
        assert_eq!(stored.version, 2);
    }

    #[tokio::test]
    async fn stale_batch_rolls_back() {
        let (s, users) = seeded(&["alice", "bob"]).await;
        let (a, b) = (users[0].clone(), users[1].clone());
        s.commit(&WriteBatch::new().update(b.clone())).await.unwrap();

        let (mut a1, mut b1) = (a.clone(), b.clone());
        graph::toggle_follow(&mut a1, &mut b1).unwrap();
        let err = s
            .commit(&WriteBatch::new().update(a1).update(b1))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Stale(_)));

        let stored_a = s.get_user(&a.id).await.unwrap().unwrap();
        assert!(stored_a.following.is_empty());
        assert_eq!(stored_a.version, 0);
    }

    #[tokio::test]
    async fn delete_and_scrub_in_one_batch() {
        let (s, users) = seeded(&["alice", "bob", "carol"]).await;
        let (mut a, mut b) = (users[0].clone(), users[1].clone());
        graph::toggle_follow(&mut a, &mut b).unwrap();
        s.commit(&WriteBatch::new().update(a.clone()).update(b.clone()))
            .await
            .unwrap();

        let referencing = s.find_referencing(&a.id).await.unwrap();
        assert_eq!(referencing.len(), 1);
        let mut bob = referencing.into_iter().next().unwrap();
        assert!(bob.forget(&a.id));

        let alice = s.get_user(&a.id).await.unwrap().unwrap();
        s.commit(&WriteBatch::new().update(bob).delete(alice))
            .await
            .unwrap();

        assert!(s.get_user(&a.id).await.unwrap().is_none());
        let bob = s.get_user(&b.id).await.unwrap().unwrap();
        assert!(bob.followers.is_empty());
        assert!(s.find_referencing(&a.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn get_users_orders_and_skips() {
        let (s, users) = seeded(&["alice", "bob"]).await;
        let got = s
            .get_users(&[users[1].id, UserId::generate(), users[0].id])
            .await
            .unwrap();
        let ids: Vec<UserId> = got.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![users[0].id, users[1].id]);
    }

    #[tokio::test]
    async fn password_hash_is_stored_and_dropped_with_the_row() {
        let s = SqliteStorage::open_in_memory().unwrap();
        let a = User::new("alice", "Alice");
        s.create_user(&a, Some("$argon2id$fake")).await.unwrap();
        let b = User::new("bob", "Bob");
        s.create_user(&b, None).await.unwrap();

        assert_eq!(
            s.get_password_hash(&a.id).await.unwrap().as_deref(),
            Some("$argon2id$fake")
        );
        assert!(s.get_password_hash(&b.id).await.unwrap().is_none());
        assert_eq!(s.find_by_username("alice").await.unwrap().unwrap(), a);

        s.commit(&WriteBatch::new().delete(a.clone())).await.unwrap();
        assert!(s.get_password_hash(&a.id).await.unwrap().is_none());
        assert!(s.find_by_username("alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_users_sorts_filters_and_windows() {
        let s = SqliteStorage::open_in_memory().unwrap();
        for (username, name) in [("carol", "carol"), ("alice", "Alice"), ("bob", "Bob")] {
            s.create_user(&User::new(username, name), None).await.unwrap();
        }

        let first = s
            .list_users(&UserQuery {
                full_name: None,
                offset: 0,
                limit: 2,
            })
            .await
            .unwrap();
        assert_eq!(first.total, 3);
        let names: Vec<&str> = first.users.iter().map(|u| u.full_name.as_str()).collect();
        assert_eq!(names, vec!["Alice", "Bob"]);

        let second = s
            .list_users(&UserQuery {
                full_name: None,
                offset: 2,
                limit: 2,
            })
            .await
            .unwrap();
        assert_eq!(second.users.len(), 1);
        assert_eq!(second.users[0].username, "carol");

        let none = s
            .list_users(&UserQuery {
                full_name: Some("Dave".into()),
                offset: 0,
                limit: 10,
            })
            .await
            .unwrap();
        assert_eq!(none.total, 0);
        assert!(none.users.is_empty());
    }

    #[tokio::test]
    async fn node_config_roundtrip() {
        let s = SqliteStorage::open_in_memory().unwrap();
        assert!(s.get_node_config("k").await.unwrap().is_none());
        s.set_node_config("k", "v1").await.unwrap();
        s.set_node_config("k", "v2").await.unwrap();
        assert_eq!(s.get_node_config("k").await.unwrap().as_deref(), Some("v2"));
    }
}
