//! Argon2id password hashing for sign-in.
//!
//! Hashes are PHC strings (`$argon2id$v=19$m=...,t=...,p=...$salt$hash`), so
//! verification reads the cost parameters from the stored hash and keeps
//! working after the node's configured memory cost changes.
//!
//! Argon2 is deliberately slow; the async helpers run it on the blocking
//! pool so request handlers never stall the runtime.

use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Algorithm, Argon2, Params, PasswordHash, PasswordVerifier, Version,
};
use rand::rngs::OsRng;

use crate::error::AppError;

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("stored password hash is unreadable: {0}")]
    CorruptHash(String),

    #[error("password task failed: {0}")]
    Task(String),
}

impl From<PasswordError> for AppError {
    fn from(e: PasswordError) -> Self {
        AppError::Internal(e.to_string())
    }
}

/// Argon2id hasher with the node's cost parameters.
#[derive(Debug, Clone)]
pub struct Passwords {
    params: Params,
}

impl Passwords {
    /// Build a hasher using `memory_kib` KiB per hash and the default time
    /// and parallelism costs. Out-of-range memory costs are clamped.
    pub fn new(memory_kib: u32) -> Self {
        let memory_kib = memory_kib.clamp(Params::MIN_M_COST, Params::MAX_M_COST);
        let params = Params::new(
            memory_kib,
            Params::DEFAULT_T_COST,
            Params::DEFAULT_P_COST,
            None,
        )
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, memory_kib, "unusable argon2 parameters, using defaults");
            Params::default()
        });
        Self { params }
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash `password` with a fresh random salt.
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2()
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| PasswordError::Hash(e.to_string()))
    }

    /// Check `password` against a stored PHC hash. A mismatch is `Ok(false)`;
    /// only an unparsable hash is an error.
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordError> {
        let parsed = PasswordHash::new(hash).map_err(|e| PasswordError::CorruptHash(e.to_string()))?;
        Ok(self
            .argon2()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }

    /// [`Passwords::hash`] on the blocking pool.
    pub async fn hash_password(&self, password: String) -> Result<String, PasswordError> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.hash(&password))
            .await
            .map_err(|e| PasswordError::Task(e.to_string()))?
    }

    /// [`Passwords::verify`] on the blocking pool.
    pub async fn verify_password(
        &self,
        password: String,
        hash: String,
    ) -> Result<bool, PasswordError> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.verify(&password, &hash))
            .await
            .map_err(|e| PasswordError::Task(e.to_string()))?
    }
}
