//! Access credentials: issuing and verifying bearer tokens.
//!
//! The social endpoints only need to know *which* user is calling. That
//! question is answered by a [`CredentialIssuer`], held by the router as an
//! `Arc<dyn CredentialIssuer>` so a deployment can swap in a different
//! identity provider without touching the handlers.
//!
//! # Token format
//!
//! [`SignedTokenIssuer`] produces compact Ed25519-signed tokens:
//!
//! ```text
//! <userId>.<expiresAtUnix>.z<base58btc(signature)>
//! ```
//!
//! The signature covers the `<userId>.<expiresAtUnix>` prefix. The signing
//! seed (32 bytes, hex-encoded) is persisted in storage under
//! `"credential_signing_seed"`, so tokens survive a restart of a node backed
//! by SQLite. In-memory nodes get a fresh key on every run.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use kinship::UserId;
use rand::rngs::OsRng;

use crate::storage::{Storage, StorageError};

const SEED_KEY: &str = "credential_signing_seed";

/// Upper bound on token lifetime (ten years).
const MAX_TTL_SECS: u64 = 10 * 365 * 86_400;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// An issued access token and the instant it stops being accepted.
#[derive(Debug, Clone)]
pub struct Credential {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Reasons a presented token is refused.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("malformed access token: {0}")]
    Malformed(String),

    #[error("access token signature is invalid")]
    BadSignature,

    #[error("access token has expired")]
    Expired,
}

/// Issues and verifies access tokens.
pub trait CredentialIssuer: Send + Sync + 'static {
    /// Mint a token naming `user`.
    fn issue(&self, user: &UserId) -> Credential;

    /// Check `token` and return the user it names.
    fn verify(&self, token: &str) -> Result<UserId, CredentialError>;
}

// ---------------------------------------------------------------------------
// SignedTokenIssuer
// ---------------------------------------------------------------------------

/// Ed25519-backed [`CredentialIssuer`].
pub struct SignedTokenIssuer {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
    ttl: Duration,
}

impl SignedTokenIssuer {
    pub fn new(signing_key: SigningKey, ttl_secs: u64) -> Self {
        let verifying_key = signing_key.verifying_key();
        let ttl = Duration::seconds(ttl_secs.min(MAX_TTL_SECS) as i64);
        Self {
            signing_key,
            verifying_key,
            ttl,
        }
    }

    /// Issuer with a throwaway key. Tokens die with the process.
    pub fn ephemeral(ttl_secs: u64) -> Self {
        Self::new(SigningKey::generate(&mut OsRng), ttl_secs)
    }

    /// Load the signing seed from storage, or generate a new one and save it.
    pub async fn load_or_generate(
        storage: &Arc<dyn Storage>,
        ttl_secs: u64,
    ) -> Result<Self, StorageError> {
        if let Some(hex_seed) = storage.get_node_config(SEED_KEY).await? {
            let seed_bytes = hex::decode(&hex_seed)
                .map_err(|e| StorageError::Internal(format!("invalid signing seed: {e}")))?;
            let bytes: [u8; 32] = seed_bytes
                .try_into()
                .map_err(|_| StorageError::Internal("signing seed must be 32 bytes".into()))?;
            Ok(Self::new(SigningKey::from_bytes(&bytes), ttl_secs))
        } else {
            let signing_key = SigningKey::generate(&mut OsRng);
            storage
                .set_node_config(SEED_KEY, &hex::encode(signing_key.to_bytes()))
                .await?;
            tracing::info!("generated new credential signing key");
            Ok(Self::new(signing_key, ttl_secs))
        }
    }

    /// Mint a token with an explicit expiry instant.
    pub fn issue_until(&self, user: &UserId, expires_at: DateTime<Utc>) -> Credential {
        let payload = format!("{user}.{}", expires_at.timestamp());
        let sig = self.signing_key.sign(payload.as_bytes()).to_bytes();
        Credential {
            token: format!("{payload}.z{}", bs58::encode(sig).into_string()),
            expires_at,
        }
    }
}

impl CredentialIssuer for SignedTokenIssuer {
    fn issue(&self, user: &UserId) -> Credential {
        self.issue_until(user, Utc::now() + self.ttl)
    }

    fn verify(&self, token: &str) -> Result<UserId, CredentialError> {
        let (payload, sig) = token
            .rsplit_once('.')
            .ok_or_else(|| CredentialError::Malformed("missing signature".into()))?;
        let (user, expires) = payload
            .split_once('.')
            .ok_or_else(|| CredentialError::Malformed("missing expiry".into()))?;

        let sig_bytes = bs58::decode(
            sig.strip_prefix('z')
                .ok_or_else(|| CredentialError::Malformed("signature must start with 'z'".into()))?,
        )
        .into_vec()
        .map_err(|e| CredentialError::Malformed(format!("bs58 decode failed: {e}")))?;
        let sig_array: [u8; 64] = sig_bytes
            .try_into()
            .map_err(|_| CredentialError::Malformed("signature must be 64 bytes".into()))?;

        self.verifying_key
            .verify(payload.as_bytes(), &Signature::from_bytes(&sig_array))
            .map_err(|_| CredentialError::BadSignature)?;

        let expires: i64 = expires
            .parse()
            .map_err(|_| CredentialError::Malformed("expiry is not a timestamp".into()))?;
        let expires_at = Utc
            .timestamp_opt(expires, 0)
            .single()
            .ok_or_else(|| CredentialError::Malformed("expiry out of range".into()))?;
        if expires_at <= Utc::now() {
            return Err(CredentialError::Expired);
        }

        user.parse()
            .map_err(|e: kinship::InvalidUserId| CredentialError::Malformed(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
