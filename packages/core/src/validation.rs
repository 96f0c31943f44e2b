use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::types::User;

pub const MAX_FULL_NAME_LEN: usize = 100;
pub const MAX_BIO_LEN: usize = 500;
pub const MAX_AVATAR_LEN: usize = 2048;
pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 128;

/// Errors returned when a user profile fails validation.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error(
        "username must be 3-30 characters of lowercase letters, digits, '_' or '.', got: {0:?}"
    )]
    InvalidUsername(String),

    #[error("fullName must not be empty")]
    EmptyFullName,

    #[error("fullName must be at most {} characters", MAX_FULL_NAME_LEN)]
    FullNameTooLong,

    #[error("avatar must be an http(s) URL of at most {max} characters, got: {0:?}", max = MAX_AVATAR_LEN)]
    InvalidAvatar(String),

    #[error("bio must be at most {} characters", MAX_BIO_LEN)]
    BioTooLong,

    #[error("createdAt must be a valid RFC 3339 date-time, got: {0:?}")]
    InvalidTimestamp(String),

    #[error(
        "password must be {}-{} characters and not only whitespace",
        MIN_PASSWORD_LEN,
        MAX_PASSWORD_LEN
    )]
    WeakPassword,
}

/// Validate the profile fields of a [`User`].
///
/// Returns the first [`ValidationError`] found, in field order. Relation sets
/// are not inspected here; see [`crate::graph::check_user`].
pub fn validate_user(user: &User) -> Result<(), ValidationError> {
    validate_username(&user.username)?;

    let name = user.full_name.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyFullName);
    }
    if name.chars().count() > MAX_FULL_NAME_LEN {
        return Err(ValidationError::FullNameTooLong);
    }

    if let Some(avatar) = &user.avatar {
        let scheme_ok = avatar.starts_with("https://") || avatar.starts_with("http://");
        if !scheme_ok || avatar.len() > MAX_AVATAR_LEN {
            return Err(ValidationError::InvalidAvatar(avatar.clone()));
        }
    }

    if let Some(bio) = &user.bio {
        if bio.chars().count() > MAX_BIO_LEN {
            return Err(ValidationError::BioTooLong);
        }
    }

    chrono::DateTime::parse_from_rfc3339(&user.created_at)
        .map_err(|_| ValidationError::InvalidTimestamp(user.created_at.clone()))?;

    Ok(())
}

pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    if USERNAME_RE.is_match(username) {
        Ok(())
    } else {
        Err(ValidationError::InvalidUsername(username.to_string()))
    }
}

/// Passwords are checked on their own: the hash never lives on [`User`].
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    let len = password.chars().count();
    if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len) || password.trim().is_empty() {
        return Err(ValidationError::WeakPassword);
    }
    Ok(())
}

/// `^[a-z0-9_.]{3,30}$`
static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_.]{3,30}$").expect("invalid username regex"));

// --- tests -------------------------------------------------------------------
