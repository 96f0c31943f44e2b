//! HTTP request handlers for all Kinship node endpoints.
//!
//! Each submodule covers one route group. Handlers are async functions that
//! receive Axum extractors and return `Result<impl IntoResponse, AppError>`.
//! Follow-state changes go through [`SocialGraph`]; handlers never write
//! relation sets themselves.

pub mod auth;
pub mod node;
pub mod social;
pub mod users;

use std::sync::Arc;

use kinship::UserId;

use crate::{
    config::NodeConfig, credentials::CredentialIssuer, error::AppError, passwords::Passwords,
    social::SocialGraph, storage::Storage,
};

/// Shared application state threaded through all Axum handlers via [`axum::extract::State`].
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub config: NodeConfig,
    /// Mints tokens at registration and verifies them in the auth extractors.
    pub credentials: Arc<dyn CredentialIssuer>,
    pub passwords: Passwords,
    pub graph: SocialGraph,
}

/// Parse a user id taken from the request path; `invalid` is the message
/// returned when it is not a well-formed id.
pub(crate) fn parse_user_id(raw: &str, invalid: &str) -> Result<UserId, AppError> {
    raw.parse::<UserId>()
        .map_err(|_| AppError::InvalidIdentifier(invalid.to_string()))
}
