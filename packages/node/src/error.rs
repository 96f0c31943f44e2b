//! Application-level error type returned by handlers.
//!
//! All variants serialise to the [`ErrorResponse`] JSON format and map to the
//! appropriate HTTP status code.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use kinship::{InvalidUserId, SocialError, ValidationError};
use kinship_node_api::{error::codes, ErrorResponse};

use crate::{credentials::CredentialError, social::GraphError, storage::StorageError};

/// An error that a handler can return; converts directly to an HTTP response.
#[derive(Debug)]
pub enum AppError {
    InvalidIdentifier(String),
    SelfReference(String),
    InvalidState(String),
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    UnprocessableEntity(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, errors) = match self {
            AppError::InvalidIdentifier(msg) => {
                (StatusCode::BAD_REQUEST, codes::INVALID_IDENTIFIER, msg, vec![])
            }
            AppError::SelfReference(msg) => {
                (StatusCode::BAD_REQUEST, codes::SELF_REFERENCE, msg, vec![])
            }
            AppError::InvalidState(msg) => {
                (StatusCode::BAD_REQUEST, codes::INVALID_STATE, msg, vec![])
            }
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, codes::INVALID_PARAMETER, msg, vec![])
            }
            AppError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, codes::UNAUTHORIZED, msg, vec![])
            }
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, codes::FORBIDDEN, msg, vec![]),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, codes::NOT_FOUND, msg, vec![]),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, codes::CONFLICT, msg, vec![]),
            AppError::UnprocessableEntity(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                codes::VALIDATION_FAILED,
                msg,
                vec![],
            ),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    codes::INTERNAL_ERROR,
                    "Internal Server Error".to_string(),
                    vec![msg],
                )
            }
        };
        if status.is_client_error() {
            tracing::debug!(%status, code, %message, "request refused");
        }
        let body = ErrorResponse::new(code, message).with_errors(errors);
        (status, Json(body)).into_response()
    }
}

impl From<StorageError> for AppError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound => AppError::NotFound("not found".into()),
            StorageError::Conflict(msg) => AppError::Conflict(msg),
            StorageError::Stale(msg) => AppError::Conflict(msg),
            StorageError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl From<SocialError> for AppError {
    fn from(e: SocialError) -> Self {
        match e {
            SocialError::SelfReference(msg) => AppError::SelfReference(msg),
            SocialError::NotFound(msg) => AppError::NotFound(msg),
            SocialError::InvalidState(msg) => AppError::InvalidState(msg),
            SocialError::Forbidden(msg) => AppError::Forbidden(msg),
            SocialError::Unauthorized(msg) => AppError::Unauthorized(msg),
        }
    }
}

impl From<GraphError> for AppError {
    fn from(e: GraphError) -> Self {
        match e {
            GraphError::Social(e) => e.into(),
            GraphError::Storage(e) => e.into(),
            GraphError::Invalid(e) => e.into(),
            GraphError::Contended(_) => AppError::Conflict(
                "The account was modified concurrently. Please retry.".into(),
            ),
        }
    }
}

impl From<CredentialError> for AppError {
    fn from(e: CredentialError) -> Self {
        let msg = match e {
            CredentialError::Expired => {
                "Access Denied / Unauthorized request: Access token expired. Please log in again."
            }
            CredentialError::BadSignature | CredentialError::Malformed(_) => {
                "Access Denied / Unauthorized request: Invalid access token. Please log in again."
            }
        };
        AppError::Unauthorized(msg.into())
    }
}

impl From<InvalidUserId> for AppError {
    fn from(e: InvalidUserId) -> Self {
        AppError::InvalidIdentifier(e.to_string())
    }
}

impl From<ValidationError> for AppError {
    fn from(e: ValidationError) -> Self {
        AppError::UnprocessableEntity(e.to_string())
    }
}
