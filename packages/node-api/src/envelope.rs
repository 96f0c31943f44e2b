//! Success envelope shared by every endpoint.

use serde::{Deserialize, Serialize};

/// The JSON body returned for all successful responses.
///
/// ```json
/// { "statusCode": 200, "success": true, "message": "Follow request sent.", "data": { "status": "requested" } }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    /// HTTP status the response was sent with.
    pub status_code: u16,

    /// Always `true`; `false` bodies use [`crate::ErrorResponse`].
    pub success: bool,

    /// Human-readable summary of what happened.
    pub message: String,

    /// Endpoint-specific payload. `null` for confirmation-only endpoints.
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn new(status_code: u16, data: T, message: impl Into<String>) -> Self {
        Self {
            status_code,
            success: status_code < 400,
            message: message.into(),
            data,
        }
    }

    /// A `200 OK` envelope.
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self::new(200, data, message)
    }
}

impl ApiResponse<Option<()>> {
    /// A `200 OK` envelope whose `data` is `null`.
    pub fn message_only(message: impl Into<String>) -> Self {
        Self::ok(None, message)
    }
}
