//! Standard error response body.

use serde::{Deserialize, Serialize};

/// The JSON body returned for all error responses.
///
/// ```json
/// { "success": false, "message": "Target user not found.", "errors": [], "code": "not_found" }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Always `false`.
    pub success: bool,

    /// Human-readable description of the problem.
    pub message: String,

    /// Additional detail lines, e.g. the underlying storage failure.
    #[serde(default)]
    pub errors: Vec<String>,

    /// Machine-readable error code.
    ///
    /// | `code` | HTTP status |
    /// |--------|------------|
    /// | `invalid_identifier` | 400 |
    /// | `self_reference` | 400 |
    /// | `invalid_state` | 400 |
    /// | `invalid_parameter` | 400 |
    /// | `unauthorized` | 401 |
    /// | `forbidden` | 403 |
    /// | `not_found` | 404 |
    /// | `conflict` | 409 |
    /// | `validation_failed` | 422 |
    /// | `rate_limit_exceeded` | 429 |
    /// | `internal_error` | 500 |
    pub code: String,
}

impl ErrorResponse {
    /// Construct an [`ErrorResponse`] from a code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            code: code.into(),
            message: message.into(),
            errors: Vec::new(),
        }
    }

    /// Attach detail lines.
    pub fn with_errors(mut self, errors: Vec<String>) -> Self {
        self.errors = errors;
        self
    }
}

/// Well-known error codes.
pub mod codes {
    pub const INVALID_IDENTIFIER: &str = "invalid_identifier";
    pub const SELF_REFERENCE: &str = "self_reference";
    pub const INVALID_STATE: &str = "invalid_state";
    pub const INVALID_PARAMETER: &str = "invalid_parameter";
    pub const UNAUTHORIZED: &str = "unauthorized";
    pub const FORBIDDEN: &str = "forbidden";
    pub const NOT_FOUND: &str = "not_found";
    pub const CONFLICT: &str = "conflict";
    pub const VALIDATION_FAILED: &str = "validation_failed";
    pub const RATE_LIMIT_EXCEEDED: &str = "rate_limit_exceeded";
    pub const INTERNAL_ERROR: &str = "internal_error";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_body_is_unsuccessful() {
        let e = ErrorResponse::new(codes::NOT_FOUND, "User not found.");
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["code"], "not_found");
        assert!(json["errors"].as_array().unwrap().is_empty());
    }

    #[test]
    fn errors_default_when_absent() {
        let json = r#"{"success":false,"message":"nope","code":"forbidden"}"#;
        let e: ErrorResponse = serde_json::from_str(json).unwrap();
        assert!(e.errors.is_empty());
    }
}
