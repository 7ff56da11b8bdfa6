//! # Application Error Types
//!
//! Unified error handling with automatic HTTP conversion, re-keyed to the
//! BBS runtime's own error taxonomy rather than a generic REST vocabulary:
//!
//! - `ValidationRejection` - input failed a shape or bound check (400)
//! - `AuthRejection` - credentials invalid, session unknown, not authenticated (401)
//! - `NotFound` - referenced entity absent (404)
//! - `ConflictRejection` - duplicate username/email (409)
//! - `SandboxRejection` - static analysis refused code, or runtime exceeded quota (400)
//! - `QuotaRejection` - a rate limit tripped (429)
//! - `StoreFault` - persistence layer error (500)
//! - `RemoteFetchFault` - remote-source repository unreachable (502)
//!
//! Internal invariant violations are logged and reported to the client as
//! an opaque `StoreFault`-shaped 500 - they must never leak details.
//!
//! Both `actix_web::ResponseError` and `axum::response::IntoResponse` are
//! implemented, even though `bbs-server` binds only actix - the dual impl
//! is cheap and keeps the error type usable outside one HTTP framework.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use validator::ValidationErrors;

/// Result type alias for handlers and services.
pub type ApiResult<T> = Result<T, ApiError>;

/// Application error type with automatic HTTP status mapping.
#[derive(Debug, Error)]
pub enum ApiError {
    // =========================================================================
    // ValidationRejection (400)
    // =========================================================================
    /// Request body failed `validator`-derived field checks.
    #[error("Validation error")]
    ValidationError(#[from] ValidationErrors),

    /// Generic bad-shape input that doesn't fit the `validator` pattern.
    #[error("Invalid input: {message}")]
    BadRequest {
        /// Human-readable description of what's wrong
        message: String,
    },

    /// A string failed its contract bound (id/name/description/welcome/response length, §4.4).
    #[error("Contract violation: {reason}")]
    ContractViolation {
        /// Which bound or shape check failed
        reason: String,
    },

    // =========================================================================
    // AuthRejection (401)
    // =========================================================================
    /// Username/password combination did not verify.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Request is missing a required session key, or the session is unknown.
    #[error("Missing or unknown session")]
    MissingSession,

    /// Session exists but is not bound to an authenticated user.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Authenticated, but the session's role lacks the required privilege
    /// (e.g. a non-admin issuing `INSTALL`/`UNINSTALL`).
    #[error("Insufficient permissions")]
    InsufficientPermissions,

    // =========================================================================
    // NotFound (404)
    // =========================================================================
    /// Referenced entity (session, user, app, key) does not exist.
    #[error("Resource not found: {resource}")]
    NotFound {
        /// Resource identifier (e.g., "session:abc", "app:hangman")
        resource: String,
    },

    // =========================================================================
    // ConflictRejection (409)
    // =========================================================================
    /// Action would violate a uniqueness constraint (username/email).
    #[error("Resource already exists: {resource}")]
    Conflict {
        /// Description of the conflict
        resource: String,
    },

    // =========================================================================
    // SandboxRejection (400 at install time, in-app error at dispatch time)
    // =========================================================================
    /// Static analysis rejected a remote app's source, or the isolate
    /// exceeded its wall-clock/CPU/memory quota, or its result was malformed.
    #[error("Sandbox rejected app: {reason}")]
    SandboxRejection {
        /// Precise reason for the rejection (e.g. "dangerous method: eval")
        reason: String,
    },

    // =========================================================================
    // QuotaRejection (429)
    // =========================================================================
    /// A per-app rate limit (§5) was exceeded.
    #[error("Too many requests")]
    TooManyRequests {
        /// Seconds until the client can retry, when known
        retry_after_seconds: u64,
    },

    // =========================================================================
    // StoreFault (500)
    // =========================================================================
    /// PostgreSQL query failed.
    #[error("Database error")]
    DatabaseError(#[from] sqlx::Error),

    /// Redis operation failed.
    #[error("Redis error")]
    RedisError(#[from] redis::RedisError),

    /// Unspecified internal/invariant error. Logged with detail; the
    /// client only ever sees the generic message.
    #[error("Internal server error")]
    InternalError {
        /// Internal message for logging (not exposed to client)
        message: String,
    },

    // =========================================================================
    // RemoteFetchFault (502)
    // =========================================================================
    /// The remote source-repository host was unreachable, or the URL did
    /// not point at an allow-listed host.
    #[error("Remote source unreachable: {reason}")]
    RemoteFetchFault {
        /// Why the fetch failed
        reason: String,
    },
}

impl ApiError {
    /// Returns a machine-readable, stable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ValidationError(_) => "VALIDATION_REJECTION",
            Self::BadRequest { .. } => "VALIDATION_REJECTION",
            Self::ContractViolation { .. } => "VALIDATION_REJECTION",
            Self::InvalidCredentials => "AUTH_REJECTION",
            Self::MissingSession => "AUTH_REJECTION",
            Self::NotAuthenticated => "AUTH_REJECTION",
            Self::InsufficientPermissions => "AUTH_REJECTION",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conflict { .. } => "CONFLICT_REJECTION",
            Self::SandboxRejection { .. } => "SANDBOX_REJECTION",
            Self::TooManyRequests { .. } => "QUOTA_REJECTION",
            Self::DatabaseError(_) => "STORE_FAULT",
            Self::RedisError(_) => "STORE_FAULT",
            Self::InternalError { .. } => "STORE_FAULT",
            Self::RemoteFetchFault { .. } => "REMOTE_FETCH_FAULT",
        }
    }

    /// Returns the HTTP status code for this error. Source of truth for
    /// both the actix and axum integrations below.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ValidationError(_) | Self::BadRequest { .. } | Self::ContractViolation { .. } => {
                StatusCode::BAD_REQUEST
            }
            Self::InvalidCredentials
            | Self::MissingSession
            | Self::NotAuthenticated => StatusCode::UNAUTHORIZED,
            Self::InsufficientPermissions => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::SandboxRejection { .. } => StatusCode::BAD_REQUEST,
            Self::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::DatabaseError(_) | Self::RedisError(_) | Self::InternalError { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::RemoteFetchFault { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    /// Returns `true` if this is a server-side fault (5xx) that should be
    /// logged at ERROR and never have its detail exposed to the client.
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::DatabaseError(_) | Self::RedisError(_) | Self::InternalError { .. }
        )
    }
}

/// Standard error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ErrorResponse {
    pub fn new(error: &ApiError) -> Self {
        let details = match error {
            ApiError::ValidationError(errors) => {
                Some(serde_json::to_value(errors).unwrap_or_default())
            }
            ApiError::TooManyRequests { retry_after_seconds } => {
                Some(serde_json::json!({ "retryAfterSeconds": retry_after_seconds }))
            }
            ApiError::SandboxRejection { reason } => {
                Some(serde_json::json!({ "reason": reason }))
            }
            // Server errors: never expose internal detail
            ApiError::DatabaseError(_) | ApiError::RedisError(_) | ApiError::InternalError { .. } => {
                None
            }
            _ => None,
        };

        Self {
            code: error.error_code().to_string(),
            message: error.to_string(),
            request_id: None,
            details,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn with_request_id(mut self, request_id: Uuid) -> Self {
        self.request_id = Some(request_id.to_string());
        self
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        self.status_code()
    }

    fn error_response(&self) -> HttpResponse {
        if self.is_server_error() {
            tracing::error!(error = %self, code = self.error_code(), "server error");
        } else {
            tracing::warn!(error = %self, code = self.error_code(), "client error");
        }
        let response = ErrorResponse::new(self);
        HttpResponse::build(self.status_code()).json(response)
    }
}

impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.status_code() {
            StatusCode::UNAUTHORIZED => axum::http::StatusCode::UNAUTHORIZED,
            StatusCode::FORBIDDEN => axum::http::StatusCode::FORBIDDEN,
            StatusCode::BAD_REQUEST => axum::http::StatusCode::BAD_REQUEST,
            StatusCode::NOT_FOUND => axum::http::StatusCode::NOT_FOUND,
            StatusCode::CONFLICT => axum::http::StatusCode::CONFLICT,
            StatusCode::TOO_MANY_REQUESTS => axum::http::StatusCode::TOO_MANY_REQUESTS,
            StatusCode::BAD_GATEWAY => axum::http::StatusCode::BAD_GATEWAY,
            _ => axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        };

        let response = ErrorResponse::new(&self);
        (status, axum::Json(response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_return_401() {
        assert_eq!(ApiError::InvalidCredentials.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::MissingSession.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::NotAuthenticated.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn insufficient_permissions_is_403() {
        assert_eq!(ApiError::InsufficientPermissions.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn resource_errors() {
        assert_eq!(
            ApiError::NotFound { resource: "session:abc".to_string() }.status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Conflict { resource: "username".to_string() }.status_code(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn sandbox_rejection_is_400() {
        assert_eq!(
            ApiError::SandboxRejection { reason: "dangerous method: eval".into() }.status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn quota_rejection_is_429() {
        assert_eq!(
            ApiError::TooManyRequests { retry_after_seconds: 30 }.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn remote_fetch_fault_is_502() {
        assert_eq!(
            ApiError::RemoteFetchFault { reason: "unreachable".into() }.status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn server_errors_are_flagged() {
        assert!(ApiError::InternalError { message: "x".into() }.is_server_error());
        assert!(!ApiError::InvalidCredentials.is_server_error());
        assert!(!ApiError::SandboxRejection { reason: "x".into() }.is_server_error());
    }

    #[test]
    fn error_response_includes_timestamp() {
        let error = ApiError::InvalidCredentials;
        let response = ErrorResponse::new(&error);
        let diff = chrono::Utc::now() - response.timestamp;
        assert!(diff.num_seconds() < 60);
    }
}
