// Error handling types for the API

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::fmt;
use tracing::{error, warn};

/// API error types
#[derive(Debug)]
pub enum ApiError {
    /// Wrong username and/or password. Deliberately never says which.
    InvalidCredentials,
    /// Token signature and structure are fine but the expiry has passed.
    TokenExpired,
    /// Token is structurally invalid, signed with another key, or carries
    /// the wrong purpose for the endpoint it was presented to.
    TokenMalformed,
    /// Token was explicitly revoked before its natural expiry.
    TokenRevoked,
    /// OAuth provider exchange failed (network, timeout or provider-side).
    ProviderExchangeFailed(String),
    /// Concurrent first-time registration race that survived the
    /// retry-as-update path. Corruption-level, fatal for the request.
    DuplicateIdentity(String),
    Conflict(String),
    Unauthorized(String),
    Forbidden(String),
    BadRequest(String),
    InternalServer(String),
    DatabaseError(sqlx::Error),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::InvalidCredentials => write!(f, "Invalid username and/or password"),
            ApiError::TokenExpired => write!(f, "Token expired"),
            ApiError::TokenMalformed => write!(f, "Token malformed"),
            ApiError::TokenRevoked => write!(f, "Token revoked"),
            ApiError::ProviderExchangeFailed(msg) => write!(f, "Provider exchange failed: {}", msg),
            ApiError::DuplicateIdentity(msg) => write!(f, "Duplicate identity: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            ApiError::InternalServer(msg) => write!(f, "Internal Server Error: {}", msg),
            ApiError::DatabaseError(e) => write!(f, "Database Error: {}", e),
        }
    }
}

/// JSON error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_message, code) = match self {
            ApiError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "invalid username and/or password".to_string(),
                "INVALID_CREDENTIALS",
            ),
            ApiError::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                "session expired, please log in again".to_string(),
                "TOKEN_EXPIRED",
            ),
            ApiError::TokenMalformed => (
                StatusCode::UNAUTHORIZED,
                "session invalid".to_string(),
                "TOKEN_MALFORMED",
            ),
            ApiError::TokenRevoked => (
                StatusCode::UNAUTHORIZED,
                "session invalid".to_string(),
                "TOKEN_REVOKED",
            ),
            ApiError::ProviderExchangeFailed(msg) => {
                // Detail stays server-side; the caller only learns the login failed.
                warn!(detail = %msg, "OAuth provider exchange failed");
                (
                    StatusCode::UNAUTHORIZED,
                    "login failed".to_string(),
                    "PROVIDER_EXCHANGE_FAILED",
                )
            }
            ApiError::DuplicateIdentity(msg) => {
                error!(detail = %msg, "Identity reconciliation failed after retry");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "login failed".to_string(),
                    "DUPLICATE_IDENTITY",
                )
            }
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg, "CONFLICT"),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg, "UNAUTHORIZED"),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg, "FORBIDDEN"),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, "BAD_REQUEST"),
            ApiError::InternalServer(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                msg,
                "INTERNAL_SERVER_ERROR",
            ),
            ApiError::DatabaseError(e) => {
                error!(error = %e, "Database error occurred");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database operation failed".to_string(),
                    "DATABASE_ERROR",
                )
            }
        };

        let error_response = ErrorResponse {
            error: error_message,
            code: code.to_string(),
        };

        (status, Json(error_response)).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        ApiError::DatabaseError(e)
    }
}
