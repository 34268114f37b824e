//! API error types and response handling.
//!
//! This module provides a unified error type for all API handlers
//! with automatic conversion to appropriate HTTP responses.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use proxima_core::ProximaError;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type.
///
/// Each variant maps to a specific HTTP status code and produces a
/// consistent JSON error response.
#[derive(Debug, Clone)]
pub enum ApiError {
    /// 400 Bad Request - Invalid input from a producer or viewer.
    BadRequest {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
    },

    /// 503 Service Unavailable - The server is shutting down.
    ServiceUnavailable {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
    },

    /// 500 Internal Server Error - Unexpected server-side error.
    InternalError {
        /// Machine-readable error code.
        error_code: String,
        /// Logged only, never sent to the client.
        details: String,
    },
}

impl ApiError {
    /// Shorthand for an internal error with logged details.
    pub fn internal(details: impl Into<String>) -> Self {
        Self::InternalError {
            error_code: "internal_error".to_string(),
            details: details.into(),
        }
    }
}

/// Standard JSON error response body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "invalid_reading",
    "message": "Invalid reading at index 1: malformed address 'AA:BB'"
}))]
pub struct ErrorResponse {
    /// Machine-readable error code (e.g., "invalid_address").
    #[schema(example = "invalid_address")]
    pub error: String,

    /// Human-readable error message.
    #[schema(example = "Invalid device address: 12345")]
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_response) = match self {
            Self::BadRequest { error_code, message } => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: error_code,
                    message,
                },
            ),

            Self::ServiceUnavailable { error_code, message } => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorResponse {
                    error: error_code,
                    message,
                },
            ),

            Self::InternalError {
                error_code,
                details,
            } => {
                tracing::error!(
                    error_code = %error_code,
                    details = %details,
                    "Internal server error"
                );

                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        error: error_code,
                        message: "An internal error occurred".to_string(),
                    },
                )
            }
        };

        (status, Json(error_response)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadRequest { message, .. } => write!(f, "Bad Request: {message}"),
            Self::ServiceUnavailable { message, .. } => {
                write!(f, "Service Unavailable: {message}")
            }
            Self::InternalError { details, .. } => write!(f, "Internal Error: {details}"),
        }
    }
}

impl std::error::Error for ApiError {}

/// Convert from proxima_core errors.
impl From<ProximaError> for ApiError {
    fn from(err: ProximaError) -> Self {
        let error_code = err.error_code().to_string();
        match err.http_status_code() {
            400 => Self::BadRequest {
                error_code,
                message: err.to_string(),
            },
            503 => Self::ServiceUnavailable {
                error_code,
                message: err.to_string(),
            },
            _ => Self::InternalError {
                error_code,
                details: err.to_string(),
            },
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest {
            error_code: "invalid_json".to_string(),
            message: rejection.body_text(),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest {
            error_code: "invalid_query".to_string(),
            message: rejection.body_text(),
        }
    }
}
