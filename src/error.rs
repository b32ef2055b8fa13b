//! Error handling module with type-safe, non-exhaustive error types
//!
//! This module provides a unified error handling approach with:
//! - Non-exhaustive enums for forward compatibility
//! - Structured error variants with contextual information
//! - A single mapping to HTTP status codes and caller-facing messages
//! - Sanitization: internal detail is logged, never returned to callers

use std::time::Duration;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Caller-facing message shared by every credential failure.
pub const INVALID_TOKEN_MESSAGE: &str = "Invalid or expired token.";

/// Caller-facing message for a user without a matching record.
pub const INVALID_USER_MESSAGE: &str = "Invalid user.";

/// Caller-facing message for failures whose detail must stay internal.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error.";

/// Maximum number of upstream body bytes kept for diagnostics.
const UPSTREAM_BODY_EXCERPT: usize = 512;

/// Non-exhaustive error enum for forward compatibility
/// New variants can be added without breaking existing code
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RelayError {
    /// Request body could not be decoded into an envelope
    #[error("Request body invalid: {reason}")]
    Decode {
        /// Description of the decoding failure
        reason: String,
    },

    /// A required envelope field is missing, empty, or not a string
    #[error("Required field missing: {field}")]
    MissingField {
        /// Name of the offending field
        field: &'static str,
    },

    /// No Authorization header was sent
    #[error("Authorization header missing")]
    AuthHeaderMissing,

    /// The Authorization header does not carry a bearer token
    #[error("Authorization header is not a bearer credential")]
    AuthFormat,

    /// The bearer token was rejected or could not be verified
    #[error("Credential rejected: {reason}")]
    InvalidCredential {
        /// Why verification failed (logged only)
        reason: String,
    },

    /// The verified subject differs from the claimed `user_id`
    #[error("Token subject does not match claimed user")]
    SubjectMismatch,

    /// No record exists for the claimed user
    #[error("No record for user")]
    UnknownUser,

    /// The record store could not answer
    #[error("Record store unavailable: {reason}")]
    StoreUnavailable {
        /// Description of the store failure (logged only)
        reason: String,
    },

    /// A rate-limit quota is exhausted
    #[error("Rate limit exceeded")]
    RateLimited {
        /// When the client can retry
        retry_after: Duration,
    },

    /// The upstream completion service failed or answered non-2xx
    #[error("Upstream request failed ({}): {detail}", upstream_status(.status))]
    Upstream {
        /// Upstream HTTP status, absent on transport failures
        status: Option<u16>,
        /// Truncated upstream body or transport error (logged only)
        detail: String,
    },

    /// A required setting is missing at request time
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error (details sanitized in responses)
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Stable error codes for logs, metrics and programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum ErrorCode {
    InvalidRequest,
    MissingField,
    TokenMissing,
    TokenMalformed,
    TokenInvalid,
    SubjectMismatch,
    UnknownUser,
    StoreUnavailable,
    RateLimited,
    UpstreamError,
    ConfigurationError,
    Internal,
}

impl ErrorCode {
    /// Get the string representation of the error code
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::MissingField => "MISSING_FIELD",
            Self::TokenMissing => "AUTH_TOKEN_MISSING",
            Self::TokenMalformed => "AUTH_TOKEN_MALFORMED",
            Self::TokenInvalid => "AUTH_TOKEN_INVALID",
            Self::SubjectMismatch => "AUTH_SUBJECT_MISMATCH",
            Self::UnknownUser => "AUTH_UNKNOWN_USER",
            Self::StoreUnavailable => "STORE_UNAVAILABLE",
            Self::RateLimited => "RATE_LIMITED",
            Self::UpstreamError => "UPSTREAM_ERROR",
            Self::ConfigurationError => "CONFIGURATION_ERROR",
            Self::Internal => "INTERNAL_ERROR",
        }
    }

    /// Get the HTTP status code for this error
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::InvalidRequest | Self::MissingField => StatusCode::BAD_REQUEST,
            Self::TokenMissing | Self::TokenMalformed | Self::TokenInvalid | Self::UnknownUser => {
                StatusCode::UNAUTHORIZED
            }
            Self::SubjectMismatch => StatusCode::FORBIDDEN,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::StoreUnavailable
            | Self::UpstreamError
            | Self::ConfigurationError
            | Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Uniform JSON error body: `{"error": "<message>"}`
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorBody {
    /// Sanitized, caller-facing message
    pub error: String,
}

/// Structured error response
#[derive(Debug, Clone)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: ErrorCode,
    /// Human-readable message (sanitized)
    pub message: String,
    /// Optional retry-after duration
    pub retry_after: Option<Duration>,
}

impl ErrorResponse {
    /// Create a new error response from a RelayError
    pub fn from_error(error: &RelayError) -> Self {
        let message = match error {
            RelayError::Decode { .. } => "Invalid request body.".to_string(),
            RelayError::MissingField { field } => format!("Missing required field: {field}."),
            RelayError::AuthHeaderMissing
            | RelayError::AuthFormat
            | RelayError::InvalidCredential { .. } => INVALID_TOKEN_MESSAGE.to_string(),
            RelayError::SubjectMismatch => "User ID does not match token.".to_string(),
            RelayError::UnknownUser => INVALID_USER_MESSAGE.to_string(),
            RelayError::RateLimited { .. } => "Rate limit exceeded.".to_string(),
            RelayError::Upstream { .. } => "Upstream service error.".to_string(),
            // Never expose store, configuration or internal details
            RelayError::StoreUnavailable { .. }
            | RelayError::Configuration(_)
            | RelayError::Internal(_) => INTERNAL_ERROR_MESSAGE.to_string(),
        };

        ErrorResponse {
            code: error.code(),
            message,
            retry_after: error.retry_after(),
        }
    }

    /// JSON body for this response
    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.message.clone(),
        }
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let mut response = (self.code.http_status(), Json(self.body())).into_response();

        if let Some(retry_after) = self.retry_after {
            // Retry-After is whole seconds; never advertise zero
            let secs = retry_after.as_secs().max(1);
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}

impl RelayError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Decode { .. } => ErrorCode::InvalidRequest,
            Self::MissingField { .. } => ErrorCode::MissingField,
            Self::AuthHeaderMissing => ErrorCode::TokenMissing,
            Self::AuthFormat => ErrorCode::TokenMalformed,
            Self::InvalidCredential { .. } => ErrorCode::TokenInvalid,
            Self::SubjectMismatch => ErrorCode::SubjectMismatch,
            Self::UnknownUser => ErrorCode::UnknownUser,
            Self::StoreUnavailable { .. } => ErrorCode::StoreUnavailable,
            Self::RateLimited { .. } => ErrorCode::RateLimited,
            Self::Upstream { .. } => ErrorCode::UpstreamError,
            Self::Configuration(_) => ErrorCode::ConfigurationError,
            Self::Internal(_) => ErrorCode::Internal,
        }
    }

    /// HTTP status this error maps to
    pub fn status(&self) -> StatusCode {
        self.code().http_status()
    }

    /// True for failures caused by the caller rather than the service
    pub fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }

    /// Get retry-after duration if applicable
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }

    /// Shorthand for a decoding failure
    pub fn decode(reason: impl Into<String>) -> Self {
        Self::Decode {
            reason: reason.into(),
        }
    }

    /// Shorthand for a credential failure
    pub fn invalid_credential(reason: impl Into<String>) -> Self {
        Self::InvalidCredential {
            reason: reason.into(),
        }
    }

    /// Shorthand for a record store failure
    pub fn store_unavailable(reason: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            reason: reason.into(),
        }
    }

    /// Builds an upstream failure, keeping only a bounded excerpt of the body
    pub fn upstream(status: Option<u16>, body: &str) -> Self {
        let detail = match body.char_indices().nth(UPSTREAM_BODY_EXCERPT) {
            Some((cut, _)) => format!("{}...", &body[..cut]),
            None => body.to_string(),
        };
        Self::Upstream { status, detail }
    }
}

fn upstream_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!("status {code}"),
        None => "no response".to_string(),
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        ErrorResponse::from_error(&self).into_response()
    }
}
