//! Error Handling Unit Tests
//!
//! Status mapping, caller-facing messages and sanitization.

use std::time::Duration;

use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use relay_edge::error::{ErrorCode, ErrorResponse, RelayError};

const SENSITIVE_PATTERNS: &[&str] = &["secret", "shard", "sk-", "billing", "redis", "password"];

fn caller_message(error: &RelayError) -> String {
    ErrorResponse::from_error(error).message
}

fn contains_sensitive_info(text: &str) -> bool {
    let lower = text.to_lowercase();
    SENSITIVE_PATTERNS.iter().any(|p| lower.contains(p))
}

// ============================================================================
// Status mapping
// ============================================================================

#[test]
fn test_client_errors() {
    assert_eq!(RelayError::decode("x").status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        RelayError::MissingField { field: "user_id" }.status(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(RelayError::AuthHeaderMissing.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(RelayError::AuthFormat.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        RelayError::invalid_credential("expired").status(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(RelayError::UnknownUser.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(RelayError::SubjectMismatch.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        RelayError::RateLimited {
            retry_after: Duration::from_secs(5)
        }
        .status(),
        StatusCode::TOO_MANY_REQUESTS
    );
}

#[test]
fn test_server_errors() {
    let errors = [
        RelayError::store_unavailable("connection refused"),
        RelayError::upstream(Some(502), "bad gateway"),
        RelayError::upstream(None, "dns failure"),
        RelayError::Configuration("UPSTREAM_API_KEY unset".to_string()),
        RelayError::Internal(anyhow::anyhow!("boom")),
    ];
    for error in errors {
        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR, "{error}");
        assert!(!error.is_client_error());
    }
}

#[test]
fn test_error_codes_are_stable() {
    assert_eq!(RelayError::AuthHeaderMissing.code().as_str(), "AUTH_TOKEN_MISSING");
    assert_eq!(RelayError::AuthFormat.code().as_str(), "AUTH_TOKEN_MALFORMED");
    assert_eq!(
        RelayError::invalid_credential("x").code(),
        ErrorCode::TokenInvalid
    );
    assert_eq!(ErrorCode::TokenInvalid.as_str(), "AUTH_TOKEN_INVALID");
    assert_eq!(ErrorCode::RateLimited.as_str(), "RATE_LIMITED");
}

// ============================================================================
// Caller-facing messages
// ============================================================================

#[test]
fn test_credential_failures_share_message() {
    for error in [
        RelayError::AuthHeaderMissing,
        RelayError::AuthFormat,
        RelayError::invalid_credential("ExpiredSignature"),
    ] {
        assert_eq!(caller_message(&error), "Invalid or expired token.");
    }
}

#[test]
fn test_missing_field_names_the_field() {
    assert_eq!(
        caller_message(&RelayError::MissingField { field: "message" }),
        "Missing required field: message."
    );
}

#[test]
fn test_internal_detail_never_reaches_caller() {
    let errors = [
        RelayError::store_unavailable("redis shard 3 down"),
        RelayError::upstream(Some(500), r#"{"error":"billing limit for sk-abc"}"#),
        RelayError::Configuration("secret missing".to_string()),
        RelayError::Internal(anyhow::anyhow!("password file unreadable")),
    ];
    for error in errors {
        assert!(contains_sensitive_info(&error.to_string()));
        assert!(!contains_sensitive_info(&caller_message(&error)), "{error}");
    }
}

#[test]
fn test_upstream_detail_is_bounded() {
    let body = "x".repeat(10_000);
    let RelayError::Upstream { detail, status } = RelayError::upstream(Some(500), &body) else {
        panic!("expected upstream error");
    };
    assert_eq!(status, Some(500));
    assert!(detail.len() < 600);
    assert!(detail.ends_with("..."));
}

// ============================================================================
// Responses
// ============================================================================

#[tokio::test]
async fn test_rate_limited_response_has_retry_after() {
    let response = RelayError::RateLimited {
        retry_after: Duration::from_secs(42),
    }
    .into_response();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()[header::RETRY_AFTER], "42");

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], br#"{"error":"Rate limit exceeded."}"#);
}

#[test]
fn test_sub_second_retry_after_rounds_up() {
    let response = RelayError::RateLimited {
        retry_after: Duration::from_millis(300),
    }
    .into_response();
    assert_eq!(response.headers()[header::RETRY_AFTER], "1");
}

#[test]
fn test_other_errors_have_no_retry_after() {
    let response = RelayError::UnknownUser.into_response();
    assert!(response.headers().get(header::RETRY_AFTER).is_none());
}
