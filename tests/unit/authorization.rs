//! Authorization Unit Tests
//!
//! Subject matching and record existence against the in-memory store.

use std::sync::Arc;

use axum::http::{header, HeaderMap, HeaderValue};
use relay_edge::authorization::Authorizer;
use relay_edge::error::RelayError;
use relay_edge::identity::{extract_bearer, CallerIdentity, Claims};
use relay_edge::records::{InMemoryRecordStore, RecordStore};
use relay_edge::Envelope;
use serde_json::json;

fn envelope(user_id: &str) -> Envelope {
    Envelope::from_value(json!({"user_id": user_id, "message": "hello"})).unwrap()
}

fn identity(uid: &str) -> CallerIdentity {
    CallerIdentity::from_claims(Claims {
        uid: Some(uid.to_string()),
        ..Claims::default()
    })
    .unwrap()
}

fn authorizer(known: &[&str]) -> Authorizer {
    Authorizer::new(Arc::new(InMemoryRecordStore::new(known.iter().copied())))
}

#[tokio::test]
async fn test_known_caller_acting_as_themselves() {
    let result = authorizer(&["alice"])
        .authorize(&envelope("alice"), &identity("alice"))
        .await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_mismatch_checked_before_existence() {
    let err = authorizer(&[])
        .authorize(&envelope("alice"), &identity("bob"))
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::SubjectMismatch));
}

#[tokio::test]
async fn test_unknown_user() {
    let err = authorizer(&["bob"])
        .authorize(&envelope("alice"), &identity("alice"))
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::UnknownUser));
}

#[tokio::test]
async fn test_subject_comparison_is_exact() {
    let authorizer = authorizer(&["alice", "Alice"]);
    for (claimed, subject) in [("alice", "Alice"), ("alice", "alice "), ("alice", "alic")] {
        let err = authorizer
            .authorize(&envelope(claimed), &identity(subject))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::SubjectMismatch), "{claimed} vs {subject}");
    }
}

#[tokio::test]
async fn test_memory_store_ignores_blank_seeds() {
    let store = InMemoryRecordStore::new(["alice", " ", ""]);
    assert_eq!(store.len(), 1);
    assert!(store.exists("alice").await.unwrap());
    assert!(!store.exists("").await.unwrap());
}

#[test]
fn test_uid_preferred_over_sub() {
    let claims = Claims {
        uid: Some("firebase-uid".to_string()),
        sub: Some("oidc-sub".to_string()),
        ..Claims::default()
    };
    assert_eq!(claims.subject(), Some("firebase-uid"));

    let claims = Claims {
        uid: Some(String::new()),
        sub: Some("oidc-sub".to_string()),
        ..Claims::default()
    };
    assert_eq!(claims.subject(), Some("oidc-sub"));
    assert!(CallerIdentity::from_claims(Claims::default()).is_none());
}

#[test]
fn test_bearer_extraction() {
    let mut headers = HeaderMap::new();
    assert!(matches!(extract_bearer(&headers), Err(RelayError::AuthHeaderMissing)));

    headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwdw=="));
    assert!(matches!(extract_bearer(&headers), Err(RelayError::AuthFormat)));

    headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
    assert_eq!(extract_bearer(&headers).unwrap(), "abc.def.ghi");
}
