//! Error Sanitization Property Tests
//!
//! Internal detail carried by an error never appears in the response body.

use axum::response::IntoResponse;
use proptest::prelude::*;
use relay_edge::error::{ErrorResponse, RelayError};

use super::generators::internal_detail;

fn response_body(error: RelayError) -> String {
    let response = error.into_response();
    let bytes = tokio_test::block_on(axum::body::to_bytes(response.into_body(), usize::MAX))
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: server-side failures answer with a fixed message
    #[test]
    fn prop_server_errors_are_masked(detail in internal_detail(), status in 400u16..600) {
        let errors = [
            RelayError::store_unavailable(detail.clone()),
            RelayError::upstream(Some(status), &detail),
            RelayError::upstream(None, &detail),
            RelayError::Configuration(detail.clone()),
            RelayError::Internal(anyhow::anyhow!(detail.clone())),
        ];
        for error in errors {
            let body = response_body(error);
            prop_assert!(!body.contains(&detail), "leaked: {}", body);
        }
    }

    /// Property: credential failures are indistinguishable to the caller
    #[test]
    fn prop_credential_failures_look_alike(reason in internal_detail()) {
        let expected = ErrorResponse::from_error(&RelayError::AuthHeaderMissing).message;
        let rejected = RelayError::invalid_credential(reason.clone());
        prop_assert_eq!(&ErrorResponse::from_error(&rejected).message, &expected);
        prop_assert_eq!(&ErrorResponse::from_error(&RelayError::AuthFormat).message, &expected);
        prop_assert!(!response_body(rejected).contains(&reason));
    }

    /// Property: every error body is a single `error` string
    #[test]
    fn prop_error_body_shape(detail in internal_detail(), secs in 0u64..100_000) {
        let errors = [
            RelayError::decode(detail.clone()),
            RelayError::UnknownUser,
            RelayError::SubjectMismatch,
            RelayError::RateLimited { retry_after: std::time::Duration::from_secs(secs) },
            RelayError::store_unavailable(detail),
        ];
        for error in errors {
            let body: serde_json::Value = serde_json::from_str(&response_body(error)).unwrap();
            let object = body.as_object().unwrap();
            prop_assert_eq!(object.len(), 1);
            prop_assert!(object["error"].is_string());
        }
    }
}
