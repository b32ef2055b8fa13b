//! Verification delegated to an external identity service.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use url::Url;

use super::{CallerIdentity, Claims, IdentityVerifier};
use crate::error::RelayError;

#[derive(Serialize)]
struct VerifyRequest<'a> {
    token: &'a str,
}

/// Posts `{"token": ...}` to an identity service and reads back its claims.
///
/// Only a `200` carrying an unexpired claims object with a subject is
/// accepted. Every other outcome, transport failures included, rejects the
/// credential.
pub struct RemoteVerifier {
    client: Client,
    endpoint: Url,
}

impl RemoteVerifier {
    /// Creates a verifier for `endpoint`, sharing `client`.
    pub fn new(client: Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }
}

#[async_trait]
impl IdentityVerifier for RemoteVerifier {
    async fn verify(&self, token: &str) -> Result<CallerIdentity, RelayError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&VerifyRequest { token })
            .send()
            .await
            .map_err(|e| RelayError::invalid_credential(format!("identity service unreachable: {e}")))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(RelayError::invalid_credential(format!(
                "identity service answered {status}"
            )));
        }

        let claims: Claims = response
            .json()
            .await
            .map_err(|e| RelayError::invalid_credential(format!("unreadable claims: {e}")))?;

        if claims.is_expired() {
            return Err(RelayError::invalid_credential("identity service returned expired claims"));
        }

        CallerIdentity::from_claims(claims)
            .ok_or_else(|| RelayError::invalid_credential("claims carry no subject"))
    }
}
