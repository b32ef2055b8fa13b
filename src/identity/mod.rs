//! Caller identity: bearer extraction and credential verification.

mod bearer;
mod claims;
mod jwt;
mod remote;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;

use crate::config::{Config, ConfigError, IdentityMode};
use crate::error::RelayError;

pub use bearer::extract_bearer;
pub use claims::{CallerIdentity, Claims};
pub use jwt::JwtVerifier;
pub use remote::RemoteVerifier;

/// Validates a bearer token and yields the caller it was issued to.
///
/// Every failure (expiry, bad signature, malformed token, verifier
/// unavailable) is reported as `RelayError::InvalidCredential`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Verifies `token`.
    async fn verify(&self, token: &str) -> Result<CallerIdentity, RelayError>;
}

/// Builds the verifier selected by `IDENTITY_MODE`, or `None` when disabled.
pub fn verifier_from_config(
    config: &Config,
    client: Client,
) -> Result<Option<Arc<dyn IdentityVerifier>>, ConfigError> {
    match config.identity_mode {
        IdentityMode::Disabled => Ok(None),
        IdentityMode::Jwt => {
            let mut verifier = match (&config.identity_jwt_public_key, &config.identity_jwt_secret) {
                (Some(pem), _) => JwtVerifier::rsa_pem(pem.as_bytes())
                    .map_err(|e| ConfigError::ParseError {
                        name: "IDENTITY_JWT_PUBLIC_KEY".to_string(),
                        reason: e.to_string(),
                    })?,
                (None, Some(secret)) => JwtVerifier::hmac(secret.expose_secret().as_bytes()),
                (None, None) => {
                    return Err(ConfigError::MissingRequired(
                        "IDENTITY_JWT_SECRET or IDENTITY_JWT_PUBLIC_KEY".to_string(),
                    ))
                }
            };
            if let Some(issuer) = &config.identity_jwt_issuer {
                verifier = verifier.with_issuer(issuer);
            }
            if let Some(audience) = &config.identity_jwt_audience {
                verifier = verifier.with_audience(audience);
            }
            Ok(Some(Arc::new(verifier)))
        }
        IdentityMode::Remote => {
            let endpoint = config
                .identity_service_url
                .clone()
                .ok_or_else(|| ConfigError::MissingRequired("IDENTITY_SERVICE_URL".to_string()))?;
            Ok(Some(Arc::new(RemoteVerifier::new(client, endpoint))))
        }
    }
}
