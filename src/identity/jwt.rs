//! Local JWT verification with `jsonwebtoken`.

use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use super::{CallerIdentity, Claims, IdentityVerifier};
use crate::error::RelayError;

/// Verifies tokens signed with a shared HMAC secret or an RSA key pair.
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    /// HS256 verification with a shared secret.
    pub fn hmac(secret: &[u8]) -> Self {
        Self::with_key(DecodingKey::from_secret(secret), Algorithm::HS256)
    }

    /// RS256 verification with a PEM-encoded public key.
    pub fn rsa_pem(pem: &[u8]) -> Result<Self, RelayError> {
        let key = DecodingKey::from_rsa_pem(pem)
            .map_err(|e| RelayError::Configuration(format!("invalid RSA public key: {e}")))?;
        Ok(Self::with_key(key, Algorithm::RS256))
    }

    fn with_key(key: DecodingKey, algorithm: Algorithm) -> Self {
        let mut validation = Validation::new(algorithm);
        // Audience is only checked when one is configured
        validation.validate_aud = false;
        Self { key, validation }
    }

    /// Requires the `iss` claim to equal `issuer`.
    #[must_use]
    pub fn with_issuer(mut self, issuer: &str) -> Self {
        self.validation.set_issuer(&[issuer]);
        self
    }

    /// Requires the `aud` claim to contain `audience`.
    #[must_use]
    pub fn with_audience(mut self, audience: &str) -> Self {
        self.validation.set_audience(&[audience]);
        self.validation.validate_aud = true;
        self
    }
}

#[async_trait]
impl IdentityVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> Result<CallerIdentity, RelayError> {
        let data = decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|e| RelayError::invalid_credential(format!("{:?}", e.kind())))?;

        CallerIdentity::from_claims(data.claims)
            .ok_or_else(|| RelayError::invalid_credential("token carries no subject"))
    }
}
