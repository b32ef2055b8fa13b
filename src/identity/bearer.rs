use axum::http::{header, HeaderMap};

use crate::error::RelayError;

const BEARER_PREFIX: &str = "Bearer ";

/// Pulls the bearer token out of the `Authorization` header.
///
/// A missing header is `AuthHeaderMissing`. Anything other than a
/// `Bearer <token>` value with a non-empty token is `AuthFormat`.
pub fn extract_bearer(headers: &HeaderMap) -> Result<&str, RelayError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(RelayError::AuthHeaderMissing)?;

    let value = value.to_str().map_err(|_| RelayError::AuthFormat)?;

    let token = value
        .strip_prefix(BEARER_PREFIX)
        .ok_or(RelayError::AuthFormat)?
        .trim();

    if token.is_empty() {
        return Err(RelayError::AuthFormat);
    }

    Ok(token)
}
