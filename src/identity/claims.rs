use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Claims carried by a verified credential.
///
/// Identity providers disagree on where the caller id lives: Firebase-style
/// tokens use `uid`, standard JWTs use `sub`. Both are accepted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[allow(missing_docs)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(flatten)]
    pub custom: HashMap<String, serde_json::Value>,
}

impl Claims {
    /// The caller id: `uid` if present and non-empty, else `sub`.
    pub fn subject(&self) -> Option<&str> {
        [self.uid.as_deref(), self.sub.as_deref()]
            .into_iter()
            .flatten()
            .find(|s| !s.is_empty())
    }

    /// True when `exp` lies in the past.
    pub fn is_expired(&self) -> bool {
        self.exp
            .is_some_and(|exp| exp < chrono::Utc::now().timestamp())
    }
}

/// A verified caller, valid for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct CallerIdentity {
    /// Subject identifier the credential was issued to
    pub subject: String,
    /// Full decoded claims
    pub claims: Claims,
}

impl CallerIdentity {
    /// Builds an identity from claims, or `None` when they name no subject.
    pub fn from_claims(claims: Claims) -> Option<Self> {
        let subject = claims.subject()?.to_string();
        Some(Self { subject, claims })
    }
}
