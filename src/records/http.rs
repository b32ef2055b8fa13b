use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use super::RecordStore;
use crate::config::ConfigError;
use crate::error::RelayError;

/// Document-store client: `GET {base}/{collection}/{user_id}`.
///
/// `200` means the record exists, `404` that it does not. Any other status
/// or a transport failure is `StoreUnavailable`.
pub struct HttpRecordStore {
    client: Client,
    base: Url,
    collection: String,
    token: Option<SecretString>,
}

impl HttpRecordStore {
    /// Creates a store rooted at `base` reading from `collection`.
    pub fn new(client: Client, base: Url, collection: &str) -> Result<Self, ConfigError> {
        if base.cannot_be_a_base() {
            return Err(ConfigError::InvalidUrl {
                field: "RECORD_STORE_URL".to_string(),
                reason: "URL cannot carry a path".to_string(),
            });
        }
        if collection.trim().is_empty() {
            return Err(ConfigError::MissingRequired(
                "RECORD_STORE_COLLECTION".to_string(),
            ));
        }

        Ok(Self {
            client,
            base,
            collection: collection.trim().to_string(),
            token: None,
        })
    }

    /// Sends `token` as a bearer credential on every lookup.
    #[must_use]
    pub fn with_token(mut self, token: Option<SecretString>) -> Self {
        self.token = token;
        self
    }

    /// URL of the record for `user_id`, with the id percent-encoded as a
    /// single path segment.
    pub fn record_url(&self, user_id: &str) -> Result<Url, RelayError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| RelayError::store_unavailable("record store URL cannot carry a path"))?
            .pop_if_empty()
            .push(&self.collection)
            .push(user_id);
        Ok(url)
    }
}

#[async_trait]
impl RecordStore for HttpRecordStore {
    async fn exists(&self, user_id: &str) -> Result<bool, RelayError> {
        // Dot segments would be dropped from the path and address the collection
        if user_id.is_empty() || user_id == "." || user_id == ".." {
            return Ok(false);
        }

        let mut request = self.client.get(self.record_url(user_id)?);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|e| RelayError::store_unavailable(format!("record lookup failed: {e}")))?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(RelayError::store_unavailable(format!(
                "record store answered {status}"
            ))),
        }
    }
}
