//! Authorization record lookups.
//!
//! Records are existence-only and keyed by user id. They are read, never
//! written, and no result is cached between requests.

mod http;
mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;

use crate::config::{Config, ConfigError, RecordStoreMode};
use crate::error::RelayError;

pub use self::http::HttpRecordStore;
pub use self::memory::InMemoryRecordStore;

/// Point lookup of authorization records.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// True when a record exists for `user_id`.
    ///
    /// Store failures are `RelayError::StoreUnavailable`.
    async fn exists(&self, user_id: &str) -> Result<bool, RelayError>;
}

/// Builds the store selected by `RECORD_STORE_MODE`.
pub fn store_from_config(config: &Config, client: Client) -> Result<Arc<dyn RecordStore>, ConfigError> {
    match config.record_store_mode {
        RecordStoreMode::Memory => Ok(Arc::new(InMemoryRecordStore::new(
            config.record_store_seed.iter().cloned(),
        ))),
        RecordStoreMode::Http => {
            let base = config
                .record_store_url
                .clone()
                .ok_or_else(|| ConfigError::MissingRequired("RECORD_STORE_URL".to_string()))?;
            let store = HttpRecordStore::new(client, base, &config.record_store_collection)?
                .with_token(config.record_store_token.clone());
            Ok(Arc::new(store))
        }
    }
}
