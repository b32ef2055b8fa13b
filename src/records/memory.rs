use std::collections::HashSet;

use async_trait::async_trait;

use super::RecordStore;
use crate::error::RelayError;

/// Fixed set of known user ids.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecordStore {
    ids: HashSet<String>,
}

impl InMemoryRecordStore {
    /// Creates a store holding `ids`. Blank entries are ignored.
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids = ids
            .into_iter()
            .map(Into::into)
            .map(|id: String| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();
        Self { ids }
    }

    /// Number of known ids.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// True when no ids are known.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn exists(&self, user_id: &str) -> Result<bool, RelayError> {
        Ok(self.ids.contains(user_id))
    }
}
