//! Authorization: the caller may only act as themselves, and must be known.

use std::sync::Arc;

use subtle::ConstantTimeEq;
use tracing::debug;

use crate::envelope::Envelope;
use crate::error::RelayError;
use crate::identity::CallerIdentity;
use crate::records::RecordStore;

/// Checks a verified caller against the envelope's claimed `user_id`.
#[derive(Clone)]
pub struct Authorizer {
    store: Arc<dyn RecordStore>,
}

impl Authorizer {
    /// Creates an authorizer backed by `store`.
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Fails with `SubjectMismatch` when the claimed user is not the caller,
    /// then with `UnknownUser` when no record exists for them.
    pub async fn authorize(
        &self,
        envelope: &Envelope,
        identity: &CallerIdentity,
    ) -> Result<(), RelayError> {
        if !subjects_match(&envelope.user_id, &identity.subject) {
            return Err(RelayError::SubjectMismatch);
        }

        if !self.store.exists(&envelope.user_id).await? {
            return Err(RelayError::UnknownUser);
        }

        debug!(user_id = %envelope.user_id, "caller authorized");
        Ok(())
    }
}

/// Constant-time comparison. Length differences still return early.
fn subjects_match(claimed: &str, subject: &str) -> bool {
    claimed.as_bytes().ct_eq(subject.as_bytes()).into()
}
