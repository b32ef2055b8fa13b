//! The relay stage chain.
//!
//! Rate limiting has already run by the time a request reaches the relay.
//! Stages then run strictly in order and the first failure ends the request:
//!
//! ```text
//! RECEIVED -> RATE_CHECKED -> DECODED -> (IDENTITY_VERIFIED) -> (AUTHORIZED)
//!          -> FORWARDED -> RESPONDED
//! ```

use std::fmt;
use std::sync::Arc;

use axum::body::Body;
use axum::http::HeaderMap;
use tracing::debug;

use crate::authorization::Authorizer;
use crate::envelope::{Decoder, Envelope};
use crate::error::RelayError;
use crate::identity::{extract_bearer, CallerIdentity, IdentityVerifier};
use crate::middleware::CorrelationId;
use crate::upstream::{Forwarder, UpstreamResponse};

/// Where a request is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStage {
    /// Accepted by the listener
    Received,
    /// Admitted by every rate-limit policy
    RateChecked,
    /// Body decoded into an envelope
    Decoded,
    /// Bearer credential verified
    IdentityVerified,
    /// Caller matched and found in the record store
    Authorized,
    /// Upstream answered with 2xx
    Forwarded,
    /// Response written, success or failure
    Responded,
}

impl RequestStage {
    /// Upper-case name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "RECEIVED",
            Self::RateChecked => "RATE_CHECKED",
            Self::Decoded => "DECODED",
            Self::IdentityVerified => "IDENTITY_VERIFIED",
            Self::Authorized => "AUTHORIZED",
            Self::Forwarded => "FORWARDED",
            Self::Responded => "RESPONDED",
        }
    }
}

impl fmt::Display for RequestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Records stage transitions for one request.
#[derive(Debug)]
pub struct StageTracker {
    correlation_id: CorrelationId,
    stage: RequestStage,
    history: Vec<RequestStage>,
}

impl StageTracker {
    /// Starts at `RATE_CHECKED`: the limiter layers admitted the request.
    pub fn new(correlation_id: CorrelationId) -> Self {
        let mut tracker = Self {
            correlation_id,
            stage: RequestStage::Received,
            history: vec![RequestStage::Received],
        };
        tracker.advance(RequestStage::RateChecked);
        tracker
    }

    /// Moves to `next` and logs the transition.
    pub fn advance(&mut self, next: RequestStage) {
        debug!(
            correlation_id = %self.correlation_id,
            from = %self.stage,
            to = %next,
            "stage transition"
        );
        self.stage = next;
        self.history.push(next);
    }

    /// Marks the request finished; `error` names the failure, if any.
    pub fn respond(&mut self, error: Option<&RelayError>) {
        if let Some(err) = error {
            debug!(
                correlation_id = %self.correlation_id,
                from = %self.stage,
                to = %RequestStage::Responded,
                error_code = err.code().as_str(),
                "stage transition"
            );
            self.stage = RequestStage::Responded;
            self.history.push(RequestStage::Responded);
        } else {
            self.advance(RequestStage::Responded);
        }
    }

    /// Current stage.
    pub fn stage(&self) -> RequestStage {
        self.stage
    }

    /// Every stage visited, in order.
    pub fn history(&self) -> &[RequestStage] {
        &self.history
    }

    /// Id of the request being tracked.
    pub fn correlation_id(&self) -> CorrelationId {
        self.correlation_id
    }
}

/// Output of the admission stages.
#[derive(Debug, Clone)]
pub struct Admission {
    /// Decoded request
    pub envelope: Envelope,
    /// Present when identity verification is enabled
    pub identity: Option<CallerIdentity>,
}

/// Runs decode, identity, authorization and forwarding in order.
pub struct Relay {
    decoder: Decoder,
    verifier: Option<Arc<dyn IdentityVerifier>>,
    authorizer: Option<Authorizer>,
    forwarder: Forwarder,
}

impl Relay {
    /// A relay with identity and authorization disabled.
    pub fn new(decoder: Decoder, forwarder: Forwarder) -> Self {
        Self {
            decoder,
            verifier: None,
            authorizer: None,
            forwarder,
        }
    }

    /// Enables identity verification.
    #[must_use]
    pub fn with_verifier(mut self, verifier: Arc<dyn IdentityVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Enables authorization. Has no effect without a verifier.
    #[must_use]
    pub fn with_authorizer(mut self, authorizer: Authorizer) -> Self {
        self.authorizer = Some(authorizer);
        self
    }

    /// True when a verifier is configured.
    pub fn identity_enabled(&self) -> bool {
        self.verifier.is_some()
    }

    /// True when both the verifier and the authorizer run.
    pub fn authorization_enabled(&self) -> bool {
        self.verifier.is_some() && self.authorizer.is_some()
    }

    /// Decodes the body, then verifies and authorizes the caller when enabled.
    pub async fn admit(
        &self,
        headers: &HeaderMap,
        body: Body,
        tracker: &mut StageTracker,
    ) -> Result<Admission, RelayError> {
        let envelope = self.decoder.decode(headers, body).await?;
        tracker.advance(RequestStage::Decoded);

        let Some(verifier) = &self.verifier else {
            return Ok(Admission {
                envelope,
                identity: None,
            });
        };

        let token = extract_bearer(headers)?;
        let identity = verifier.verify(token).await?;
        tracker.advance(RequestStage::IdentityVerified);

        if let Some(authorizer) = &self.authorizer {
            authorizer.authorize(&envelope, &identity).await?;
            tracker.advance(RequestStage::Authorized);
        }

        Ok(Admission {
            envelope,
            identity: Some(identity),
        })
    }

    /// Admits the request and forwards it upstream.
    pub async fn relay(
        &self,
        headers: &HeaderMap,
        body: Body,
        tracker: &mut StageTracker,
    ) -> Result<UpstreamResponse, RelayError> {
        let admission = self.admit(headers, body, tracker).await?;
        let response = self.forwarder.forward(&admission.envelope).await?;
        tracker.advance(RequestStage::Forwarded);
        Ok(response)
    }
}
