//! Upstream completion forwarder.

use axum::body::Bytes;
use prometheus::Histogram;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use url::Url;

use crate::config::{Config, PayloadMode};
use crate::envelope::Envelope;
use crate::error::RelayError;

/// A successful upstream answer, relayed to the caller unmodified.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    /// Upstream HTTP status (always 2xx)
    pub status: u16,
    /// Raw upstream body
    pub body: Bytes,
}

/// Sends one POST per envelope to the completion API.
#[derive(Clone)]
pub struct Forwarder {
    client: Client,
    url: Url,
    api_key: Option<SecretString>,
    model: String,
    mode: PayloadMode,
    latency: Option<Histogram>,
}

impl Forwarder {
    /// Creates a forwarder posting to `url`.
    pub fn new(client: Client, url: Url) -> Self {
        Self {
            client,
            url,
            api_key: None,
            model: String::new(),
            mode: PayloadMode::Passthrough,
            latency: None,
        }
    }

    /// Builds the forwarder described by the upstream settings.
    pub fn from_config(config: &Config, client: Client) -> Self {
        Self::new(client, config.upstream_url.clone())
            .with_api_key(config.upstream_api_key.clone())
            .with_payload_mode(config.upstream_payload_mode, &config.upstream_model)
    }

    /// Bearer credential for the completion API.
    #[must_use]
    pub fn with_api_key(mut self, api_key: Option<SecretString>) -> Self {
        self.api_key = api_key;
        self
    }

    /// How the forwarded body is built, and the model named in prompts.
    #[must_use]
    pub fn with_payload_mode(mut self, mode: PayloadMode, model: &str) -> Self {
        self.mode = mode;
        self.model = model.to_string();
        self
    }

    /// Records call latency into `histogram`.
    #[must_use]
    pub fn with_latency_histogram(mut self, histogram: Histogram) -> Self {
        self.latency = Some(histogram);
        self
    }

    /// Body sent upstream for `envelope`.
    pub fn payload(&self, envelope: &Envelope) -> Value {
        match self.mode {
            PayloadMode::Passthrough => envelope.to_value(),
            PayloadMode::Prompt => json!({
                "model": self.model,
                "messages": [{"role": "user", "content": envelope.message}],
            }),
        }
    }

    /// Forwards `envelope`. Without an API key nothing is sent.
    pub async fn forward(&self, envelope: &Envelope) -> Result<UpstreamResponse, RelayError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| RelayError::Configuration("UPSTREAM_API_KEY is not set".to_string()))?;

        let _timer = self.latency.as_ref().map(Histogram::start_timer);

        let response = self
            .client
            .post(self.url.clone())
            .bearer_auth(api_key.expose_secret())
            .json(&self.payload(envelope))
            .send()
            .await
            .map_err(|e| RelayError::upstream(None, &e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| RelayError::upstream(Some(status.as_u16()), &e.to_string()))?;

        if !status.is_success() {
            return Err(RelayError::upstream(
                Some(status.as_u16()),
                &String::from_utf8_lossy(&body),
            ));
        }

        Ok(UpstreamResponse {
            status: status.as_u16(),
            body,
        })
    }
}
