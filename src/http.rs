//! Shared outbound HTTP client.
//!
//! The identity service, the record store and the upstream completion API
//! are all reached through one pooled `reqwest` client whose deadlines are
//! derived from the relay's request timeout.

use std::time::Duration;

use reqwest::{Client, ClientBuilder};

use crate::config::Config;

/// User agent sent on every outbound call.
pub const USER_AGENT: &str = concat!("relay-edge/", env!("CARGO_PKG_VERSION"));

const MAX_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);
const POOL_MAX_IDLE_PER_HOST: usize = 10;

/// Connect deadline for a given request deadline: never longer than the
/// request itself, and at most ten seconds.
pub fn connect_timeout(request_timeout: Duration) -> Duration {
    request_timeout.min(MAX_CONNECT_TIMEOUT)
}

/// Builds the outbound client for `config`.
///
/// No outbound call may outlive the inbound request that caused it, so the
/// whole-call timeout equals `REQUEST_TIMEOUT`.
///
/// # Errors
///
/// Returns an error if the client cannot be built (e.g., TLS initialization fails).
pub fn outbound_client(config: &Config) -> Result<Client, reqwest::Error> {
    let request_timeout = config.request_timeout();
    ClientBuilder::new()
        .timeout(request_timeout)
        .connect_timeout(connect_timeout(request_timeout))
        .pool_idle_timeout(POOL_IDLE_TIMEOUT)
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .user_agent(USER_AGENT)
        .use_rustls_tls()
        .build()
}
