//! Shared application state.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;

use crate::authorization::Authorizer;
use crate::config::Config;
use crate::envelope::Decoder;
use crate::http::outbound_client;
use crate::identity::verifier_from_config;
use crate::observability::RelayMetrics;
use crate::rate_limiter::{
    CounterStore, InMemoryCounterStore, Quota, RateLimitPolicy, RateLimiter, RedisCounterStore,
};
use crate::records::store_from_config;
use crate::relay::Relay;
use crate::upstream::Forwarder;

/// Name of the policy covering every route except `/metrics`.
pub const GLOBAL_POLICY: &str = "global";
/// Name of the policy covering the relay routes.
pub const ROUTE_POLICY: &str = "route";

/// Everything a request needs, built once at startup.
#[derive(Clone)]
pub struct AppState {
    /// Stage chain shared by the relay routes
    pub relay: Arc<Relay>,
    /// Prometheus metrics
    pub metrics: Arc<RelayMetrics>,
    /// Policy for every route but `/metrics`
    pub global_limiter: Option<Arc<RateLimiter>>,
    /// Policy for the relay routes
    pub route_limiter: Option<Arc<RateLimiter>>,
    /// Whole-request deadline
    pub request_timeout: Duration,
}

impl AppState {
    /// Wires the relay, limiters and metrics from configuration.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let metrics = Arc::new(RelayMetrics::new().context("failed to register metrics")?);

        let client = outbound_client(config).context("failed to build HTTP client")?;

        let forwarder = Forwarder::from_config(config, client.clone())
            .with_latency_histogram(metrics.upstream_latency.clone());

        let mut relay = Relay::new(Decoder::new(config.max_body_bytes), forwarder);
        if let Some(verifier) = verifier_from_config(config, client.clone())? {
            relay = relay.with_verifier(verifier);
            if config.authorization_enabled {
                let store = store_from_config(config, client)?;
                relay = relay.with_authorizer(Authorizer::new(store));
            }
        }
        info!(
            identity = relay.identity_enabled(),
            authorization = relay.authorization_enabled(),
            payload_mode = ?config.upstream_payload_mode,
            "Relay configured"
        );

        let (global_limiter, route_limiter) = if config.rate_limit_enabled {
            let store = counter_store(config).await?;
            let limiter = |name: &str, quotas: &[Quota]| {
                (!quotas.is_empty()).then(|| {
                    Arc::new(RateLimiter::new(
                        RateLimitPolicy::new(name, quotas.to_vec()),
                        store.clone(),
                    ))
                })
            };
            (
                limiter(GLOBAL_POLICY, &config.rate_limit_global),
                limiter(ROUTE_POLICY, &config.rate_limit_route),
            )
        } else {
            (None, None)
        };

        Ok(Self::new(relay, metrics)
            .with_limiters(global_limiter, route_limiter)
            .with_request_timeout(config.request_timeout()))
    }

    /// State around `relay` with no rate limits.
    pub fn new(relay: Relay, metrics: Arc<RelayMetrics>) -> Self {
        Self {
            relay: Arc::new(relay),
            metrics,
            global_limiter: None,
            route_limiter: None,
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Installs the rate-limit policies; `None` disables one.
    #[must_use]
    pub fn with_limiters(
        mut self,
        global: Option<Arc<RateLimiter>>,
        route: Option<Arc<RateLimiter>>,
    ) -> Self {
        self.global_limiter = global;
        self.route_limiter = route;
        self
    }

    /// Sets the whole-request deadline.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

async fn counter_store(config: &Config) -> anyhow::Result<Arc<dyn CounterStore>> {
    if config.uses_redis_counters() {
        let store = RedisCounterStore::connect(config.rate_limit_storage_url.as_str())
            .await
            .context("failed to connect rate limit storage")?;
        info!("Rate limit counters stored in Redis");
        Ok(Arc::new(store))
    } else {
        info!("Rate limit counters stored in memory");
        Ok(Arc::new(InMemoryCounterStore::new()))
    }
}
