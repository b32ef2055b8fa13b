//! Rate Limiter Tower Layer
//!
//! Applies one [`RateLimiter`] policy in front of a set of routes. Rejected
//! requests get a 429 with `Retry-After` and never reach the inner service.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Request};
use axum::response::{IntoResponse, Response};
use futures::future::BoxFuture;
use sha2::{Digest, Sha256};
use tower::{Layer, Service};
use tracing::warn;

use super::request_tracing::CorrelationId;
use crate::error::RelayError;
use crate::observability::{record_failure, RelayMetrics};
use crate::rate_limiter::{RateLimitDecision, RateLimiter};

/// Header naming the caller's API key.
pub static API_KEY_HEADER: HeaderName = HeaderName::from_static("x-api-key");
/// Limit of the tightest quota.
pub static RATE_LIMIT_LIMIT_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-limit");
/// Units left in the tightest quota.
pub static RATE_LIMIT_REMAINING_HEADER: HeaderName =
    HeaderName::from_static("x-ratelimit-remaining");

/// Throttling key: a digest of `x-api-key` when sent, else the peer address.
///
/// Raw keys never reach the counter store or the logs.
pub fn client_key<B>(req: &Request<B>) -> String {
    if let Some(api_key) = req
        .headers()
        .get(&API_KEY_HEADER)
        .filter(|value| !value.is_empty())
    {
        return format!("key:{:x}", Sha256::digest(api_key.as_bytes()));
    }

    match req.extensions().get::<ConnectInfo<SocketAddr>>() {
        Some(ConnectInfo(addr)) => format!("ip:{}", addr.ip()),
        None => "ip:unknown".to_string(),
    }
}

/// Rate limiter layer for Tower
#[derive(Clone)]
pub struct RateLimitLayer {
    limiter: Arc<RateLimiter>,
    metrics: Arc<RelayMetrics>,
}

impl RateLimitLayer {
    /// Creates a layer enforcing `limiter`.
    pub fn new(limiter: Arc<RateLimiter>, metrics: Arc<RelayMetrics>) -> Self {
        Self { limiter, metrics }
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            limiter: self.limiter.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

/// Rate limiter service wrapper
pub struct RateLimitService<S> {
    inner: S,
    limiter: Arc<RateLimiter>,
    metrics: Arc<RelayMetrics>,
}

impl<S: Clone> Clone for RateLimitService<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            limiter: self.limiter.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

impl<S> Service<Request<Body>> for RateLimitService<S>
where
    S: Service<Request<Body>, Response = Response, Error = Infallible> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let limiter = self.limiter.clone();
        let metrics = self.metrics.clone();
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let key = client_key(&req);
            let correlation_id = req
                .extensions()
                .get::<CorrelationId>()
                .map(ToString::to_string)
                .unwrap_or_default();
            let policy = limiter.policy().name.as_str();

            match limiter.check(&key).await {
                Ok(RateLimitDecision::Allowed { limit, remaining }) => {
                    let mut response = inner.call(req).await?;
                    apply_quota_headers(response.headers_mut(), limit, remaining);
                    Ok(response)
                }
                Ok(RateLimitDecision::Denied { retry_after }) => {
                    metrics.record_rate_limited(policy);
                    warn!(
                        correlation_id = %correlation_id,
                        policy,
                        client = %key,
                        retry_after_secs = retry_after.as_secs(),
                        "Rate limit exceeded"
                    );
                    Ok(RelayError::RateLimited { retry_after }.into_response())
                }
                Err(err) => {
                    record_failure(&err, &correlation_id);
                    Ok(err.into_response())
                }
            }
        })
    }
}

/// Sets the quota headers unless an inner policy already reported a
/// tighter quota.
fn apply_quota_headers(headers: &mut HeaderMap, limit: u32, remaining: u32) {
    if limit == u32::MAX {
        return;
    }

    let existing = headers
        .get(&RATE_LIMIT_REMAINING_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u32>().ok());
    if existing.is_some_and(|existing| existing <= remaining) {
        return;
    }

    headers.insert(RATE_LIMIT_LIMIT_HEADER.clone(), HeaderValue::from(limit));
    headers.insert(RATE_LIMIT_REMAINING_HEADER.clone(), HeaderValue::from(remaining));
}
