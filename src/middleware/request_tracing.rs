//! Request Tracing Tower Layer
//!
//! Assigns every request a correlation id, runs it inside a request span and
//! echoes the id back in the `X-Request-Id` response header. Every response,
//! including those produced by the rate limit and timeout layers, is counted
//! in the request metrics under its matched route.

use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::body::Body;
use axum::extract::{FromRequestParts, MatchedPath};
use axum::http::request::Parts;
use axum::http::{HeaderName, HeaderValue, Request};
use axum::response::Response;
use futures::future::BoxFuture;
use tower::{Layer, Service};
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::observability::RelayMetrics;

/// Route label for requests that matched no route.
pub const UNMATCHED_ROUTE: &str = "unmatched";

/// Response header carrying the correlation id.
pub static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Per-request correlation id, stored as a request extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CorrelationId(pub Uuid);

impl CorrelationId {
    /// A fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl<S: Send + Sync> FromRequestParts<S> for CorrelationId {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<CorrelationId>()
            .copied()
            .unwrap_or_default())
    }
}

/// Layer producing [`RequestTracingService`].
#[derive(Clone)]
pub struct RequestTracingLayer {
    metrics: Arc<RelayMetrics>,
}

impl RequestTracingLayer {
    /// Creates a request tracing layer recording into `metrics`.
    pub fn new(metrics: Arc<RelayMetrics>) -> Self {
        Self { metrics }
    }
}

impl<S> Layer<S> for RequestTracingLayer {
    type Service = RequestTracingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestTracingService {
            inner,
            metrics: self.metrics.clone(),
        }
    }
}

/// Request tracing service wrapper
#[derive(Clone)]
pub struct RequestTracingService<S> {
    inner: S,
    metrics: Arc<RelayMetrics>,
}

impl<S> Service<Request<Body>> for RequestTracingService<S>
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

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let correlation_id = CorrelationId::new();
        req.extensions_mut().insert(correlation_id);

        let route = req
            .extensions()
            .get::<MatchedPath>()
            .map_or(UNMATCHED_ROUTE, MatchedPath::as_str)
            .to_string();
        let metrics = self.metrics.clone();

        let span = info_span!(
            "request",
            correlation_id = %correlation_id,
            method = %req.method(),
            path = %req.uri().path(),
        );

        // The readied service handles this call; a fresh clone waits for the next one
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(
            async move {
                let started = Instant::now();
                let mut response = inner.call(req).await?;

                if let Ok(value) = HeaderValue::from_str(&correlation_id.to_string()) {
                    response
                        .headers_mut()
                        .insert(REQUEST_ID_HEADER.clone(), value);
                }

                let elapsed = started.elapsed();
                metrics.record_response(&route, response.status(), elapsed.as_secs_f64());
                info!(
                    status = response.status().as_u16(),
                    latency_ms = elapsed.as_millis() as u64,
                    "Request completed"
                );

                Ok(response)
            }
            .instrument(span),
        )
    }
}
