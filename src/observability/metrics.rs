//! Relay Prometheus metrics.

use axum::http::StatusCode;
use prometheus::{
    CounterVec, Encoder, Histogram, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};

const NAMESPACE: &str = "relay";

/// Metrics owned by one application instance.
pub struct RelayMetrics {
    registry: Registry,
    /// Requests by route and outcome
    pub requests: CounterVec,
    /// Request latency by route
    pub request_latency: HistogramVec,
    /// Rejections by rate-limit policy
    pub rate_limited: CounterVec,
    /// Upstream call latency
    pub upstream_latency: Histogram,
}

impl RelayMetrics {
    /// Creates the metrics in a fresh registry.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests = CounterVec::new(
            Opts::new("requests_total", "Total requests").namespace(NAMESPACE),
            &["route", "outcome"],
        )?;
        registry.register(Box::new(requests.clone()))?;

        let request_latency = HistogramVec::new(
            HistogramOpts::new("request_latency_seconds", "Request latency in seconds")
                .namespace(NAMESPACE)
                .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
            &["route"],
        )?;
        registry.register(Box::new(request_latency.clone()))?;

        let rate_limited = CounterVec::new(
            Opts::new("rate_limited_total", "Requests rejected by rate limiting")
                .namespace(NAMESPACE),
            &["policy"],
        )?;
        registry.register(Box::new(rate_limited.clone()))?;

        let upstream_latency = Histogram::with_opts(
            HistogramOpts::new("upstream_latency_seconds", "Upstream call latency in seconds")
                .namespace(NAMESPACE)
                .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        )?;
        registry.register(Box::new(upstream_latency.clone()))?;

        Ok(Self {
            registry,
            requests,
            request_latency,
            rate_limited,
            upstream_latency,
        })
    }

    /// Records a finished request.
    pub fn record_request(&self, route: &str, outcome: &str, seconds: f64) {
        self.requests.with_label_values(&[route, outcome]).inc();
        self.request_latency
            .with_label_values(&[route])
            .observe(seconds);
    }

    /// Records a finished request, classifying its outcome by `status`.
    pub fn record_response(&self, route: &str, status: StatusCode, seconds: f64) {
        self.record_request(route, outcome(status), seconds);
    }

    /// Records a rate-limit rejection.
    pub fn record_rate_limited(&self, policy: &str) {
        self.rate_limited.with_label_values(&[policy]).inc();
    }

    /// Prometheus text exposition of every metric.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// `success` for 2xx/3xx, `rejected` for 4xx, `error` otherwise.
pub fn outcome(status: StatusCode) -> &'static str {
    if status.is_client_error() {
        "rejected"
    } else if status.is_server_error() {
        "error"
    } else {
        "success"
    }
}
