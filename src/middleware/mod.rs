//! Tower Middleware Stack
//!
//! Cross-cutting layers applied around the relay routes.

pub mod rate_limit;
pub mod request_tracing;

pub use rate_limit::{client_key, RateLimitLayer, RateLimitService};
pub use request_tracing::{CorrelationId, RequestTracingLayer, RequestTracingService, REQUEST_ID_HEADER};
