//! Property-Based Tests
//!
//! Uses proptest for invariant verification.
//!
//! Test categories:
//! - rate_limiter: budgets are exact, isolated per key, and denials are free
//! - envelope: decoding accepts exactly the well-formed envelopes
//! - error_sanitization: internal detail never reaches callers

mod envelope;
mod error_sanitization;
mod generators;
mod rate_limiter;
