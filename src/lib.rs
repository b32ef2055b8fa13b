//! Relay Edge Service - authenticated, rate-limited relay to a completion API.
//!
//! Callers `POST /api` a JSON envelope. The service throttles by API key or
//! peer address, decodes the body, optionally verifies a bearer credential
//! and checks the caller against a record store, then forwards the payload
//! upstream and relays the answer verbatim.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod authorization;
pub mod config;
pub mod envelope;
pub mod error;
pub mod handlers;
pub mod http;
pub mod identity;
pub mod middleware;
pub mod observability;
pub mod rate_limiter;
pub mod records;
pub mod relay;
pub mod server;
pub mod shutdown;
pub mod state;
pub mod upstream;

pub use config::Config;
pub use envelope::{Decoder, Envelope};
pub use error::{ErrorCode, ErrorResponse, RelayError};
pub use relay::{Relay, RequestStage};
pub use server::{create_router, serve, start_server};
pub use state::AppState;
