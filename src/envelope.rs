//! Request envelope and decoder.
//!
//! The envelope is the JSON object a caller posts: `user_id` and `message`
//! are required non-empty strings, `type` is an optional string, and any
//! other keys are kept so the object can be forwarded unchanged.

use axum::body::Body;
use axum::http::{header, HeaderMap};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::RelayError;

/// Default cap on request bodies.
pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024;

/// A decoded request.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Claimed caller id
    pub user_id: String,
    /// Prompt text
    pub message: String,
    /// Optional request kind (`type` on the wire)
    pub kind: Option<String>,
    raw: Map<String, Value>,
}

impl Envelope {
    /// Validates a parsed JSON value as an envelope.
    pub fn from_value(value: Value) -> Result<Self, RelayError> {
        let Value::Object(raw) = value else {
            return Err(RelayError::decode("top-level JSON value is not an object"));
        };

        let user_id = required_string(&raw, "user_id")?;
        let message = required_string(&raw, "message")?;
        let kind = match raw.get("type") {
            None | Some(Value::Null) => None,
            Some(Value::String(kind)) => Some(kind.clone()),
            Some(_) => return Err(RelayError::decode("field 'type' is not a string")),
        };

        Ok(Self {
            user_id,
            message,
            kind,
            raw,
        })
    }

    /// The original object, including unknown keys.
    pub fn raw(&self) -> &Map<String, Value> {
        &self.raw
    }

    /// The original object as a JSON value.
    pub fn to_value(&self) -> Value {
        Value::Object(self.raw.clone())
    }
}

impl Serialize for Envelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.raw.serialize(serializer)
    }
}

fn required_string(raw: &Map<String, Value>, field: &'static str) -> Result<String, RelayError> {
    match raw.get(field) {
        Some(Value::String(value)) if !value.is_empty() => Ok(value.clone()),
        _ => Err(RelayError::MissingField { field }),
    }
}

/// Turns a request body into an [`Envelope`].
#[derive(Debug, Clone, Copy)]
pub struct Decoder {
    max_body_bytes: usize,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BODY_BYTES)
    }
}

impl Decoder {
    /// Creates a decoder accepting bodies up to `max_body_bytes`.
    pub fn new(max_body_bytes: usize) -> Self {
        Self { max_body_bytes }
    }

    /// Reads and decodes a request body.
    ///
    /// The declared `Content-Length` is checked before anything is buffered,
    /// and buffering stops at the configured maximum.
    pub async fn decode(&self, headers: &HeaderMap, body: Body) -> Result<Envelope, RelayError> {
        let declared = declared_length(headers)?;
        self.check_declared(declared)?;

        let bytes = axum::body::to_bytes(body, self.max_body_bytes)
            .await
            .map_err(|e| RelayError::decode(format!("failed to read body: {e}")))?;

        self.decode_bytes(declared, &bytes)
    }

    /// Decodes an already-buffered body against its declared length.
    pub fn decode_bytes(&self, declared: Option<usize>, body: &[u8]) -> Result<Envelope, RelayError> {
        let declared = self.check_declared(declared)?;

        if body.len() != declared {
            return Err(RelayError::decode(format!(
                "body is {} bytes but content length is {declared}",
                body.len()
            )));
        }

        let value: Value = serde_json::from_slice(body)
            .map_err(|e| RelayError::decode(format!("body is not JSON: {e}")))?;

        Envelope::from_value(value)
    }

    fn check_declared(&self, declared: Option<usize>) -> Result<usize, RelayError> {
        match declared {
            None | Some(0) => Err(RelayError::decode("missing or zero content length")),
            Some(n) if n > self.max_body_bytes => Err(RelayError::decode(format!(
                "content length {n} exceeds limit of {}",
                self.max_body_bytes
            ))),
            Some(n) => Ok(n),
        }
    }
}

/// Parses the `Content-Length` header, if present.
fn declared_length(headers: &HeaderMap) -> Result<Option<usize>, RelayError> {
    headers
        .get(header::CONTENT_LENGTH)
        .map(|value| {
            value
                .to_str()
                .ok()
                .and_then(|v| v.trim().parse::<usize>().ok())
                .ok_or_else(|| RelayError::decode("content length is not a number"))
        })
        .transpose()
}
