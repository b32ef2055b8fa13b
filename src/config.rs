//! Type-Safe Configuration with Validation
//!
//! Provides type-safe configuration with URL validation and environment variable support.

use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use crate::rate_limiter::{parse_quotas, Quota};

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid URL format
    #[error("Invalid URL for {field}: {reason}")]
    InvalidUrl {
        /// Variable holding the URL
        field: String,
        /// Parser message
        reason: String,
    },

    /// Invalid port number
    #[error("Invalid port: must be between 1 and 65535")]
    InvalidPort,

    /// Invalid duration or size value
    #[error("Invalid value for {0}: must be greater than 0")]
    InvalidValue(&'static str),

    /// Missing required field
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    /// Settings that cannot be combined
    #[error("Conflicting configuration: {0}")]
    Conflict(String),

    /// Environment variable parse error
    #[error("Failed to parse environment variable {name}: {reason}")]
    ParseError {
        /// Variable name
        name: String,
        /// Parser message
        reason: String,
    },

    /// Key file could not be read
    #[error("Failed to read {name}: {reason}")]
    Io {
        /// Variable naming the file
        name: String,
        /// I/O error message
        reason: String,
    },
}

/// How the forwarded body is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadMode {
    /// Forward the caller's JSON object unchanged
    Passthrough,
    /// Build a chat-completions body from `message`
    Prompt,
}

/// Which identity verifier runs, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityMode {
    /// No identity stage
    Disabled,
    /// Local JWT validation
    Jwt,
    /// Delegate to the identity service over HTTP
    Remote,
}

/// Which record store backs the authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStoreMode {
    /// Document store REST API
    Http,
    /// Fixed, seeded set of user ids
    Memory,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line
    Json,
    /// Human-readable output for development
    Pretty,
}

macro_rules! impl_mode_from_str {
    ($ty:ty, $($text:literal => $variant:expr),+ $(,)?) => {
        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok($variant),)+
                    other => Err(format!("unknown value '{other}'")),
                }
            }
        }
    };
}

impl_mode_from_str!(PayloadMode, "passthrough" => PayloadMode::Passthrough, "prompt" => PayloadMode::Prompt);
impl_mode_from_str!(
    IdentityMode,
    "disabled" => IdentityMode::Disabled,
    "none" => IdentityMode::Disabled,
    "jwt" => IdentityMode::Jwt,
    "remote" => IdentityMode::Remote,
);
impl_mode_from_str!(RecordStoreMode, "http" => RecordStoreMode::Http, "memory" => RecordStoreMode::Memory);
impl_mode_from_str!(LogFormat, "json" => LogFormat::Json, "pretty" => LogFormat::Pretty);

/// Service configuration with validation.
#[derive(Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port (1-65535)
    pub port: u16,
    /// Whole-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
    /// Largest accepted request body
    pub max_body_bytes: usize,

    /// Completion service endpoint
    pub upstream_url: Url,
    /// Bearer credential for the completion service
    pub upstream_api_key: Option<SecretString>,
    /// Model named in derived prompt payloads
    pub upstream_model: String,
    /// How the forwarded body is built
    pub upstream_payload_mode: PayloadMode,

    /// Identity verification mode
    pub identity_mode: IdentityMode,
    /// Identity service endpoint (remote mode)
    pub identity_service_url: Option<Url>,
    /// HMAC secret (jwt mode)
    pub identity_jwt_secret: Option<SecretString>,
    /// RSA public key PEM (jwt mode)
    pub identity_jwt_public_key: Option<String>,
    /// Required issuer, if any
    pub identity_jwt_issuer: Option<String>,
    /// Required audience, if any
    pub identity_jwt_audience: Option<String>,

    /// Run the subject and record checks
    pub authorization_enabled: bool,
    /// Record store backend
    pub record_store_mode: RecordStoreMode,
    /// Document store base URL (http mode)
    pub record_store_url: Option<Url>,
    /// Collection holding user records
    pub record_store_collection: String,
    /// Bearer credential for the document store
    pub record_store_token: Option<SecretString>,
    /// User ids known to the in-memory store
    pub record_store_seed: Vec<String>,

    /// Apply rate limiting
    pub rate_limit_enabled: bool,
    /// Quotas applied to every route
    pub rate_limit_global: Vec<Quota>,
    /// Quotas applied to relay routes
    pub rate_limit_route: Vec<Quota>,
    /// Counter backend: `memory://` or `redis://...`
    pub rate_limit_storage_url: Url,

    /// Log output format
    pub log_format: LogFormat,
    /// Default tracing filter when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout_secs: 30,
            shutdown_timeout_seconds: 30,
            max_body_bytes: 64 * 1024,
            upstream_url: Url::parse(DEFAULT_UPSTREAM_URL).expect("default upstream URL is valid"),
            upstream_api_key: None,
            upstream_model: "gpt-4o-mini".to_string(),
            upstream_payload_mode: PayloadMode::Passthrough,
            identity_mode: IdentityMode::Disabled,
            identity_service_url: None,
            identity_jwt_secret: None,
            identity_jwt_public_key: None,
            identity_jwt_issuer: None,
            identity_jwt_audience: None,
            authorization_enabled: false,
            record_store_mode: RecordStoreMode::Http,
            record_store_url: None,
            record_store_collection: "users".to_string(),
            record_store_token: None,
            record_store_seed: Vec::new(),
            rate_limit_enabled: true,
            rate_limit_global: vec![Quota::per_day(200), Quota::per_hour(50)],
            rate_limit_route: vec![Quota::per_day(100), Quota::per_hour(20)],
            rate_limit_storage_url: Url::parse("memory://").expect("memory URL is valid"),
            log_format: LogFormat::Json,
            log_filter: "info".to_string(),
        }
    }
}

const DEFAULT_UPSTREAM_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_GLOBAL_QUOTAS: &str = "200/day;50/hour";
const DEFAULT_ROUTE_QUOTAS: &str = "100/day;20/hour";

impl Config {
    /// Loads configuration from environment variables with validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let config = Self {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: parse_env("PORT", defaults.port)?,
            request_timeout_secs: parse_env("REQUEST_TIMEOUT", defaults.request_timeout_secs)?,
            shutdown_timeout_seconds: parse_env(
                "SHUTDOWN_TIMEOUT",
                defaults.shutdown_timeout_seconds,
            )?,
            max_body_bytes: parse_env("MAX_BODY_BYTES", defaults.max_body_bytes)?,
            upstream_url: parse_url_env("UPSTREAM_URL", DEFAULT_UPSTREAM_URL)?,
            upstream_api_key: secret_env("UPSTREAM_API_KEY"),
            upstream_model: env::var("UPSTREAM_MODEL").unwrap_or(defaults.upstream_model),
            upstream_payload_mode: parse_env(
                "UPSTREAM_PAYLOAD_MODE",
                defaults.upstream_payload_mode,
            )?,
            identity_mode: parse_env("IDENTITY_MODE", defaults.identity_mode)?,
            identity_service_url: parse_optional_url_env("IDENTITY_SERVICE_URL")?,
            identity_jwt_secret: secret_env("IDENTITY_JWT_SECRET"),
            identity_jwt_public_key: read_pem_env("IDENTITY_JWT_PUBLIC_KEY")?,
            identity_jwt_issuer: optional_env("IDENTITY_JWT_ISSUER"),
            identity_jwt_audience: optional_env("IDENTITY_JWT_AUDIENCE"),
            authorization_enabled: parse_env(
                "AUTHORIZATION_ENABLED",
                defaults.authorization_enabled,
            )?,
            record_store_mode: parse_env("RECORD_STORE_MODE", defaults.record_store_mode)?,
            record_store_url: parse_optional_url_env("RECORD_STORE_URL")?,
            record_store_collection: env::var("RECORD_STORE_COLLECTION")
                .unwrap_or(defaults.record_store_collection),
            record_store_token: secret_env("RECORD_STORE_TOKEN"),
            record_store_seed: parse_list_env("RECORD_STORE_SEED"),
            rate_limit_enabled: parse_env("RATE_LIMIT_ENABLED", defaults.rate_limit_enabled)?,
            rate_limit_global: parse_quota_env("RATE_LIMIT_GLOBAL", DEFAULT_GLOBAL_QUOTAS)?,
            rate_limit_route: parse_quota_env("RATE_LIMIT_ROUTE", DEFAULT_ROUTE_QUOTAS)?,
            rate_limit_storage_url: parse_url_env("RATE_LIMIT_STORAGE_URL", "memory://")?,
            log_format: parse_env("LOG_FORMAT", defaults.log_format)?,
            log_filter: env::var("RUST_LOG").unwrap_or(defaults.log_filter),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue("REQUEST_TIMEOUT"));
        }
        if self.max_body_bytes == 0 {
            return Err(ConfigError::InvalidValue("MAX_BODY_BYTES"));
        }

        match self.identity_mode {
            IdentityMode::Jwt
                if self.identity_jwt_secret.is_none() && self.identity_jwt_public_key.is_none() =>
            {
                return Err(ConfigError::MissingRequired(
                    "IDENTITY_JWT_SECRET or IDENTITY_JWT_PUBLIC_KEY".to_string(),
                ));
            }
            IdentityMode::Remote if self.identity_service_url.is_none() => {
                return Err(ConfigError::MissingRequired(
                    "IDENTITY_SERVICE_URL".to_string(),
                ));
            }
            _ => {}
        }

        if self.authorization_enabled {
            if self.identity_mode == IdentityMode::Disabled {
                return Err(ConfigError::Conflict(
                    "AUTHORIZATION_ENABLED requires IDENTITY_MODE other than disabled"
                        .to_string(),
                ));
            }
            if self.record_store_mode == RecordStoreMode::Http && self.record_store_url.is_none()
            {
                return Err(ConfigError::MissingRequired("RECORD_STORE_URL".to_string()));
            }
            if self.record_store_collection.is_empty() {
                return Err(ConfigError::MissingRequired(
                    "RECORD_STORE_COLLECTION".to_string(),
                ));
            }
        }

        match self.rate_limit_storage_url.scheme() {
            "memory" | "redis" | "rediss" => {}
            other => {
                return Err(ConfigError::InvalidUrl {
                    field: "RATE_LIMIT_STORAGE_URL".to_string(),
                    reason: format!("unsupported scheme '{other}'"),
                });
            }
        }

        Ok(())
    }

    /// Parse server socket address from host and port configuration.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::ParseError {
                name: "HOST".to_string(),
                reason: e.to_string(),
            })
    }

    /// Whole-request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Graceful shutdown timeout.
    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }

    /// True when counters live in Redis rather than process memory.
    #[must_use]
    pub fn uses_redis_counters(&self) -> bool {
        self.rate_limit_storage_url.scheme().starts_with("redis")
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Secrets are reported by presence only
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("upstream_url", &self.upstream_url.as_str())
            .field("upstream_api_key_set", &self.upstream_api_key.is_some())
            .field("upstream_model", &self.upstream_model)
            .field("upstream_payload_mode", &self.upstream_payload_mode)
            .field("identity_mode", &self.identity_mode)
            .field("authorization_enabled", &self.authorization_enabled)
            .field("record_store_mode", &self.record_store_mode)
            .field("rate_limit_enabled", &self.rate_limit_enabled)
            .field("rate_limit_global", &self.rate_limit_global)
            .field("rate_limit_route", &self.rate_limit_route)
            .field("rate_limit_storage", &self.rate_limit_storage_url.scheme())
            .field("log_format", &self.log_format)
            .finish_non_exhaustive()
    }
}

/// Parse an environment variable with a default value.
fn parse_env<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: fmt::Display,
{
    match env::var(name) {
        Ok(val) => val.trim().parse().map_err(|e: T::Err| ConfigError::ParseError {
            name: name.to_string(),
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

/// Parse a URL environment variable with a default value.
fn parse_url_env(name: &str, default: &str) -> Result<Url, ConfigError> {
    let url_str = env::var(name).unwrap_or_else(|_| default.to_string());
    parse_url(name, &url_str)
}

/// Parse an optional URL environment variable.
fn parse_optional_url_env(name: &str) -> Result<Option<Url>, ConfigError> {
    optional_env(name).map(|v| parse_url(name, &v)).transpose()
}

fn parse_url(name: &str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|e| ConfigError::InvalidUrl {
        field: name.to_string(),
        reason: e.to_string(),
    })
}

/// Reads a variable, treating empty values as unset.
fn optional_env(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn secret_env(name: &str) -> Option<SecretString> {
    optional_env(name).map(SecretString::from)
}

/// Parse a comma-separated list environment variable.
fn parse_list_env(name: &str) -> Vec<String> {
    env::var(name)
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn parse_quota_env(name: &str, default: &str) -> Result<Vec<Quota>, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    parse_quotas(&raw).map_err(|e| ConfigError::ParseError {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

/// Reads a PEM either inline or from the file the variable points at.
fn read_pem_env(name: &str) -> Result<Option<String>, ConfigError> {
    let Some(value) = optional_env(name) else {
        return Ok(None);
    };
    if value.starts_with("-----BEGIN") {
        return Ok(Some(value.replace("\\n", "\n")));
    }
    std::fs::read_to_string(&value)
        .map(Some)
        .map_err(|e| ConfigError::Io {
            name: name.to_string(),
            reason: e.to_string(),
        })
}
