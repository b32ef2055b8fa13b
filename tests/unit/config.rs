//! Configuration Unit Tests
//!
//! Validation and secret handling for [`Config`].

use std::time::Duration;

use relay_edge::config::{ConfigError, IdentityMode, RecordStoreMode};
use relay_edge::Config;
use secrecy::SecretString;
use url::Url;

fn jwt_config() -> Config {
    Config {
        identity_mode: IdentityMode::Jwt,
        identity_jwt_secret: Some(SecretString::from("hmac-secret-value")),
        ..Config::default()
    }
}

#[test]
fn test_debug_hides_secrets() {
    let config = Config {
        upstream_api_key: Some(SecretString::from("sk-live-123456")),
        record_store_token: Some(SecretString::from("store-token-abc")),
        ..jwt_config()
    };

    let rendered = format!("{config:?}");
    assert!(!rendered.contains("sk-live-123456"));
    assert!(!rendered.contains("hmac-secret-value"));
    assert!(!rendered.contains("store-token-abc"));
    assert!(rendered.contains("upstream_api_key_set: true"));
}

#[test]
fn test_socket_addr() {
    let config = Config {
        host: "127.0.0.1".to_string(),
        port: 9000,
        ..Config::default()
    };
    assert_eq!(config.socket_addr().unwrap().to_string(), "127.0.0.1:9000");

    let bad = Config {
        host: "not a host".to_string(),
        ..Config::default()
    };
    assert!(matches!(bad.socket_addr(), Err(ConfigError::ParseError { .. })));
}

#[test]
fn test_timeouts() {
    let config = Config {
        request_timeout_secs: 12,
        shutdown_timeout_seconds: 3,
        ..Config::default()
    };
    assert_eq!(config.request_timeout(), Duration::from_secs(12));
    assert_eq!(config.shutdown_timeout(), Duration::from_secs(3));

    let zero = Config {
        request_timeout_secs: 0,
        ..Config::default()
    };
    assert!(matches!(zero.validate(), Err(ConfigError::InvalidValue("REQUEST_TIMEOUT"))));
}

#[test]
fn test_counter_storage_schemes() {
    let redis = Config {
        rate_limit_storage_url: Url::parse("redis://127.0.0.1:6379/0").unwrap(),
        ..Config::default()
    };
    assert!(redis.validate().is_ok());
    assert!(redis.uses_redis_counters());

    let unsupported = Config {
        rate_limit_storage_url: Url::parse("memcached://127.0.0.1").unwrap(),
        ..Config::default()
    };
    assert!(matches!(
        unsupported.validate(),
        Err(ConfigError::InvalidUrl { .. })
    ));
}

#[test]
fn test_authorization_with_memory_store() {
    let config = Config {
        authorization_enabled: true,
        record_store_mode: RecordStoreMode::Memory,
        record_store_seed: vec!["alice".to_string()],
        ..jwt_config()
    };
    assert!(config.validate().is_ok());
}

#[test]
fn test_authorization_with_http_store_needs_collection() {
    let config = Config {
        authorization_enabled: true,
        record_store_url: Some(Url::parse("https://store.example/v1/documents").unwrap()),
        record_store_collection: String::new(),
        ..jwt_config()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::MissingRequired(_))
    ));
}
