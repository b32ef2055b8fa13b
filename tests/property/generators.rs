//! Shared proptest strategies.

use proptest::prelude::*;

/// Plausible user ids, including characters that need escaping in paths.
pub fn user_id() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_./%-]{1,32}"
}

/// Arbitrary non-empty message text.
pub fn message() -> impl Strategy<Value = String> {
    "\\PC{1,200}"
}

/// Throttling keys as the middleware builds them.
pub fn client_key() -> impl Strategy<Value = String> {
    prop_oneof![
        "[0-9a-f]{64}".prop_map(|digest| format!("key:{digest}")),
        (any::<u8>(), any::<u8>(), any::<u8>(), any::<u8>())
            .prop_map(|(a, b, c, d)| format!("ip:{a}.{b}.{c}.{d}")),
    ]
}

/// Free text that may contain anything an internal error could carry.
pub fn internal_detail() -> impl Strategy<Value = String> {
    "[a-z]{3,12} (sk-[A-Za-z0-9]{8}|shard-[0-9]{2}|10\\.0\\.[0-9]\\.[0-9])"
}
