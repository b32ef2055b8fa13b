//! Envelope Property Tests
//!
//! Decoding accepts every well-formed envelope and preserves it exactly.

use proptest::prelude::*;
use relay_edge::error::RelayError;
use relay_edge::Decoder;
use serde_json::{json, Value};

use super::generators::{message, user_id};

fn decode(body: &[u8]) -> Result<relay_edge::Envelope, RelayError> {
    Decoder::default().decode_bytes(Some(body.len()), body)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: well-formed envelopes decode and keep every key
    #[test]
    fn prop_well_formed_envelopes_decode(
        user_id in user_id(),
        message in message(),
        kind in proptest::option::of("[a-z]{1,12}"),
        extra in proptest::collection::btree_map("x_[a-z]{1,8}", any::<i64>(), 0..4),
    ) {
        let mut value = json!({"user_id": user_id, "message": message});
        if let Some(kind) = &kind {
            value["type"] = Value::from(kind.as_str());
        }
        for (key, number) in &extra {
            value[key.as_str()] = Value::from(*number);
        }

        let envelope = decode(value.to_string().as_bytes()).unwrap();
        prop_assert_eq!(&envelope.user_id, &user_id);
        prop_assert_eq!(&envelope.message, &message);
        prop_assert_eq!(envelope.kind.as_deref(), kind.as_deref());
        prop_assert_eq!(envelope.to_value(), value);
    }

    /// Property: arbitrary bytes never panic and never decode without both fields
    #[test]
    fn prop_arbitrary_bytes_are_handled(body in proptest::collection::vec(any::<u8>(), 1..256)) {
        if let Ok(envelope) = decode(&body) {
            prop_assert!(!envelope.user_id.is_empty());
            prop_assert!(!envelope.message.is_empty());
        }
    }

    /// Property: a declared length that disagrees with the body is rejected
    #[test]
    fn prop_length_mismatch_rejected(user_id in user_id(), delta in 1usize..16) {
        let body = json!({"user_id": user_id, "message": "hi"}).to_string();
        let result = Decoder::default().decode_bytes(Some(body.len() + delta), body.as_bytes());
        let rejected = matches!(result, Err(RelayError::Decode { .. }));
        prop_assert!(rejected, "expected decode error, got {:?}", result);
    }
}
