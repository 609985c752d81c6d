//! Property-based tests for the telemetry line and command codec.
//!
//! Ensures the format round-trips as text and the decoders never panic.

use proptest::prelude::*;
use telem_protocol::{
    decode_axis_payload, decode_command, decode_override_payload, decode_wire_line, encode_array,
    encode_line, Snapshot,
};

fn key_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9_]{0,15}"
}

fn value_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "-?[0-9]{1,6}\\.[0-9]{3}",
        "[A-Za-z0-9 _.-]{0,24}",
        proptest::collection::vec(-1.0e4f64..1.0e4, 0..8).prop_map(|v| encode_array(&v, 1.0, None)),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// Every encoded key/value pair is recovered verbatim.
    #[test]
    fn prop_wire_line_round_trip(
        entries in proptest::collection::btree_map(key_strategy(), value_strategy(), 1..40)
    ) {
        let snap: Snapshot = entries;
        let decoded = decode_wire_line(&encode_line(&snap));
        prop_assert_eq!(decoded, snap);
    }

    /// Fixed arity always yields exactly `n` entries.
    #[test]
    fn prop_fixed_arity_is_exact(
        values in proptest::collection::vec(-1.0e5f64..1.0e5, 0..16),
        n in 1usize..12,
    ) {
        let encoded = encode_array(&values, 1.0, Some(n));
        prop_assert_eq!(encoded.split('~').count(), n);
    }

    /// A trimmed array never ends in a zero entry.
    #[test]
    fn prop_trimmed_array_has_no_zero_tail(
        values in proptest::collection::vec(prop_oneof![Just(0.0f64), -10.0f64..10.0], 0..16)
    ) {
        let encoded = encode_array(&values, 1.0, None);
        if !encoded.is_empty() {
            prop_assert!(encoded.split('~').last() != Some("0.000"));
        }
    }

    /// Arbitrary command datagrams must never cause a panic.
    #[test]
    fn prop_command_decoding_never_panics(datagram in ".{0,128}") {
        let msg = decode_command(&datagram);
        let _ = decode_axis_payload(&msg.payload);
        let _ = decode_override_payload(&msg.payload);
    }
}
