//! Property-based tests for the wire vocabulary and the line scanner.
//!
//! These tests use proptest to generate random inputs and verify that
//! protocol invariants hold for all of them.

use proptest::prelude::*;
use smartatt_core::StudentId;
use smartatt_protocol::{DeviceEvent, HostCommand, LineScanner};

/// Strategy for lines that are not part of the inbound vocabulary.
fn unknown_line() -> impl Strategy<Value = String> {
    prop::string::string_regex("[ -~]{1,16}")
        .expect("Failed to create line regex strategy")
        .prop_filter("must not be a known token", |s| {
            !matches!(s.as_str(), "NG" | "CK" | "RD" | "CF")
        })
}

proptest! {
    /// Property: every student id survives the trip through the success token.
    #[test]
    fn prop_success_token_roundtrips(id in any::<u32>()) {
        let encoded = HostCommand::Success(StudentId::new(id)).encode();
        prop_assert!(encoded.starts_with('T'));
        prop_assert!(encoded.ends_with("\r\n"));

        let digits = &encoded[1..encoded.len() - 2];
        prop_assert_eq!(digits.parse::<u32>().unwrap(), id);
    }

    /// Property: nothing outside the four inbound tokens ever parses.
    #[test]
    fn prop_unknown_lines_never_parse(line in unknown_line()) {
        prop_assert!(DeviceEvent::parse(&line).is_err());
    }

    /// Property: the scanner reassembles a token stream regardless of how
    /// the bytes were chunked by the serial driver.
    #[test]
    fn prop_scanner_is_chunking_invariant(
        tokens in prop::collection::vec(
            prop_oneof![Just("NG"), Just("CK"), Just("RD"), Just("CF")],
            1..8,
        ),
        cut in 1usize..4,
    ) {
        let stream: String = tokens.iter().map(|t| format!("{t}\r\n")).collect();
        let bytes = stream.as_bytes();

        let mut scanner = LineScanner::new();
        for chunk in bytes.chunks(cut) {
            scanner.feed(chunk);
        }

        let mut seen = Vec::new();
        while let Some(line) = scanner.next_line() {
            seen.push(line);
        }
        prop_assert_eq!(seen, tokens);
    }
}
