//! Fuzz target for model output parsing
//!
//! Arbitrary model text must either parse into a result within the
//! validated ranges or fail with INVALID_RESPONSE. It must never panic.
//!
//! Run with: cargo +nightly fuzz run verdict_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use scamguard_core::{ApiErrorKind, MAX_PASSAGES, MAX_PASSAGE_CHARS};
use scamguard_llm::{extract_json_block, parse_analysis};

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        let block = extract_json_block(input);
        assert!(input.contains(block));

        match parse_analysis(input) {
            Ok(result) => {
                assert!((0.0..=1.0).contains(&result.confidence));
                if let Some(passages) = &result.suspicious_passages {
                    assert!(passages.len() <= MAX_PASSAGES);
                    for passage in passages {
                        assert!(!passage.text.is_empty());
                        assert!(passage.text.chars().count() <= MAX_PASSAGE_CHARS);
                        assert!((0.0..=1.0).contains(&passage.confidence));
                    }
                }
            }
            Err(err) => {
                assert_eq!(err.kind, ApiErrorKind::InvalidResponse);
                assert!(!err.retryable);
            }
        }
    }
});
