//! Fuzz target for HTTP response classification
//!
//! Any status and body must classify without panicking, and the
//! retryable flag must follow the status class.
//!
//! Run with: cargo +nightly fuzz run response_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use scamguard_core::ApiErrorKind;
use scamguard_llm::{classify_response, TransportResponse};

fuzz_target!(|data: &[u8]| {
    if data.len() < 3 {
        return;
    }
    let status = 100 + u16::from_be_bytes([data[0], data[1]]) % 500;
    let Ok(body) = std::str::from_utf8(&data[3..]) else {
        return;
    };
    let content_type = if data[2] % 2 == 0 {
        "application/json"
    } else {
        "text/html"
    };
    let response = TransportResponse::new(status, body).with_header("content-type", content_type);

    if let Err(err) = classify_response(&response) {
        match status {
            401 | 403 => assert_eq!(err.kind, ApiErrorKind::Auth),
            429 => assert!(err.retryable),
            500.. => assert_eq!(err.kind, ApiErrorKind::Server),
            _ => {}
        }
    }
});
