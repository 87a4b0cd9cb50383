//! Error classification
//!
//! Maps raw transport outcomes onto `ApiError`. Pure: no I/O, no clocks
//! except where a caller passes `now`.

use crate::providers::openai::types::ErrorBody;
use crate::providers::{ChatCompletionResponse, CompletionEnvelope};
use crate::transport::{TransportFailure, TransportResponse};
use chrono::{DateTime, Utc};
use scamguard_core::{truncate_chars, ApiError};
use std::time::Duration;

/// Longest slice of a raw error body copied into an error message.
const MAX_ERROR_BODY_CHARS: usize = 300;

// ============================================================================
// TRANSPORT OUTCOMES
// ============================================================================

/// Classify a failure raised before any response arrived.
pub fn classify_failure(failure: &TransportFailure) -> ApiError {
    match failure {
        TransportFailure::Timeout => ApiError::timeout("request timed out"),
        TransportFailure::Network(reason) => ApiError::network(reason.clone()),
    }
}

/// Classify a response and, when it is a usable completion, return its text.
pub fn classify_response(response: &TransportResponse) -> Result<String, ApiError> {
    classify_response_at(response, Utc::now())
}

/// Same as [`classify_response`] with an explicit clock for `Retry-After` dates.
pub fn classify_response_at(
    response: &TransportResponse,
    now: DateTime<Utc>,
) -> Result<String, ApiError> {
    if !response.is_success() {
        return Err(classify_status(response, now));
    }

    let is_json = response
        .content_type()
        .is_some_and(|ct| ct.to_ascii_lowercase().contains("json"));
    if !is_json && looks_like_html(&response.body) {
        return Err(ApiError::invalid_response(
            "endpoint returned an HTML page instead of JSON; check the API endpoint URL",
        )
        .with_status(response.status));
    }

    let parsed: ChatCompletionResponse = serde_json::from_str(&response.body).map_err(|e| {
        ApiError::invalid_response(format!("completion body is not valid JSON: {}", e))
            .with_status(response.status)
    })?;

    match CompletionEnvelope::from_response(parsed) {
        CompletionEnvelope::Success { content, .. } => Ok(content),
        CompletionEnvelope::ReasoningOnly => Err(ApiError::invalid_response(
            "model returned reasoning output without an answer; choose a non-reasoning model",
        )),
        CompletionEnvelope::Truncated => Err(ApiError::invalid_response(
            "response truncated by the token limit before any content; raise max_tokens",
        )),
        CompletionEnvelope::MissingContent => Err(ApiError::invalid_response(
            "completion did not contain message content",
        )),
    }
}

/// Classify a non-2xx response by status code.
pub fn classify_status(response: &TransportResponse, now: DateTime<Utc>) -> ApiError {
    let status = response.status;
    let message = error_message(status, &response.body);
    match status {
        429 => {
            let retry_after = response
                .header("retry-after")
                .and_then(|value| parse_retry_after(value, now));
            ApiError::rate_limited(retry_after, message).with_status(status)
        }
        401 | 403 => ApiError::auth(status, message),
        s if s >= 500 => ApiError::server(s, message),
        s => ApiError::unknown(s, message),
    }
}

// ============================================================================
// HELPERS
// ============================================================================

/// Parse a `Retry-After` value: delta seconds or an HTTP date.
///
/// A date at or before `now` yields no hint.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<f64>() {
        return Duration::try_from_secs_f64(seconds).ok();
    }

    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    let delta = at.signed_duration_since(now);
    if delta <= chrono::Duration::zero() {
        return None;
    }
    delta.to_std().ok()
}

/// Best human-readable message for an error body.
pub fn error_message(status: u16, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(message) = parsed.best_message() {
            return message;
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() || looks_like_html(trimmed) {
        format!("HTTP {}", status)
    } else {
        truncate_chars(trimmed, MAX_ERROR_BODY_CHARS)
    }
}

/// Whether a body is an HTML document rather than an API payload.
pub fn looks_like_html(body: &str) -> bool {
    let head: String = body
        .trim_start()
        .chars()
        .take(64)
        .collect::<String>()
        .to_ascii_lowercase();
    head.starts_with("<!doctype html") || head.starts_with("<html") || head.starts_with("<head")
}
