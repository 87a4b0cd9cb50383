//! scamguard Test Utilities
//!
//! Centralized test infrastructure for the scamguard workspace:
//! - Scripted chat transport that records every call
//! - Response fixtures for common endpoint behaviour
//! - Proptest generators for request and result types
//! - Custom assertions for error kinds and verdicts

// Re-export in-memory storage from its source crate
pub use scamguard_storage::MemoryKeyValueStore;

// Re-export core types for convenience
pub use scamguard_core::{
    AnalysisRequest, AnalysisResult, ApiError, ApiErrorKind, ProviderConfig, RetryConfig,
    RiskLevel, ScamGuardConfig, SuspiciousPassage, ThreatKind, Timestamp,
};
pub use scamguard_llm::{
    ChatCompletionRequest, ChatTransport, TransportFailure, TransportResponse,
};

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

// ============================================================================
// SCRIPTED TRANSPORT
// ============================================================================

/// What the scripted transport does for one call.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Respond(TransportResponse),
    Fail(TransportFailure),
    /// Never answers; only a timeout or cancellation ends the call.
    Hang,
}

#[derive(Debug, Clone)]
struct ScriptStep {
    delay: Duration,
    reply: ScriptedReply,
}

/// One observed call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    /// Tokio clock instant, so paused-time tests can measure spacing.
    pub at: Instant,
    pub request: ChatCompletionRequest,
}

/// Transport that replays a fixed script and records every call.
///
/// Steps are consumed in order; once the script runs out the fallback step
/// repeats, or the call fails with a network error when there is none.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<ScriptStep>>,
    fallback: Option<ScriptStep>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step answered immediately.
    pub fn then(self, reply: ScriptedReply) -> Self {
        self.then_after(Duration::ZERO, reply)
    }

    /// Append a step answered after `delay` on the tokio clock.
    pub fn then_after(self, delay: Duration, reply: ScriptedReply) -> Self {
        lock(&self.script).push_back(ScriptStep { delay, reply });
        self
    }

    /// Step repeated once the script is exhausted.
    pub fn otherwise(mut self, reply: ScriptedReply) -> Self {
        self.fallback = Some(ScriptStep {
            delay: Duration::ZERO,
            reply,
        });
        self
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    /// Gaps between consecutive calls.
    pub fn call_gaps(&self) -> Vec<Duration> {
        let calls = lock(&self.calls);
        calls
            .windows(2)
            .map(|pair| pair[1].at.duration_since(pair[0].at))
            .collect()
    }

    fn next_step(&self) -> Option<ScriptStep> {
        lock(&self.script)
            .pop_front()
            .or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn send(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<TransportResponse, TransportFailure> {
        lock(&self.calls).push(RecordedCall {
            at: Instant::now(),
            request: request.clone(),
        });

        let Some(step) = self.next_step() else {
            return Err(TransportFailure::Network("script exhausted".to_string()));
        };
        if !step.delay.is_zero() {
            tokio::time::sleep(step.delay).await;
        }
        match step.reply {
            ScriptedReply::Respond(response) => Ok(response),
            ScriptedReply::Fail(failure) => Err(failure),
            ScriptedReply::Hang => std::future::pending().await,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for generating test data.

    use super::*;
    use proptest::prelude::*;

    /// Generate any risk level.
    pub fn arb_risk_level() -> impl Strategy<Value = RiskLevel> {
        prop::sample::select(RiskLevel::ALL.to_vec())
    }

    /// Generate any recognized threat tag.
    pub fn arb_threat_kind() -> impl Strategy<Value = ThreatKind> {
        prop::sample::select(ThreatKind::ALL.to_vec())
    }

    /// Generate a lower-case domain that does not start with `www.`.
    pub fn arb_domain() -> impl Strategy<Value = String> {
        "[a-v][a-z0-9]{0,10}(\\.[a-z]{2,8}){1,2}"
    }

    /// Generate page text, sometimes longer than the hashed prefix.
    pub fn arb_content() -> impl Strategy<Value = String> {
        prop_oneof![".{0,200}", "[a-zA-Z ]{900,1400}"]
    }

    /// Generate a request for a random page.
    pub fn arb_analysis_request() -> impl Strategy<Value = AnalysisRequest> {
        (arb_domain(), arb_content())
            .prop_map(|(domain, content)| AnalysisRequest::new(format!("https://{}/", domain), &content))
    }

    /// Generate a validated result.
    pub fn arb_analysis_result() -> impl Strategy<Value = AnalysisResult> {
        (
            arb_risk_level(),
            prop::collection::btree_set(arb_threat_kind(), 0..4),
            "[a-zA-Z ,.]{1,80}",
            0.0f32..=1.0f32,
        )
            .prop_map(|(risk, threats, explanation, confidence)| {
                AnalysisResult::new(risk, explanation, confidence).with_threats(threats)
            })
    }

    /// Generate a valid retry policy.
    pub fn arb_retry_config() -> impl Strategy<Value = RetryConfig> {
        (0u32..6, 1u64..2_000, 0u64..60_000, 1.0f64..4.0)
            .prop_map(|(max_retries, initial_ms, extra_ms, multiplier)| {
                RetryConfig::default()
                    .with_max_retries(max_retries)
                    .with_initial_delay(Duration::from_millis(initial_ms))
                    .with_max_delay(Duration::from_millis(initial_ms + extra_ms))
                    .with_multiplier(multiplier)
            })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures for common endpoint behaviour.

    use super::*;

    /// Provider settings pointing at a fake endpoint.
    pub fn test_provider() -> ProviderConfig {
        ProviderConfig::new(
            "https://llm.example.test/v1/chat/completions",
            "sk-test-key",
            "test-model",
        )
    }

    /// Complete configuration with default policies.
    pub fn test_config() -> ScamGuardConfig {
        ScamGuardConfig::new(test_provider())
    }

    /// A page request with the given content.
    pub fn page_request(target: &str, content: &str) -> AnalysisRequest {
        AnalysisRequest::new(target, content)
    }

    /// Model output for a verdict, as the model would write it.
    pub fn verdict_json(risk: RiskLevel, confidence: f32) -> String {
        serde_json::json!({
            "riskLevel": risk.as_wire_str(),
            "threats": [],
            "explanation": format!("Looks {}", risk.as_wire_str().to_lowercase()),
            "confidence": confidence,
        })
        .to_string()
    }

    /// Chat-completions body wrapping `content`.
    pub fn completion_body(content: &str) -> String {
        serde_json::json!({
            "model": "test-model",
            "choices": [{
                "message": {"role": "assistant", "content": content},
                "finish_reason": "stop",
            }],
        })
        .to_string()
    }

    /// 200 response carrying `content` as the model answer.
    pub fn completion(content: &str) -> ScriptedReply {
        ScriptedReply::Respond(json_response(200, &completion_body(content)))
    }

    /// 200 response carrying a verdict.
    pub fn verdict(risk: RiskLevel, confidence: f32) -> ScriptedReply {
        completion(&verdict_json(risk, confidence))
    }

    /// Non-2xx JSON error response.
    pub fn status(status: u16, message: &str) -> ScriptedReply {
        let body = serde_json::json!({"error": {"message": message}}).to_string();
        ScriptedReply::Respond(json_response(status, &body))
    }

    /// 429 with a `Retry-After` header in seconds.
    pub fn rate_limited(retry_after_secs: u64) -> ScriptedReply {
        let body = serde_json::json!({"error": {"message": "rate limited"}}).to_string();
        ScriptedReply::Respond(
            json_response(429, &body).with_header("retry-after", &retry_after_secs.to_string()),
        )
    }

    /// 200 HTML page, as served by a misconfigured endpoint.
    pub fn html_page() -> ScriptedReply {
        ScriptedReply::Respond(
            TransportResponse::new(200, "<!DOCTYPE html><html><head><title>Sign in</title></head></html>")
                .with_header("content-type", "text/html"),
        )
    }

    pub fn network_down() -> ScriptedReply {
        ScriptedReply::Fail(TransportFailure::Network("connection refused".to_string()))
    }

    pub fn json_response(status: u16, body: &str) -> TransportResponse {
        TransportResponse::new(status, body).with_header("content-type", "application/json")
    }

    /// Result a caller might have cached earlier.
    pub fn sample_result(risk: RiskLevel) -> AnalysisResult {
        AnalysisResult::new(risk, "cached verdict", 0.8)
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Custom assertion functions for scamguard-specific validation.

    use super::*;

    /// Assert that a call failed with the given error kind.
    #[track_caller]
    pub fn assert_api_error<T: std::fmt::Debug>(result: &Result<T, ApiError>, kind: ApiErrorKind) {
        match result {
            Err(err) => assert_eq!(err.kind, kind, "Wrong error kind: {:?}", err),
            Ok(value) => panic!("Expected {} error, got Ok: {:?}", kind, value),
        }
    }

    /// Assert that a result is within the validated ranges.
    #[track_caller]
    pub fn assert_result_valid(result: &AnalysisResult) {
        assert!(
            (0.0..=1.0).contains(&result.confidence),
            "Confidence {} outside [0, 1]",
            result.confidence
        );
        for threat in &result.threats {
            assert!(ThreatKind::ALL.contains(threat), "Unrecognized threat {:?}", threat);
        }
        if let Some(passages) = &result.suspicious_passages {
            assert!(passages.len() <= scamguard_core::MAX_PASSAGES);
        }
    }

    /// Assert that a configuration validates.
    #[track_caller]
    pub fn assert_config_valid(config: &ScamGuardConfig) {
        match config.validate() {
            Ok(()) => {}
            Err(e) => panic!("Config validation failed: {:?}", e),
        }
    }
}
