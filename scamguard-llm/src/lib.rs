//! scamguard LLM - Resilient Chat-Completions Client
//!
//! Sends page-analysis prompts to an OpenAI-compatible endpoint and turns
//! the answer into a validated `AnalysisResult`. Network access goes
//! through the [`ChatTransport`] seam so the retry loop can be driven by a
//! scripted transport in tests.

pub mod backoff;
pub mod classify;
pub mod executor;
pub mod parse;
pub mod prompt;
pub mod providers;
pub mod transport;

pub use backoff::{backoff_delay, compute_delay, RETRY_AFTER_JITTER};
pub use classify::{classify_failure, classify_response, classify_response_at, parse_retry_after};
pub use executor::{ConnectionReport, ExecuteOptions, RetryingExecutor};
pub use parse::{extract_json_block, parse_analysis};
pub use providers::{
    ChatCompletionRequest, ChatCompletionResponse, CompletionEnvelope, HttpTransport, Message,
};
pub use transport::{ChatTransport, TransportFailure, TransportResponse};
