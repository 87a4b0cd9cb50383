//! Retrying request executor
//!
//! Drives the attempt loop for one analysis: per-attempt timeout, external
//! cancellation, classification of every outcome and backoff between
//! retryable failures.

use crate::backoff::backoff_delay;
use crate::classify::{classify_failure, classify_response};
use crate::parse::parse_analysis;
use crate::prompt::{build_analysis_request, build_ping_request};
use crate::providers::{ChatCompletionRequest, HttpTransport};
use crate::transport::ChatTransport;
use scamguard_core::{
    AnalysisRequest, AnalysisResult, ApiError, ConfigError, ProviderConfig, RetryConfig,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

// ============================================================================
// OPTIONS
// ============================================================================

/// Per-call overrides for [`RetryingExecutor::execute`].
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Per-attempt timeout. Defaults to the provider's request timeout.
    pub timeout: Option<Duration>,
    /// Retry policy. Defaults to the executor's policy.
    pub retry: Option<RetryConfig>,
    /// Aborts the in-flight attempt or backoff wait when cancelled.
    pub cancel: Option<CancellationToken>,
}

impl ExecuteOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// Outcome of a connection ping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionReport {
    pub success: bool,
    pub message: String,
    pub latency_ms: u64,
}

// ============================================================================
// EXECUTOR
// ============================================================================

/// Sends analysis requests through a [`ChatTransport`] with retries.
pub struct RetryingExecutor {
    transport: Arc<dyn ChatTransport>,
    provider: ProviderConfig,
    retry: RetryConfig,
}

impl RetryingExecutor {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        provider: ProviderConfig,
        retry: RetryConfig,
    ) -> Self {
        Self {
            transport,
            provider,
            retry,
        }
    }

    /// Executor over a real HTTP transport.
    pub fn http(provider: ProviderConfig, retry: RetryConfig) -> Result<Self, ConfigError> {
        let transport = HttpTransport::new(&provider)?;
        Ok(Self::new(Arc::new(transport), provider, retry))
    }

    pub fn provider(&self) -> &ProviderConfig {
        &self.provider
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Analyze one page, retrying retryable failures.
    ///
    /// Returns the first success, the first non-retryable error, or the last
    /// error once `max_retries` retries are spent.
    pub async fn execute(
        &self,
        request: &AnalysisRequest,
        options: &ExecuteOptions,
    ) -> Result<AnalysisResult, ApiError> {
        let body = build_analysis_request(&self.provider, request);
        let retry = options.retry.as_ref().unwrap_or(&self.retry);
        let timeout = options.timeout.unwrap_or(self.provider.request_timeout);
        let cancel = options.cancel.clone().unwrap_or_default();

        let mut attempt: u32 = 0;
        loop {
            debug!(attempt, target_url = request.target(), "Sending analysis request");

            let err = match self.attempt(&body, timeout, &cancel).await {
                Ok(content) => return parse_analysis(&content),
                Err(err) => err,
            };

            if !err.retryable || attempt >= retry.max_retries {
                error!(
                    attempt,
                    kind = %err.kind,
                    status = ?err.status,
                    error = %err.message,
                    "Analysis request failed"
                );
                return Err(err);
            }

            let delay = backoff_delay(attempt, retry, err.retry_after);
            warn!(
                attempt,
                max_retries = retry.max_retries,
                kind = %err.kind,
                status = ?err.status,
                delay_ms = delay.as_millis() as u64,
                error = %err.message,
                "Retryable failure, backing off"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ApiError::cancelled()),
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }

    /// Single minimal call with no retries, reporting latency.
    ///
    /// Touches neither cache nor queue.
    pub async fn test_connection(&self) -> ConnectionReport {
        let body = build_ping_request(&self.provider);
        let started = Instant::now();
        let outcome = self
            .attempt(&body, self.provider.request_timeout, &CancellationToken::new())
            .await;
        let latency_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(_) => ConnectionReport {
                success: true,
                message: format!("Connected; model {} responded", self.provider.model),
                latency_ms,
            },
            Err(err) => ConnectionReport {
                success: false,
                message: err.to_string(),
                latency_ms,
            },
        }
    }

    /// One bounded attempt: either the completion text or a classified error.
    async fn attempt(
        &self,
        body: &ChatCompletionRequest,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<String, ApiError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ApiError::cancelled()),
            outcome = tokio::time::timeout(timeout, self.transport.send(body)) => match outcome {
                Err(_) => Err(ApiError::timeout(format!(
                    "no response within {}ms",
                    timeout.as_millis()
                ))),
                Ok(Err(failure)) => Err(classify_failure(&failure)),
                Ok(Ok(response)) => classify_response(&response),
            },
        }
    }
}

impl std::fmt::Debug for RetryingExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryingExecutor")
            .field("provider", &self.provider)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}
