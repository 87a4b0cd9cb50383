//! The analysis entry point used by content extraction and the UI.

use crate::gate::AdmissionGate;
use crate::sweeper::spawn_cache_sweeper;
use dashmap::DashMap;
use scamguard_admission::{QueueStats, SlidingWindowLimiter};
use scamguard_core::{
    normalize_domain, AnalysisRequest, AnalysisResult, ApiError, ConfigError, ScamGuardConfig,
    ScamGuardResult, StorageError,
};
use scamguard_llm::{ChatTransport, ConnectionReport, ExecuteOptions, RetryingExecutor};
use scamguard_storage::{
    generate_cache_key, load_provider_settings, CacheKey, CacheStats, FeedbackRecord,
    HistoryEntry, HistoryLog, KeyValueStore, ResultCache,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type SharedOutcome = Arc<OnceCell<Result<AnalysisResult, ApiError>>>;

/// Ties the cache, admission control and the retrying executor together.
///
/// Concurrent requests for the same cache key share one remote call: the
/// first caller performs it and the rest await its outcome, error included.
pub struct Analyzer {
    config: ScamGuardConfig,
    executor: RetryingExecutor,
    cache: Arc<ResultCache>,
    store: Arc<dyn KeyValueStore>,
    history: HistoryLog,
    gate: AdmissionGate,
    limiter: SlidingWindowLimiter,
    in_flight: DashMap<CacheKey, SharedOutcome>,
}

impl Analyzer {
    pub fn new(
        config: ScamGuardConfig,
        transport: Arc<dyn ChatTransport>,
        store: Arc<dyn KeyValueStore>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let executor =
            RetryingExecutor::new(transport, config.provider.clone(), config.retry.clone());
        Ok(Self::assemble(config, executor, store))
    }

    /// Analyzer talking to the configured endpoint over HTTP.
    pub fn http(config: ScamGuardConfig, store: Arc<dyn KeyValueStore>) -> Result<Self, ConfigError> {
        config.validate()?;
        let executor = RetryingExecutor::http(config.provider.clone(), config.retry.clone())?;
        Ok(Self::assemble(config, executor, store))
    }

    /// Build from provider settings saved in the synced scope.
    ///
    /// `base` supplies every policy besides endpoint, key and model. Fails
    /// with `MissingRequired` when the settings have not been saved yet.
    pub async fn from_saved_settings(
        base: ScamGuardConfig,
        transport: Arc<dyn ChatTransport>,
        store: Arc<dyn KeyValueStore>,
    ) -> ScamGuardResult<Self> {
        let saved = load_provider_settings(store.as_ref())
            .await?
            .ok_or_else(|| ConfigError::MissingRequired {
                field: "apiEndpoint/apiKey/model".to_string(),
            })?;

        let mut config = base;
        config.provider.api_endpoint = saved.api_endpoint;
        config.provider.api_key = saved.api_key;
        config.provider.model = saved.model;
        Ok(Self::new(config, transport, store)?)
    }

    fn assemble(
        config: ScamGuardConfig,
        executor: RetryingExecutor,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            gate: AdmissionGate::new(config.queue.clone()),
            limiter: SlidingWindowLimiter::new(config.rate_limit.clone()),
            history: HistoryLog::new(store.clone()),
            cache: Arc::new(ResultCache::new()),
            in_flight: DashMap::new(),
            executor,
            store,
            config,
        }
    }

    pub fn config(&self) -> &ScamGuardConfig {
        &self.config
    }

    /// Shared handle to the result cache.
    pub fn cache(&self) -> Arc<ResultCache> {
        self.cache.clone()
    }

    // ========================================================================
    // ANALYSIS
    // ========================================================================

    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, ApiError> {
        self.analyze_with(request, &ExecuteOptions::default()).await
    }

    /// Analyze with per-call timeout, retry policy or cancellation.
    ///
    /// Timeout and retry policy only take effect for the caller that
    /// performs the remote call; callers joining an in-flight request share
    /// its outcome. Cancellation ends only the cancelling caller's wait. If
    /// that caller was performing the call, a joined caller takes it over.
    pub async fn analyze_with(
        &self,
        request: &AnalysisRequest,
        options: &ExecuteOptions,
    ) -> Result<AnalysisResult, ApiError> {
        let domain = normalize_domain(&request.domain());
        let key = generate_cache_key(&domain, request.content_sample());

        if let Some(entry) = self.cache.get(&key) {
            debug!(cache_key = %key, "Serving cached verdict");
            return Ok(entry.result);
        }

        let cell = self.join_in_flight(&key);
        let shared_options = ExecuteOptions {
            cancel: None,
            ..options.clone()
        };
        let performed = AtomicBool::new(false);
        let init = cell.get_or_init(|| {
            performed.store(true, Ordering::Relaxed);
            self.fetch(&key, &domain, request, &shared_options)
        });

        let outcome = match &options.cancel {
            Some(cancel) => tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                outcome = init => Some(outcome.clone()),
            },
            None => Some(init.await.clone()),
        };

        let Some(outcome) = outcome else {
            self.in_flight.remove_if(&key, |_, current| {
                Arc::ptr_eq(current, &cell)
                    && !current.initialized()
                    && Arc::strong_count(current) <= 2
            });
            debug!(cache_key = %key, "Caller cancelled analysis");
            return Err(ApiError::cancelled());
        };

        if performed.load(Ordering::Relaxed) {
            self.in_flight
                .remove_if(&key, |_, current| Arc::ptr_eq(current, &cell));
        } else {
            debug!(cache_key = %key, "Joined in-flight analysis");
        }
        outcome
    }

    /// Shared outcome slot for `key`.
    ///
    /// A slot still holding an error from a call that just finished is
    /// replaced, so a late arrival starts a new call instead of inheriting
    /// that error.
    fn join_in_flight(&self, key: &CacheKey) -> SharedOutcome {
        let mut slot = self.in_flight.entry(key.clone()).or_default();
        if matches!(slot.get(), Some(Err(_))) {
            *slot = SharedOutcome::default();
        }
        slot.clone()
    }

    /// The remote path: admission, local limit, executor, then cache and
    /// history on success.
    async fn fetch(
        &self,
        key: &CacheKey,
        domain: &str,
        request: &AnalysisRequest,
        options: &ExecuteOptions,
    ) -> Result<AnalysisResult, ApiError> {
        // A call for this key may have finished between our cache miss and
        // taking the in-flight slot.
        if let Some(entry) = self.cache.peek(key) {
            debug!(cache_key = %key, "Verdict cached while joining");
            return Ok(entry.result);
        }

        let cancel = CancellationToken::new();
        let mut ticket = self.gate.admit(key, &cancel).await?;

        if let Err(wait) = self.limiter.try_acquire() {
            warn!(
                domain,
                retry_after_ms = wait.as_millis() as u64,
                "Local rate limit reached"
            );
            return Err(ApiError::rate_limited(
                Some(wait),
                format!(
                    "more than {} analyses within {}s",
                    self.config.rate_limit.max_requests,
                    self.config.rate_limit.window.as_secs()
                ),
            ));
        }

        loop {
            match self.executor.execute(request, options).await {
                Ok(result) => {
                    self.store_result(key, domain, request, &result).await;
                    return Ok(result);
                }
                Err(err) if err.retryable => match self.gate.readmit(ticket, &cancel).await {
                    Some(next) => {
                        warn!(cache_key = %key, kind = %err.kind, "Requeued failed analysis");
                        ticket = next?;
                    }
                    None => return Err(err),
                },
                Err(err) => return Err(err),
            }
        }
    }

    async fn store_result(
        &self,
        key: &CacheKey,
        domain: &str,
        request: &AnalysisRequest,
        result: &AnalysisResult,
    ) {
        let ttl = self.config.cache.ttl_for(domain);
        self.cache
            .put(key.clone(), request.target(), result.clone(), ttl);

        let entry = HistoryEntry::from_result(domain, request.target(), result);
        if let Err(e) = self.history.record(entry).await {
            warn!(domain, error = %e, "Failed to record analysis history");
        }

        info!(
            domain,
            risk = %result.risk_level,
            threats = result.threats.len(),
            confidence = result.confidence,
            ttl_secs = ttl.as_secs(),
            "Analysis complete"
        );
    }

    // ========================================================================
    // CACHE AND STATE
    // ========================================================================

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drop cached verdicts for one domain, or all of them.
    pub fn clear_cache(&self, domain: Option<&str>) -> usize {
        let removed = match domain {
            Some(domain) => self.cache.evict_domain(domain),
            None => self.cache.evict_all(),
        };
        info!(domain = ?domain, removed, "Cache cleared");
        removed
    }

    pub fn queue_stats(&self) -> QueueStats {
        self.gate.stats()
    }

    /// Write live cache entries to the local scope.
    pub async fn persist_cache(&self) -> Result<usize, StorageError> {
        self.cache.persist(self.store.as_ref()).await
    }

    /// Load a previously persisted cache snapshot.
    pub async fn restore_cache(&self) -> Result<usize, StorageError> {
        self.cache.restore(self.store.as_ref()).await
    }

    /// Start the periodic sweep at the configured interval.
    pub fn spawn_sweeper(&self, shutdown: CancellationToken) -> JoinHandle<usize> {
        spawn_cache_sweeper(self.cache.clone(), self.config.cache.sweep_interval, shutdown)
    }

    pub async fn history(&self) -> Result<Vec<HistoryEntry>, StorageError> {
        self.history.entries().await
    }

    pub async fn record_feedback(&self, record: FeedbackRecord) -> Result<(), StorageError> {
        info!(domain = %record.domain, verdict = ?record.verdict, "Feedback recorded");
        self.history.record_feedback(record).await
    }

    pub async fn feedback(&self) -> Result<Vec<FeedbackRecord>, StorageError> {
        self.history.feedback().await
    }

    // ========================================================================
    // CONNECTIVITY
    // ========================================================================

    /// A single call with no retries. Cache, queue and limiter are left
    /// untouched.
    pub async fn test_connection(&self) -> ConnectionReport {
        let report = self.executor.test_connection().await;
        info!(
            success = report.success,
            latency_ms = report.latency_ms,
            "Connection test finished"
        );
        report
    }
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer")
            .field("executor", &self.executor)
            .field("cache_size", &self.cache.len())
            .field("queued", &self.gate.len())
            .field("in_flight", &self.in_flight.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scamguard_core::RiskLevel;
    use scamguard_test_utils::fixtures::*;
    use scamguard_test_utils::{MemoryKeyValueStore, ScriptedTransport};
    use std::time::Duration;

    fn analyzer(transport: &Arc<ScriptedTransport>) -> Analyzer {
        Analyzer::new(
            test_config(),
            transport.clone(),
            Arc::new(MemoryKeyValueStore::new()),
        )
        .unwrap()
    }

    fn key_of(request: &AnalysisRequest) -> (String, CacheKey) {
        let domain = normalize_domain(&request.domain());
        let key = generate_cache_key(&domain, request.content_sample());
        (domain, key)
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_serves_verdict_cached_after_miss() {
        let transport = Arc::new(ScriptedTransport::new().otherwise(verdict(RiskLevel::Low, 0.6)));
        let analyzer = analyzer(&transport);
        let request = page_request("https://example.com/login", "enter your password");
        let (domain, key) = key_of(&request);

        // Another call finished and cached its verdict after our miss.
        analyzer.cache.put(
            key.clone(),
            request.target(),
            sample_result(RiskLevel::High),
            Duration::from_secs(60),
        );

        let result = analyzer
            .fetch(&key, &domain, &request, &ExecuteOptions::default())
            .await
            .unwrap();

        assert_eq!(result.risk_level, RiskLevel::High);
        assert_eq!(transport.call_count(), 0);
        assert_eq!(analyzer.queue_stats().dequeued, 0);
        let stats = analyzer.cache_stats();
        assert_eq!((stats.hits, stats.misses), (0, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_error_slot_is_not_joined() {
        let transport = Arc::new(ScriptedTransport::new().then(verdict(RiskLevel::Safe, 0.9)));
        let analyzer = analyzer(&transport);
        let request = page_request("https://example.com/login", "enter your password");
        let (_, key) = key_of(&request);

        // Slot left behind by a failed call whose caller has not removed it yet.
        let stale = SharedOutcome::default();
        stale
            .set(Err(ApiError::network("connection reset")))
            .unwrap();
        analyzer.in_flight.insert(key.clone(), stale);

        let result = analyzer.analyze(&request).await.unwrap();

        assert_eq!(result.risk_level, RiskLevel::Safe);
        assert_eq!(transport.call_count(), 1);
        assert!(analyzer.in_flight.get(&key).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_sole_caller_clears_slot() {
        let transport = Arc::new(
            ScriptedTransport::new().then(scamguard_test_utils::ScriptedReply::Hang),
        );
        let analyzer = analyzer(&transport);
        let request = page_request("https://example.com/login", "enter your password");
        let (_, key) = key_of(&request);
        let token = CancellationToken::new();
        token.cancel();

        let result = analyzer
            .analyze_with(&request, &ExecuteOptions::default().with_cancel(token))
            .await;

        assert_eq!(result.unwrap_err(), ApiError::cancelled());
        assert!(analyzer.in_flight.get(&key).is_none());
        assert_eq!(transport.call_count(), 0);
    }
}
