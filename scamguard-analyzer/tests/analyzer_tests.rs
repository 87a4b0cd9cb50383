//! Integration tests for the analyzer
//!
//! Tests verify:
//! - Cache hits skip the remote call, across `www.` and case variants
//! - Concurrent requests for one cache key share a single remote call
//! - Local rate limiting and queue overflow surface as RATE_LIMITED
//! - Cancelling one caller does not end the call for callers sharing it
//! - Retryable failures go back through the admission queue
//! - Cache clearing, persistence and connection tests behave per contract
//! - History and feedback land in the local scope

use futures_util::future::join_all;
use scamguard_analyzer::{
    Analyzer, ExecuteOptions, FeedbackRecord, FeedbackVerdict, ScamGuardError,
};
use scamguard_core::{
    ApiErrorKind, ConfigError, QueueConfig, RateLimitConfig, RetryConfig, RiskLevel,
    ScamGuardConfig,
};
use scamguard_storage::save_provider_settings;
use scamguard_test_utils::assertions::{assert_api_error, assert_result_valid};
use scamguard_test_utils::fixtures::*;
use scamguard_test_utils::{MemoryKeyValueStore, ScriptedReply, ScriptedTransport};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// ============================================================================
// HELPERS
// ============================================================================

fn analyzer(transport: &Arc<ScriptedTransport>, config: ScamGuardConfig) -> Analyzer {
    Analyzer::new(config, transport.clone(), Arc::new(MemoryKeyValueStore::new())).unwrap()
}

fn login_page() -> scamguard_core::AnalysisRequest {
    page_request(
        "https://www.example.com/login",
        "Your account is locked. Enter your password to continue.",
    )
}

// ============================================================================
// CACHING AND DE-DUPLICATION
// ============================================================================

#[tokio::test(start_paused = true)]
async fn cache_hit_avoids_remote_call() {
    let transport = Arc::new(ScriptedTransport::new().then(verdict(RiskLevel::High, 0.9)));
    let analyzer = analyzer(&transport, test_config());

    let first = analyzer.analyze(&login_page()).await.unwrap();
    let second = analyzer.analyze(&login_page()).await.unwrap();

    assert_eq!(first, second);
    assert_result_valid(&first);
    assert_eq!(transport.call_count(), 1);

    let stats = analyzer.cache_stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.size, 1);
    assert!((stats.hit_rate - 0.5).abs() < f64::EPSILON);
}

#[tokio::test(start_paused = true)]
async fn www_and_case_variants_share_cache_entry() {
    let transport = Arc::new(ScriptedTransport::new().then(verdict(RiskLevel::Low, 0.7)));
    let analyzer = analyzer(&transport, test_config());
    let content = "Weekly deals on garden furniture";

    analyzer
        .analyze(&page_request("https://WWW.Example.com/deals", content))
        .await
        .unwrap();
    let again = analyzer
        .analyze(&page_request("https://example.com/other", content))
        .await
        .unwrap();

    assert_eq!(again.risk_level, RiskLevel::Low);
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn concurrent_duplicates_share_one_call() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .then_after(Duration::from_millis(500), verdict(RiskLevel::Critical, 0.95))
            .otherwise(status(500, "second call should not happen")),
    );
    let analyzer = analyzer(&transport, test_config());
    let request = login_page();

    let outcomes = join_all((0..5).map(|_| analyzer.analyze(&request))).await;

    assert_eq!(transport.call_count(), 1);
    for outcome in &outcomes {
        assert_eq!(outcome.as_ref().unwrap().risk_level, RiskLevel::Critical);
    }
    assert_eq!(analyzer.cache_stats().misses, 5);
}

#[tokio::test(start_paused = true)]
async fn joined_callers_share_errors_which_are_not_cached() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .then_after(Duration::from_millis(100), status(401, "invalid api key"))
            .then(verdict(RiskLevel::Safe, 0.9)),
    );
    let analyzer = analyzer(&transport, test_config());
    let request = login_page();

    let outcomes = join_all((0..3).map(|_| analyzer.analyze(&request))).await;
    for outcome in &outcomes {
        assert_api_error(outcome, ApiErrorKind::Auth);
    }
    assert_eq!(transport.call_count(), 1);

    let retried = analyzer.analyze(&request).await.unwrap();
    assert_eq!(retried.risk_level, RiskLevel::Safe);
    assert_eq!(transport.call_count(), 2);
}

// ============================================================================
// ADMISSION AND RATE LIMITING
// ============================================================================

#[tokio::test(start_paused = true)]
async fn distinct_requests_are_spaced_by_admission_queue() {
    let transport = Arc::new(ScriptedTransport::new().otherwise(verdict(RiskLevel::Low, 0.6)));
    let analyzer = analyzer(&transport, test_config());

    analyzer
        .analyze(&page_request("https://a.example", "first page"))
        .await
        .unwrap();
    analyzer
        .analyze(&page_request("https://b.example", "second page"))
        .await
        .unwrap();

    assert_eq!(transport.call_count(), 2);
    let gap = transport.call_gaps()[0];
    assert!(gap >= Duration::from_secs(1), "second call after {:?}", gap);
}

#[tokio::test(start_paused = true)]
async fn local_rate_limit_refuses_with_hint() {
    let transport = Arc::new(ScriptedTransport::new().otherwise(verdict(RiskLevel::Low, 0.6)));
    let config = test_config().with_rate_limit(RateLimitConfig::new(2, Duration::from_secs(60)));
    let analyzer = analyzer(&transport, config);

    for n in 0..2 {
        analyzer
            .analyze(&page_request(&format!("https://site{}.example", n), "page"))
            .await
            .unwrap();
    }
    let refused = analyzer
        .analyze(&page_request("https://site9.example", "page"))
        .await;

    assert_api_error(&refused, ApiErrorKind::RateLimited);
    let err = refused.unwrap_err();
    assert!(err.retryable);
    let hint = err.retry_after.expect("limiter gives a wait hint");
    assert!(hint > Duration::ZERO && hint <= Duration::from_secs(60));
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn queue_overflow_evicts_oldest_waiter() {
    let transport = Arc::new(ScriptedTransport::new().otherwise(verdict(RiskLevel::Low, 0.6)));
    let config = test_config().with_queue(QueueConfig::default().with_capacity(1));
    let analyzer = analyzer(&transport, config);

    let requests = [
        page_request("https://one.example", "1"),
        page_request("https://two.example", "2"),
        page_request("https://three.example", "3"),
    ];
    let outcomes = join_all(requests.iter().map(|r| analyzer.analyze(r))).await;

    assert!(outcomes[0].is_ok());
    assert_api_error(&outcomes[1], ApiErrorKind::RateLimited);
    assert!(outcomes[2].is_ok());
    assert_eq!(transport.call_count(), 2);
    assert_eq!(analyzer.queue_stats().dropped, 1);
}

#[tokio::test(start_paused = true)]
async fn retryable_failure_goes_back_through_queue() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .then(status(503, "busy"))
            .then(verdict(RiskLevel::Medium, 0.5)),
    );
    let config = test_config()
        .with_retry(RetryConfig::no_retry())
        .with_queue(QueueConfig::default().with_max_retries(1));
    let analyzer = analyzer(&transport, config);

    let result = analyzer.analyze(&login_page()).await.unwrap();

    assert_eq!(result.risk_level, RiskLevel::Medium);
    assert_eq!(transport.call_count(), 2);
    assert!(transport.call_gaps()[0] >= Duration::from_secs(1));
    assert_eq!(analyzer.queue_stats().retried, 1);
}

#[tokio::test(start_paused = true)]
async fn exhausted_queue_retries_surface_last_error() {
    let transport = Arc::new(ScriptedTransport::new().otherwise(status(500, "boom")));
    let config = test_config()
        .with_retry(RetryConfig::no_retry())
        .with_queue(QueueConfig::default().with_max_retries(0));
    let analyzer = analyzer(&transport, config);

    let result = analyzer.analyze(&login_page()).await;

    assert_api_error(&result, ApiErrorKind::Server);
    assert_eq!(transport.call_count(), 1);
    assert_eq!(analyzer.queue_stats().failed, 1);
    assert_eq!(analyzer.cache_stats().size, 0);
}

#[tokio::test(start_paused = true)]
async fn cancellation_ends_hanging_call() {
    let transport = Arc::new(ScriptedTransport::new().then(ScriptedReply::Hang));
    let analyzer = analyzer(&transport, test_config());
    let token = CancellationToken::new();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let result = analyzer
        .analyze_with(&login_page(), &ExecuteOptions::default().with_cancel(token))
        .await;

    assert_api_error(&result, ApiErrorKind::Timeout);
    assert!(!result.unwrap_err().retryable);
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn cancelling_one_caller_leaves_joined_caller_running() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .then_after(Duration::from_millis(500), verdict(RiskLevel::High, 0.9))
            .then(verdict(RiskLevel::High, 0.9)),
    );
    let analyzer = analyzer(&transport, test_config());
    let request = login_page();
    let token = CancellationToken::new();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let opts = ExecuteOptions::default().with_cancel(token);
    let (cancelled, patient) = tokio::join!(
        analyzer.analyze_with(&request, &opts),
        analyzer.analyze(&request),
    );

    assert_api_error(&cancelled, ApiErrorKind::Timeout);
    assert!(!cancelled.unwrap_err().retryable);
    assert_eq!(patient.unwrap().risk_level, RiskLevel::High);
    assert_eq!(transport.call_count(), 2);
    assert_eq!(analyzer.cache_stats().size, 1);
}

#[tokio::test(start_paused = true)]
async fn evicted_request_does_not_use_rate_limit_slot() {
    let transport = Arc::new(ScriptedTransport::new().otherwise(verdict(RiskLevel::Low, 0.6)));
    let config = test_config()
        .with_rate_limit(RateLimitConfig::new(3, Duration::from_secs(60)))
        .with_queue(QueueConfig::default().with_capacity(1));
    let analyzer = analyzer(&transport, config);

    let requests = [
        page_request("https://one.example", "1"),
        page_request("https://two.example", "2"),
        page_request("https://three.example", "3"),
    ];
    let outcomes = join_all(requests.iter().map(|r| analyzer.analyze(r))).await;
    assert!(outcomes[0].is_ok());
    assert_api_error(&outcomes[1], ApiErrorKind::RateLimited);
    assert!(outcomes[2].is_ok());

    analyzer
        .analyze(&page_request("https://four.example", "4"))
        .await
        .unwrap();
    assert_eq!(transport.call_count(), 3);
}

// ============================================================================
// CACHE MANAGEMENT
// ============================================================================

#[tokio::test(start_paused = true)]
async fn clear_cache_by_domain_and_all() {
    let transport = Arc::new(ScriptedTransport::new().otherwise(verdict(RiskLevel::Low, 0.6)));
    let analyzer = analyzer(&transport, test_config());

    analyzer.analyze(&login_page()).await.unwrap();
    analyzer
        .analyze(&page_request("https://shop.example.org", "cart"))
        .await
        .unwrap();
    assert_eq!(analyzer.cache_stats().size, 2);

    assert_eq!(analyzer.clear_cache(Some("WWW.EXAMPLE.COM")), 1);
    assert_eq!(analyzer.cache_stats().size, 1);

    analyzer.analyze(&login_page()).await.unwrap();
    assert_eq!(transport.call_count(), 3);

    assert_eq!(analyzer.clear_cache(None), 2);
    assert_eq!(analyzer.cache_stats().size, 0);
}

#[tokio::test(start_paused = true)]
async fn persisted_cache_serves_a_fresh_analyzer() {
    let store = Arc::new(MemoryKeyValueStore::new());
    let first_transport = Arc::new(ScriptedTransport::new().then(verdict(RiskLevel::High, 0.8)));
    let first = Analyzer::new(test_config(), first_transport.clone(), store.clone()).unwrap();
    first.analyze(&login_page()).await.unwrap();
    assert_eq!(first.persist_cache().await.unwrap(), 1);

    let second_transport = Arc::new(ScriptedTransport::new());
    let second = Analyzer::new(test_config(), second_transport.clone(), store).unwrap();
    assert_eq!(second.restore_cache().await.unwrap(), 1);

    let result = second.analyze(&login_page()).await.unwrap();
    assert_eq!(result.risk_level, RiskLevel::High);
    assert_eq!(second_transport.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_connection_leaves_state_untouched() {
    let transport = Arc::new(ScriptedTransport::new().then(completion("ok")));
    let analyzer = analyzer(&transport, test_config());

    let report = analyzer.test_connection().await;

    assert!(report.success, "{}", report.message);
    assert_eq!(transport.call_count(), 1);
    let stats = analyzer.cache_stats();
    assert_eq!((stats.hits, stats.misses, stats.size), (0, 0, 0));
    assert_eq!(analyzer.queue_stats().dequeued, 0);
}

#[tokio::test(start_paused = true)]
async fn test_connection_reports_failure() {
    let transport = Arc::new(ScriptedTransport::new().otherwise(status(401, "invalid api key")));
    let analyzer = analyzer(&transport, test_config());

    let report = analyzer.test_connection().await;

    assert!(!report.success);
    assert!(report.message.contains("AUTH"), "{}", report.message);
    assert_eq!(transport.call_count(), 1);
}

// ============================================================================
// HISTORY, FEEDBACK AND SETTINGS
// ============================================================================

#[tokio::test(start_paused = true)]
async fn completed_analyses_are_recorded_in_history() {
    let transport = Arc::new(ScriptedTransport::new().then(verdict(RiskLevel::High, 0.8)));
    let analyzer = analyzer(&transport, test_config());

    analyzer.analyze(&login_page()).await.unwrap();
    // cache hits are not new analyses
    analyzer.analyze(&login_page()).await.unwrap();

    let history = analyzer.history().await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].domain, "example.com");
    assert_eq!(history[0].risk_level, RiskLevel::High);

    analyzer
        .record_feedback(
            FeedbackRecord::new("example.com", RiskLevel::High, FeedbackVerdict::FalsePositive)
                .with_note("my bank's real login"),
        )
        .await
        .unwrap();
    let feedback = analyzer.feedback().await.unwrap();
    assert_eq!(feedback.len(), 1);
    assert_eq!(feedback[0].verdict, FeedbackVerdict::FalsePositive);
}

#[tokio::test]
async fn from_saved_settings_requires_saved_provider() {
    let store = Arc::new(MemoryKeyValueStore::new());
    let transport = Arc::new(ScriptedTransport::new());

    let missing =
        Analyzer::from_saved_settings(test_config(), transport.clone(), store.clone()).await;
    assert!(matches!(
        missing,
        Err(ScamGuardError::Config(ConfigError::MissingRequired { .. }))
    ));

    let saved = test_provider();
    save_provider_settings(store.as_ref(), &saved).await.unwrap();
    let analyzer = Analyzer::from_saved_settings(test_config(), transport, store)
        .await
        .unwrap();
    assert_eq!(analyzer.config().provider.model, saved.model);
    assert_eq!(analyzer.config().provider.api_endpoint, saved.api_endpoint);
}

// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================

mod prop_tests {
    use super::*;
    use proptest::prelude::*;
    use scamguard_test_utils::generators::{arb_analysis_request, arb_risk_level};

    fn paused_runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Property: a repeated request is served from cache with the
        /// verdict of the single remote call.
        #[test]
        fn prop_repeat_request_served_from_cache(
            request in arb_analysis_request(),
            risk in arb_risk_level(),
        ) {
            let transport = Arc::new(ScriptedTransport::new().then(verdict(risk, 0.7)));
            let analyzer = analyzer(&transport, test_config());

            let (first, second) = paused_runtime().block_on(async {
                let first = analyzer.analyze(&request).await;
                let second = analyzer.analyze(&request).await;
                (first, second)
            });

            prop_assert_eq!(first.unwrap().risk_level, risk);
            prop_assert_eq!(second.unwrap().risk_level, risk);
            prop_assert_eq!(transport.call_count(), 1);
        }
    }
}
