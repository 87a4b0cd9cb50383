//! Backoff scheduling between retry attempts.

use rand::Rng;
use scamguard_core::RetryConfig;
use std::time::Duration;

/// Upper bound of the jitter added on top of a server `Retry-After` hint.
pub const RETRY_AFTER_JITTER: Duration = Duration::from_millis(1000);

/// Delay before retry number `attempt` (zero-indexed), with jitter sampled
/// uniformly.
pub fn backoff_delay(attempt: u32, config: &RetryConfig, retry_after: Option<Duration>) -> Duration {
    let jitter_bound = match retry_after {
        Some(_) => RETRY_AFTER_JITTER,
        None => config.initial_delay,
    };
    compute_delay(attempt, config, retry_after, sample_jitter(jitter_bound))
}

/// Deterministic core of [`backoff_delay`]: the caller supplies the jitter.
///
/// With a hint: `min(hint + jitter, max_delay)`.
/// Without: `min(initial * multiplier^attempt + jitter, max_delay)`.
pub fn compute_delay(
    attempt: u32,
    config: &RetryConfig,
    retry_after: Option<Duration>,
    jitter: Duration,
) -> Duration {
    let base = match retry_after {
        Some(hint) => hint,
        None => exponential(attempt, config),
    };
    base.saturating_add(jitter).min(config.max_delay)
}

fn exponential(attempt: u32, config: &RetryConfig) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let millis = config.initial_delay.as_millis() as f64 * config.multiplier.powi(exponent);
    if !millis.is_finite() || millis >= config.max_delay.as_millis() as f64 {
        return config.max_delay;
    }
    Duration::from_millis(millis.max(0.0) as u64)
}

fn sample_jitter(bound: Duration) -> Duration {
    let bound_ms = bound.as_millis() as u64;
    if bound_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::rng().random_range(0..bound_ms))
}


// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================
