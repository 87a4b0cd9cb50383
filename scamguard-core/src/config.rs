//! Configuration types
//!
//! Every struct here is plain data: deserializable, validated explicitly via
//! `validate()`, and adjustable with `with_*` setters. Durations are written
//! as integer milliseconds in serialized form.

use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Serde adapter storing a `Duration` as whole milliseconds.
pub mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

// ============================================================================
// RETRY
// ============================================================================

/// Retry configuration for remote analysis calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Retries after the first attempt; total attempts is `max_retries + 1`.
    pub max_retries: u32,
    #[serde(rename = "initial_delay_ms", with = "duration_ms")]
    pub initial_delay: Duration,
    #[serde(rename = "max_delay_ms", with = "duration_ms")]
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// A config that performs exactly one attempt.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(invalid("retry.multiplier", self.multiplier, "must be >= 1.0"));
        }
        if self.max_delay < self.initial_delay {
            return Err(invalid(
                "retry.max_delay_ms",
                self.max_delay.as_millis(),
                "must be >= initial_delay_ms",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// PROVIDER
// ============================================================================

/// Remote chat-completions endpoint settings.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    pub api_endpoint: String,
    pub api_key: String,
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(
        rename = "request_timeout_ms",
        with = "duration_ms",
        default = "default_request_timeout"
    )]
    pub request_timeout: Duration,
}

fn default_temperature() -> f32 {
    0.1
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

impl ProviderConfig {
    pub fn new(
        api_endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            api_endpoint: api_endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            request_timeout: default_request_timeout(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_endpoint.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "api_endpoint".to_string(),
            });
        }
        let url = Url::parse(&self.api_endpoint)
            .map_err(|e| invalid("api_endpoint", &self.api_endpoint, &e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid(
                "api_endpoint",
                &self.api_endpoint,
                "scheme must be http or https",
            ));
        }
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "api_key".to_string(),
            });
        }
        if self.model.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "model".to_string(),
            });
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(invalid("temperature", self.temperature, "must be within 0.0..=2.0"));
        }
        if self.max_tokens == 0 {
            return Err(invalid("max_tokens", self.max_tokens, "must be > 0"));
        }
        if self.request_timeout.is_zero() {
            return Err(invalid("request_timeout_ms", 0, "must be > 0"));
        }
        Ok(())
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_endpoint", &self.api_endpoint)
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

// ============================================================================
// CACHE
// ============================================================================

/// Result cache policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    #[serde(rename = "default_ttl_ms", with = "duration_ms")]
    pub default_ttl: Duration,
    /// Shorter TTL for domains whose content changes often.
    #[serde(rename = "dynamic_ttl_ms", with = "duration_ms")]
    pub dynamic_ttl: Duration,
    /// Domains (suffix match) that get `dynamic_ttl`.
    #[serde(default)]
    pub dynamic_domains: Vec<String>,
    #[serde(rename = "sweep_interval_ms", with = "duration_ms")]
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(24 * 3600),
            dynamic_ttl: Duration::from_secs(3600),
            dynamic_domains: Vec::new(),
            sweep_interval: Duration::from_secs(3600),
        }
    }
}

impl CacheConfig {
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_dynamic_domains(mut self, ttl: Duration, domains: Vec<String>) -> Self {
        self.dynamic_ttl = ttl;
        self.dynamic_domains = domains;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// TTL to apply to a result for `domain` (already normalized).
    pub fn ttl_for(&self, domain: &str) -> Duration {
        let is_dynamic = self.dynamic_domains.iter().any(|d| {
            let d = crate::normalize_domain(d);
            domain == d || domain.ends_with(&format!(".{}", d))
        });
        if is_dynamic {
            self.dynamic_ttl
        } else {
            self.default_ttl
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sweep_interval.is_zero() {
            return Err(invalid("cache.sweep_interval_ms", 0, "must be > 0"));
        }
        Ok(())
    }
}

// ============================================================================
// ADMISSION
// ============================================================================

/// Admission queue settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    pub capacity: usize,
    #[serde(rename = "min_interval_ms", with = "duration_ms")]
    pub min_interval: Duration,
    pub max_retries: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            min_interval: Duration::from_secs(1),
            max_retries: 2,
        }
    }
}

impl QueueConfig {
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(invalid("queue.capacity", 0, "must be > 0"));
        }
        Ok(())
    }
}

/// Sliding-window limit on local callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    #[serde(rename = "window_ms", with = "duration_ms")]
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 30,
            window: Duration::from_secs(60),
        }
    }
}

impl RateLimitConfig {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_requests == 0 {
            return Err(invalid("rate_limit.max_requests", 0, "must be > 0"));
        }
        if self.window.is_zero() {
            return Err(invalid("rate_limit.window_ms", 0, "must be > 0"));
        }
        Ok(())
    }
}

// ============================================================================
// MASTER CONFIG
// ============================================================================

/// Complete configuration for an analyzer instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScamGuardConfig {
    pub provider: ProviderConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl ScamGuardConfig {
    /// Build a config with defaults for everything except the provider.
    pub fn new(provider: ProviderConfig) -> Self {
        Self {
            provider,
            retry: RetryConfig::default(),
            cache: CacheConfig::default(),
            queue: QueueConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: ScamGuardConfig = toml::from_str(contents).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_queue(mut self, queue: QueueConfig) -> Self {
        self.queue = queue;
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.provider.validate()?;
        self.retry.validate()?;
        self.cache.validate()?;
        self.queue.validate()?;
        self.rate_limit.validate()?;
        Ok(())
    }
}
