//! scamguard Core - Analysis Types
//!
//! Pure data structures with no I/O. All other crates depend on this.
//! This crate contains request/verdict types, the error taxonomy and
//! configuration - no network or storage logic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use url::Url;

pub mod config;
pub mod enums;
pub mod error;

pub use config::{
    CacheConfig, ProviderConfig, QueueConfig, RateLimitConfig, RetryConfig, ScamGuardConfig,
};
pub use enums::{FeedbackVerdict, RiskLevel, RiskLevelParseError, ThreatKind};
pub use error::{
    ApiError, ApiErrorKind, ConfigError, ScamGuardError, ScamGuardResult, StorageError,
};

// ============================================================================
// LIMITS
// ============================================================================

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Longest content sample carried by a request.
pub const MAX_CONTENT_SAMPLE_CHARS: usize = 5000;

/// Longest verbatim passage (and passage reason) kept in a result.
pub const MAX_PASSAGE_CHARS: usize = 200;

/// Most passages kept in a result.
pub const MAX_PASSAGES: usize = 20;

/// Confidence used when the model gives none or a non-numeric one.
pub const DEFAULT_CONFIDENCE: f32 = 0.5;

/// Explanation used when the model gives none.
pub const PLACEHOLDER_EXPLANATION: &str = "No explanation provided.";

// ============================================================================
// TEXT HELPERS
// ============================================================================

/// Truncate to at most `max` characters, respecting char boundaries.
pub fn truncate_chars(input: &str, max: usize) -> String {
    match input.char_indices().nth(max) {
        Some((idx, _)) => input[..idx].to_string(),
        None => input.to_string(),
    }
}

/// Lower-case a domain and strip one leading `www.`.
pub fn normalize_domain(domain: &str) -> String {
    let lowered = domain.trim().to_lowercase();
    match lowered.strip_prefix("www.") {
        Some(rest) => rest.to_string(),
        None => lowered,
    }
}

// ============================================================================
// REQUEST
// ============================================================================

/// Description of a page to analyze.
///
/// Built once by the content-extraction side and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// URL or bare domain of the page.
    target: String,
    /// Visible text sample, bounded to `MAX_CONTENT_SAMPLE_CHARS`.
    content_sample: String,
    suspicious_links: Vec<String>,
    url_flags: Vec<String>,
    form_flags: Vec<String>,
}

impl AnalysisRequest {
    pub fn new(target: impl Into<String>, content: &str) -> Self {
        Self {
            target: target.into(),
            content_sample: truncate_chars(content, MAX_CONTENT_SAMPLE_CHARS),
            suspicious_links: Vec::new(),
            url_flags: Vec::new(),
            form_flags: Vec::new(),
        }
    }

    pub fn with_suspicious_links(mut self, links: Vec<String>) -> Self {
        self.suspicious_links = links;
        self
    }

    pub fn with_url_flags(mut self, flags: Vec<String>) -> Self {
        self.url_flags = flags;
        self
    }

    pub fn with_form_flags(mut self, flags: Vec<String>) -> Self {
        self.form_flags = flags;
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn content_sample(&self) -> &str {
        &self.content_sample
    }

    pub fn suspicious_links(&self) -> &[String] {
        &self.suspicious_links
    }

    pub fn url_flags(&self) -> &[String] {
        &self.url_flags
    }

    pub fn form_flags(&self) -> &[String] {
        &self.form_flags
    }

    /// Host part of the target, or the target itself when it is not a URL.
    ///
    /// Not normalized; cache key derivation does that.
    pub fn domain(&self) -> String {
        if let Ok(url) = Url::parse(&self.target) {
            if let Some(host) = url.host_str() {
                return host.to_string();
            }
        }
        let raw = self.target.trim();
        let end = raw.find(['/', ':', '?', '#']).unwrap_or(raw.len());
        raw[..end].to_string()
    }
}

// ============================================================================
// RESULT
// ============================================================================

/// A passage of page text the model singled out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuspiciousPassage {
    /// Verbatim page text, at most `MAX_PASSAGE_CHARS`.
    pub text: String,
    pub labels: BTreeSet<ThreatKind>,
    pub confidence: f32,
    pub reason: String,
}

/// Validated verdict for one page.
///
/// `threats` only ever holds recognized tags; the parser drops the rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub risk_level: RiskLevel,
    pub threats: BTreeSet<ThreatKind>,
    pub explanation: String,
    /// Always within `[0.0, 1.0]`.
    pub confidence: f32,
    /// Validation instant, not the remote call instant.
    pub timestamp: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suspicious_passages: Option<Vec<SuspiciousPassage>>,
}

impl AnalysisResult {
    pub fn new(risk_level: RiskLevel, explanation: impl Into<String>, confidence: f32) -> Self {
        Self {
            risk_level,
            threats: BTreeSet::new(),
            explanation: explanation.into(),
            confidence: clamp_confidence(confidence),
            timestamp: Utc::now(),
            suspicious_passages: None,
        }
    }

    pub fn with_threats(mut self, threats: impl IntoIterator<Item = ThreatKind>) -> Self {
        self.threats = threats.into_iter().collect();
        self
    }

    pub fn with_passages(mut self, passages: Vec<SuspiciousPassage>) -> Self {
        self.suspicious_passages = Some(passages);
        self
    }

    /// A verdict worth warning the user about (MEDIUM or worse).
    pub fn is_threat(&self) -> bool {
        self.risk_level.is_at_least(RiskLevel::Medium)
    }
}

/// Clamp into `[0.0, 1.0]`; NaN becomes the default confidence.
pub fn clamp_confidence(value: f32) -> f32 {
    if value.is_nan() {
        DEFAULT_CONFIDENCE
    } else {
        value.clamp(0.0, 1.0)
    }
}


// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================
