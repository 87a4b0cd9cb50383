//! Error types for scamguard operations

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Closed set of failure kinds for a remote analysis call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiErrorKind {
    /// No response was received
    Network,
    /// The attempt timed out or was aborted
    Timeout,
    RateLimited,
    /// Credentials were rejected
    Auth,
    /// Endpoint answered with something that is not a usable completion
    InvalidResponse,
    Server,
    Unknown,
}

impl ApiErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiErrorKind::Network => "NETWORK",
            ApiErrorKind::Timeout => "TIMEOUT",
            ApiErrorKind::RateLimited => "RATE_LIMITED",
            ApiErrorKind::Auth => "AUTH",
            ApiErrorKind::InvalidResponse => "INVALID_RESPONSE",
            ApiErrorKind::Server => "SERVER",
            ApiErrorKind::Unknown => "UNKNOWN",
        }
    }

    /// Failures the user cannot fix by retrying without changing settings.
    pub fn is_configuration_problem(&self) -> bool {
        matches!(self, ApiErrorKind::Auth | ApiErrorKind::InvalidResponse)
    }

    /// Failures that usually go away by trying again.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ApiErrorKind::Network
                | ApiErrorKind::Timeout
                | ApiErrorKind::Server
                | ApiErrorKind::RateLimited
        )
    }
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Typed failure of a remote analysis call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub status: Option<u16>,
    pub retryable: bool,
    pub retry_after: Option<Duration>,
    pub message: String,
}

impl ApiError {
    pub fn new(kind: ApiErrorKind, retryable: bool, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            retryable,
            retry_after: None,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Network, true, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Timeout, true, message)
    }

    /// Caller-initiated abort. Terminal, never retried.
    pub fn cancelled() -> Self {
        Self::new(ApiErrorKind::Timeout, false, "request cancelled")
    }

    pub fn rate_limited(retry_after: Option<Duration>, message: impl Into<String>) -> Self {
        Self {
            retry_after,
            ..Self::new(ApiErrorKind::RateLimited, true, message)
        }
    }

    pub fn auth(status: u16, message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Auth, false, message).with_status(status)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::InvalidResponse, false, message)
    }

    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Server, true, message).with_status(status)
    }

    pub fn unknown(status: u16, message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Unknown, false, message).with_status(status)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn is_configuration_problem(&self) -> bool {
        self.kind.is_configuration_problem()
    }
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to parse configuration: {reason}")]
    Parse { reason: String },
}

/// Persistent storage errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Serialization failed for {key}: {reason}")]
    Serialization { key: String, reason: String },

    #[error("Backend failure on {key}: {reason}")]
    Backend { key: String, reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Master error type for all scamguard errors.
#[derive(Debug, Clone, Error)]
pub enum ScamGuardError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type alias for scamguard operations.
pub type ScamGuardResult<T> = Result<T, ScamGuardError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display_includes_kind_and_message() {
        let err = ApiError::server(503, "upstream overloaded");
        let msg = format!("{}", err);
        assert!(msg.contains("SERVER"));
        assert!(msg.contains("upstream overloaded"));
        assert_eq!(err.status, Some(503));
        assert!(err.retryable);
    }

    #[test]
    fn test_api_error_retryability_per_kind() {
        assert!(ApiError::network("down").retryable);
        assert!(ApiError::timeout("slow").retryable);
        assert!(ApiError::rate_limited(None, "slow down").retryable);
        assert!(!ApiError::auth(401, "bad key").retryable);
        assert!(!ApiError::invalid_response("html").retryable);
        assert!(!ApiError::unknown(404, "not found").retryable);
    }

    #[test]
    fn test_cancelled_is_terminal_timeout() {
        let err = ApiError::cancelled();
        assert_eq!(err.kind, ApiErrorKind::Timeout);
        assert!(!err.retryable);
    }

    #[test]
    fn test_kind_presentation_groups() {
        assert!(ApiErrorKind::Auth.is_configuration_problem());
        assert!(ApiErrorKind::InvalidResponse.is_configuration_problem());
        assert!(!ApiErrorKind::Server.is_configuration_problem());
        for kind in [
            ApiErrorKind::Network,
            ApiErrorKind::Timeout,
            ApiErrorKind::Server,
            ApiErrorKind::RateLimited,
        ] {
            assert!(kind.is_transient());
        }
        assert!(!ApiErrorKind::Unknown.is_transient());
    }

    #[test]
    fn test_rate_limited_carries_hint() {
        let err = ApiError::rate_limited(Some(Duration::from_secs(2)), "429");
        assert_eq!(err.retry_after, Some(Duration::from_secs(2)));
        assert_eq!(err.kind.to_string(), "RATE_LIMITED");
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "api_endpoint".to_string(),
            value: "bad".to_string(),
            reason: "must be url".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("api_endpoint"));
        assert!(msg.contains("bad"));
        assert!(msg.contains("must be url"));
    }

    #[test]
    fn test_master_error_from_variants() {
        let api = ScamGuardError::from(ApiError::network("x"));
        assert!(matches!(api, ScamGuardError::Api(_)));

        let config = ScamGuardError::from(ConfigError::MissingRequired {
            field: "api_key".to_string(),
        });
        assert!(matches!(config, ScamGuardError::Config(_)));

        let storage = ScamGuardError::from(StorageError::LockPoisoned);
        assert!(matches!(storage, ScamGuardError::Storage(_)));
    }
}
