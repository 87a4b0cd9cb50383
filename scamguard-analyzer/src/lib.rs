//! scamguard Analyzer - Page Analysis Orchestrator
//!
//! The surface content extraction and the UI talk to:
//! - `analyze` with cache lookup, in-flight de-duplication, local rate
//!   limiting, admission queueing and retries
//! - `cache_stats`, `clear_cache`, cache persistence and the periodic sweep
//! - `test_connection` for the settings screen
//! - analysis history and user feedback

pub mod analyzer;
mod gate;
pub mod sweeper;
pub mod telemetry;

pub use analyzer::Analyzer;
pub use sweeper::spawn_cache_sweeper;
pub use telemetry::init_tracing;

pub use scamguard_admission::QueueStats;
pub use scamguard_core::{
    AnalysisRequest, AnalysisResult, ApiError, ApiErrorKind, FeedbackVerdict, RiskLevel,
    ScamGuardConfig, ScamGuardError, ScamGuardResult, ThreatKind,
};
pub use scamguard_llm::{ConnectionReport, ExecuteOptions};
pub use scamguard_storage::{CacheStats, FeedbackRecord, HistoryEntry};
