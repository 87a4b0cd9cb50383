//! scamguard Admission - Request Admission Control
//!
//! Provides the throttling primitives that sit in front of the network:
//! - Bounded FIFO admission queue with a minimum dequeue interval
//! - Sliding-window rate limiter for local callers

pub mod queue;
pub mod rate_limit;

pub use queue::{AnalysisQueue, QueueItem, QueueStats};
pub use rate_limit::SlidingWindowLimiter;
