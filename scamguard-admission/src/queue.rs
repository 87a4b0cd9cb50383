//! Bounded FIFO admission queue with a minimum spacing between dequeues.
//!
//! Throttles how fast new analyses reach the network. It composes with the
//! executor's own retry loop: the queue spaces out new requests, the
//! executor retries in-flight ones.

use scamguard_core::QueueConfig;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// An admitted request waiting for its turn.
#[derive(Debug, Clone)]
pub struct QueueItem<T> {
    /// Caller-supplied id used for de-duplication.
    pub id: String,
    pub payload: T,
    pub enqueued_at: Instant,
    /// How many times this item went back through [`AnalysisQueue::retry`].
    pub retries: u32,
}

/// Running counters for queue activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Items accepted by `enqueue`.
    pub queued: u64,
    pub dequeued: u64,
    /// Items sent back by `retry`.
    pub retried: u64,
    /// Items refused by `retry` after exhausting their retries.
    pub failed: u64,
    /// Items evicted because the queue was full.
    pub dropped: u64,
}

/// Bounded FIFO with a dequeue rate gate.
///
/// Not internally synchronized; callers share it behind a lock.
#[derive(Debug)]
pub struct AnalysisQueue<T> {
    items: VecDeque<QueueItem<T>>,
    config: QueueConfig,
    last_dequeue: Option<Instant>,
    stats: QueueStats,
}

impl<T> AnalysisQueue<T> {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            items: VecDeque::with_capacity(config.capacity),
            config,
            last_dequeue: None,
            stats: QueueStats::default(),
        }
    }

    /// Append an item unless its id is already queued.
    ///
    /// At capacity the oldest item is evicted to make room.
    pub fn enqueue(&mut self, id: impl Into<String>, payload: T) -> bool {
        let id = id.into();
        if self.contains(&id) {
            debug!(id = %id, "Duplicate id rejected by queue");
            return false;
        }
        self.push(QueueItem {
            id,
            payload,
            enqueued_at: Instant::now(),
            retries: 0,
        });
        self.stats.queued += 1;
        true
    }

    /// Pop the front item if the minimum interval since the last dequeue
    /// has elapsed.
    pub fn dequeue(&mut self) -> Option<QueueItem<T>> {
        if self.items.is_empty() || !self.time_until_next().is_zero() {
            return None;
        }
        let item = self.items.pop_front()?;
        self.last_dequeue = Some(Instant::now());
        self.stats.dequeued += 1;
        debug!(id = %item.id, remaining = self.items.len(), "Dequeued item");
        Some(item)
    }

    /// Send an item back to the tail with one more retry counted.
    ///
    /// Returns false, and counts a failure, once the item has used
    /// `max_retries`; the caller must treat that as terminal.
    pub fn retry(&mut self, mut item: QueueItem<T>) -> bool {
        if item.retries >= self.config.max_retries {
            self.stats.failed += 1;
            warn!(id = %item.id, retries = item.retries, "Queue retries exhausted");
            return false;
        }
        if self.contains(&item.id) {
            return false;
        }
        item.retries += 1;
        self.stats.retried += 1;
        debug!(id = %item.id, retries = item.retries, "Requeued item");
        self.push(item);
        true
    }

    /// Time until the rate gate next opens; zero when it is open now.
    ///
    /// Does not look at whether anything is queued.
    pub fn time_until_next(&self) -> Duration {
        match self.last_dequeue {
            Some(last) => (last + self.config.min_interval).saturating_duration_since(Instant::now()),
            None => Duration::ZERO,
        }
    }

    /// Remove a queued item by id, e.g. when its caller gave up waiting.
    pub fn remove(&mut self, id: &str) -> Option<QueueItem<T>> {
        let index = self.items.iter().position(|item| item.id == id)?;
        self.items.remove(index)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|item| item.id == id)
    }

    pub fn front_id(&self) -> Option<&str> {
        self.items.front().map(|item| item.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn stats(&self) -> QueueStats {
        self.stats
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    fn push(&mut self, item: QueueItem<T>) {
        while self.items.len() >= self.config.capacity.max(1) {
            if let Some(evicted) = self.items.pop_front() {
                self.stats.dropped += 1;
                warn!(id = %evicted.id, "Queue full, evicted oldest item");
            }
        }
        self.items.push_back(item);
    }
}


// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================
