//! Async front end for the admission queue.
//!
//! Each leader call takes a ticket in the queue and waits until its ticket
//! reaches the front and the rate gate is open. A ticket evicted by overflow
//! fails with `RATE_LIMITED` instead of waiting forever.

use scamguard_admission::{AnalysisQueue, QueueItem, QueueStats};
use scamguard_core::{ApiError, QueueConfig};
use scamguard_storage::CacheKey;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub(crate) type Ticket = QueueItem<CacheKey>;

#[derive(Debug)]
pub(crate) struct AdmissionGate {
    queue: Mutex<AnalysisQueue<CacheKey>>,
    changed: Notify,
    next_ticket: AtomicU64,
}

impl AdmissionGate {
    pub(crate) fn new(config: QueueConfig) -> Self {
        Self {
            queue: Mutex::new(AnalysisQueue::new(config)),
            changed: Notify::new(),
            next_ticket: AtomicU64::new(1),
        }
    }

    /// Queue a new ticket for `key` and wait for its turn.
    pub(crate) async fn admit(
        &self,
        key: &CacheKey,
        cancel: &CancellationToken,
    ) -> Result<Ticket, ApiError> {
        let id = format!("{}#{}", key, self.next_ticket.fetch_add(1, Ordering::Relaxed));
        self.lock().enqueue(id.clone(), key.clone());
        self.changed.notify_waiters();
        self.wait_turn(&id, cancel).await
    }

    /// Send a ticket back to the tail and wait again.
    ///
    /// `None` once the ticket has used up its queue retries.
    pub(crate) async fn readmit(
        &self,
        ticket: Ticket,
        cancel: &CancellationToken,
    ) -> Option<Result<Ticket, ApiError>> {
        let id = ticket.id.clone();
        if !self.lock().retry(ticket) {
            return None;
        }
        self.changed.notify_waiters();
        Some(self.wait_turn(&id, cancel).await)
    }

    pub(crate) fn stats(&self) -> QueueStats {
        self.lock().stats()
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    async fn wait_turn(&self, id: &str, cancel: &CancellationToken) -> Result<Ticket, ApiError> {
        let mut pending = PendingTicket {
            gate: self,
            id,
            armed: true,
        };

        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let wait = {
                let mut queue = self.lock();
                if !queue.contains(id) {
                    pending.armed = false;
                    warn!(ticket = id, "Ticket evicted from admission queue");
                    return Err(ApiError::rate_limited(
                        Some(queue.config().min_interval),
                        "too many pending analyses; request dropped from the queue",
                    ));
                }
                if queue.front_id() == Some(id) {
                    if let Some(ticket) = queue.dequeue() {
                        pending.armed = false;
                        drop(queue);
                        self.changed.notify_waiters();
                        debug!(ticket = id, retries = ticket.retries, "Admitted");
                        return Ok(ticket);
                    }
                }
                queue.time_until_next()
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ApiError::cancelled()),
                _ = &mut notified => {}
                _ = tokio::time::sleep(wait), if !wait.is_zero() => {}
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, AnalysisQueue<CacheKey>> {
        self.queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Pulls a still-queued ticket out when its waiter goes away, so an
/// abandoned ticket never blocks the front of the queue.
struct PendingTicket<'a> {
    gate: &'a AdmissionGate,
    id: &'a str,
    armed: bool,
}

impl Drop for PendingTicket<'_> {
    fn drop(&mut self) {
        if self.armed && self.gate.lock().remove(self.id).is_some() {
            self.gate.changed.notify_waiters();
        }
    }
}
