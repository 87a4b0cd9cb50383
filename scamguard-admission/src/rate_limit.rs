//! Sliding-window limiter for local callers.
//!
//! Guards against a runaway caller flooding the analyzer; it does not model
//! the remote API's own limits.

use scamguard_core::RateLimitConfig;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// At most `max_requests` acquisitions in any trailing `window`.
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    config: RateLimitConfig,
    granted: Mutex<VecDeque<Instant>>,
}

impl SlidingWindowLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            granted: Mutex::new(VecDeque::with_capacity(config.max_requests as usize)),
            config,
        }
    }

    /// Take a slot, or return how long until the oldest one frees up.
    pub fn try_acquire(&self) -> Result<(), Duration> {
        let now = Instant::now();
        let mut granted = self.granted.lock().unwrap_or_else(|e| e.into_inner());
        prune(&mut granted, now, self.config.window);

        if granted.len() < self.config.max_requests as usize {
            granted.push_back(now);
            return Ok(());
        }
        let wait = granted
            .front()
            .map(|oldest| (*oldest + self.config.window).saturating_duration_since(now))
            .unwrap_or(self.config.window);
        Err(wait)
    }

    /// Slots free right now.
    pub fn available(&self) -> u32 {
        let mut granted = self.granted.lock().unwrap_or_else(|e| e.into_inner());
        prune(&mut granted, Instant::now(), self.config.window);
        self.config
            .max_requests
            .saturating_sub(granted.len() as u32)
    }

    pub fn reset(&self) {
        self.granted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }
}

/// Drop grants that have left the window.
fn prune(granted: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(oldest) = granted.front() {
        if now.saturating_duration_since(*oldest) >= window {
            granted.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max: u32, window_secs: u64) -> SlidingWindowLimiter {
        SlidingWindowLimiter::new(RateLimitConfig::new(max, Duration::from_secs(window_secs)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_allows_up_to_limit() {
        let limiter = limiter(3, 60);
        assert!(limiter.try_acquire().is_ok());
        assert!(limiter.try_acquire().is_ok());
        assert!(limiter.try_acquire().is_ok());
        assert_eq!(limiter.try_acquire(), Err(Duration::from_secs(60)));
        assert_eq!(limiter.available(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_slides() {
        let limiter = limiter(2, 10);
        limiter.try_acquire().unwrap();
        tokio::time::advance(Duration::from_secs(4)).await;
        limiter.try_acquire().unwrap();

        assert_eq!(limiter.try_acquire(), Err(Duration::from_secs(6)));

        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(limiter.try_acquire().is_ok());
        // second grant is still inside the window
        assert_eq!(limiter.try_acquire(), Err(Duration::from_secs(4)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_frees_all_slots() {
        let limiter = limiter(1, 60);
        limiter.try_acquire().unwrap();
        assert!(limiter.try_acquire().is_err());
        limiter.reset();
        assert_eq!(limiter.available(), 1);
    }
}
