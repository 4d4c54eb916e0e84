//! Circuit breaker shared by network providers.
//!
//! HTTP 403 trips the breaker at once; repeated 429/5xx responses trip it
//! after `failure_threshold` consecutive failures. While open, providers
//! refuse requests until the cooldown has passed, so a fallback chain moves on
//! to the next source instead of hammering a blocked one.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Inner {
    tripped_at: Option<Instant>,
    consecutive_failures: u32,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    inner: Mutex<Inner>,
    cooldown: Duration,
    failure_threshold: u32,
}

impl Default for CircuitBreaker {
    /// 10-minute cooldown, trips after 3 consecutive failures.
    fn default() -> Self {
        Self::new(Duration::from_secs(10 * 60), 3)
    }
}

impl CircuitBreaker {
    pub fn new(cooldown: Duration, failure_threshold: u32) -> Self {
        Self {
            inner: Mutex::new(Inner {
                tripped_at: None,
                consecutive_failures: 0,
            }),
            cooldown,
            failure_threshold: failure_threshold.max(1),
        }
    }

    // A panic while holding the lock cannot leave the counters inconsistent.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether requests may go out; resets an expired trip.
    pub fn is_allowed(&self) -> bool {
        let mut inner = self.lock();
        match inner.tripped_at {
            None => true,
            Some(at) if at.elapsed() >= self.cooldown => {
                inner.tripped_at = None;
                inner.consecutive_failures = 0;
                true
            }
            Some(_) => false,
        }
    }

    pub fn record_success(&self) {
        self.lock().consecutive_failures = 0;
    }

    pub fn record_failure(&self) {
        let mut inner = self.lock();
        inner.consecutive_failures += 1;
        if inner.consecutive_failures >= self.failure_threshold {
            inner.tripped_at = Some(Instant::now());
        }
    }

    pub fn trip(&self) {
        self.lock().tripped_at = Some(Instant::now());
    }

    /// Remaining cooldown (zero when closed).
    pub fn remaining_cooldown(&self) -> Duration {
        match self.lock().tripped_at {
            None => Duration::ZERO,
            Some(at) => self.cooldown.saturating_sub(at.elapsed()),
        }
    }
}
