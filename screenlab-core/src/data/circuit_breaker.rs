//! Circuit breaker for price source rate limiting and IP bans.
//!
//! When the provider returns HTTP 403 (IP ban) or repeated 429 (rate limit),
//! the circuit breaker trips and refuses all subsequent requests for a cooldown
//! period (default 30 minutes).

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// State of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Normal operation: requests are allowed.
    Closed,
    /// Tripped: all requests are refused until cooldown expires.
    Open { tripped_at: Instant },
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
}

/// Circuit breaker that prevents hammering a provider after a ban or rate limit.
#[derive(Debug)]
pub struct CircuitBreaker {
    inner: Mutex<Inner>,
    cooldown: Duration,
    failure_threshold: u32,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given cooldown duration.
    pub fn new(cooldown: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
            }),
            cooldown,
            failure_threshold: 3,
        }
    }

    /// Default circuit breaker: 30-minute cooldown, trips after 3 consecutive failures.
    pub fn default_provider() -> Self {
        Self::new(Duration::from_secs(30 * 60))
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Check if requests are currently allowed.
    pub fn is_allowed(&self) -> bool {
        let mut inner = self.lock();
        match inner.state {
            BreakerState::Closed => true,
            BreakerState::Open { tripped_at } => {
                if tripped_at.elapsed() >= self.cooldown {
                    inner.state = BreakerState::Closed;
                    inner.consecutive_failures = 0;
                    tracing::info!("circuit breaker cooldown expired; requests allowed again");
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Record a successful request: resets the failure counter.
    pub fn record_success(&self) {
        self.lock().consecutive_failures = 0;
    }

    /// Record a failure. If the failure count reaches the threshold, trip the breaker.
    pub fn record_failure(&self) {
        let mut inner = self.lock();
        inner.consecutive_failures += 1;
        if inner.consecutive_failures >= self.failure_threshold {
            inner.state = BreakerState::Open {
                tripped_at: Instant::now(),
            };
            tracing::warn!(
                failures = inner.consecutive_failures,
                "circuit breaker tripped after consecutive failures"
            );
        }
    }

    /// Immediately trip the breaker (for 403 Forbidden / IP ban).
    pub fn trip(&self) {
        self.lock().state = BreakerState::Open {
            tripped_at: Instant::now(),
        };
        tracing::warn!("circuit breaker tripped");
    }

    /// Remaining cooldown time (zero if not tripped).
    pub fn remaining_cooldown(&self) -> Duration {
        match self.lock().state {
            BreakerState::Closed => Duration::ZERO,
            BreakerState::Open { tripped_at } => self.cooldown.saturating_sub(tripped_at.elapsed()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn fresh_breaker_allows_and_has_no_cooldown() {
        let breaker = CircuitBreaker::default_provider();
        assert!(breaker.is_allowed());
        assert_eq!(breaker.remaining_cooldown(), Duration::ZERO);
    }

    #[test]
    fn only_an_unbroken_failure_streak_trips() {
        let breaker = CircuitBreaker::new(HOUR);
        for _ in 0..2 {
            breaker.record_failure();
            breaker.record_failure();
            breaker.record_success();
        }
        assert!(breaker.is_allowed());

        breaker.record_failure();
        breaker.record_failure();
        breaker.record_failure();
        assert!(!breaker.is_allowed());
        let left = breaker.remaining_cooldown();
        assert!(left > HOUR - Duration::from_secs(60) && left <= HOUR);
    }

    #[test]
    fn success_does_not_close_an_open_breaker() {
        let breaker = CircuitBreaker::new(HOUR);
        breaker.trip();
        breaker.record_success();
        assert!(!breaker.is_allowed());
    }

    #[test]
    fn zero_cooldown_reopens_with_a_clean_streak() {
        let breaker = CircuitBreaker::new(Duration::ZERO);
        breaker.record_failure();
        breaker.record_failure();
        breaker.trip();

        // Expiry also forgets the failures recorded before the trip
        assert!(breaker.is_allowed());
        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.lock().state, BreakerState::Closed);
    }

    #[test]
    fn failures_from_many_threads_add_up() {
        let breaker = Arc::new(CircuitBreaker::new(HOUR));
        let workers: Vec<_> = (0..3)
            .map(|_| {
                let breaker = Arc::clone(&breaker);
                thread::spawn(move || breaker.record_failure())
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }
        assert!(!breaker.is_allowed());
    }

    #[test]
    fn keeps_working_after_a_panic_while_locked() {
        let breaker = Arc::new(CircuitBreaker::new(HOUR));
        let held = Arc::clone(&breaker);
        let crashed = thread::spawn(move || {
            let _guard = held.inner.lock().unwrap();
            panic!("worker died");
        })
        .join();
        assert!(crashed.is_err());
        assert!(breaker.inner.is_poisoned());

        assert!(breaker.is_allowed());
        breaker.trip();
        assert!(!breaker.is_allowed());
        assert!(breaker.remaining_cooldown() > Duration::ZERO);
    }
}
