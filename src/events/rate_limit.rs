//! Token bucket admission control for the hub's dequeue path.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Source of monotonic time for the limiter.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock for deterministic tests.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A token bucket whose capacity and refill rate are both `rate` tokens
/// per second, allowing a burst of one second's worth of events.
pub struct TokenBucket {
    capacity: f64,
    refill_rate: f64,
    tokens: f64,
    last_refill: Instant,
    clock: Arc<dyn Clock>,
}

impl TokenBucket {
    pub fn new(rate: u32, clock: Arc<dyn Clock>) -> Self {
        let capacity = f64::from(rate);
        Self {
            capacity,
            refill_rate: capacity,
            tokens: capacity,
            last_refill: clock.now(),
            clock,
        }
    }

    /// Take one token if available.
    pub fn try_acquire(&mut self) -> bool {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Whole tokens currently available.
    pub fn available(&mut self) -> u64 {
        self.refill();
        self.tokens as u64
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    fn refill(&mut self) {
        let now = self.clock.now();
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }
}

impl std::fmt::Debug for TokenBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBucket")
            .field("capacity", &self.capacity)
            .field("refill_rate", &self.refill_rate)
            .field("tokens", &self.tokens)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_then_exhaustion() {
        let clock = Arc::new(ManualClock::new());
        let mut bucket = TokenBucket::new(5, clock.clone());

        let admitted = (0..20).filter(|_| bucket.try_acquire()).count();
        assert_eq!(admitted, 5);
        assert!(!bucket.try_acquire());
    }

    #[test]
    fn test_refill_is_proportional_and_capped() {
        let clock = Arc::new(ManualClock::new());
        let mut bucket = TokenBucket::new(10, clock.clone());
        while bucket.try_acquire() {}

        clock.advance(Duration::from_millis(300));
        assert_eq!(bucket.available(), 3);

        clock.advance(Duration::from_secs(60));
        assert_eq!(bucket.available(), 10);
    }

    #[test]
    fn test_sustained_rate_matches_limit() {
        let clock = Arc::new(ManualClock::new());
        let mut bucket = TokenBucket::new(100, clock.clone());
        while bucket.try_acquire() {}

        // 1000 attempts per simulated second for 5 seconds.
        let mut admitted = 0;
        for _ in 0..5000 {
            clock.advance(Duration::from_millis(1));
            if bucket.try_acquire() {
                admitted += 1;
            }
        }
        assert!((495..=505).contains(&admitted), "admitted {admitted}");
    }
}
