//! Monotonic counter.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A monotonically non-decreasing 64-bit counter.
///
/// Every mutation is a single atomic operation; readers never block writers.
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment by one.
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Add `delta`. Negative deltas are ignored so the value never decreases.
    pub fn add(&self, delta: i64) {
        if delta <= 0 {
            return;
        }
        self.value.fetch_add(delta as u64, Ordering::Relaxed);
    }

    /// Raise the counter to `value` if it is currently lower.
    pub fn raise_to(&self, value: u64) {
        self.value.fetch_max(value, Ordering::Relaxed);
    }

    /// Current value.
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Counter operations on a handle that may not exist.
///
/// Lets instrumentation hold `Option<Arc<Counter>>` without checking at
/// every call site.
pub trait OptionalCounter {
    fn inc(&self);
    fn add(&self, delta: i64);
    fn get(&self) -> u64;
}

impl OptionalCounter for Option<Arc<Counter>> {
    fn inc(&self) {
        if let Some(counter) = self {
            counter.inc();
        }
    }

    fn add(&self, delta: i64) {
        if let Some(counter) = self {
            counter.add(delta);
        }
    }

    fn get(&self) -> u64 {
        self.as_ref().map_or(0, |counter| counter.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_tracks_non_negative_deltas() {
        let counter = Counter::new();
        let deltas = [3, -5, 0, 7, -1, 1];
        let mut expected = 0u64;

        for delta in deltas {
            counter.add(delta);
            if delta > 0 {
                expected += delta as u64;
            }
            assert_eq!(counter.get(), expected);
        }

        counter.inc();
        assert_eq!(counter.get(), expected + 1);
    }

    #[test]
    fn test_raise_to_never_lowers() {
        let counter = Counter::new();
        counter.add(10);
        counter.raise_to(4);
        assert_eq!(counter.get(), 10);
        counter.raise_to(12);
        assert_eq!(counter.get(), 12);
    }

    #[test]
    fn test_missing_counter_is_noop() {
        let missing: Option<Arc<Counter>> = None;
        missing.inc();
        missing.add(5);
        assert_eq!(missing.get(), 0);

        let present = Some(Arc::new(Counter::new()));
        present.add(2);
        assert_eq!(OptionalCounter::get(&present), 2);
    }

    #[test]
    fn test_concurrent_increments() {
        let counter = Arc::new(Counter::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let c = counter.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        c.inc();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(counter.get(), 8000);
    }
}
