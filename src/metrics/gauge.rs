//! Signed gauge.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// A freely settable signed 64-bit value.
#[derive(Debug, Default)]
pub struct Gauge {
    value: AtomicI64,
}

impl Gauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, value: i64) {
        self.value.store(value, Ordering::Relaxed);
    }

    pub fn add(&self, delta: i64) {
        self.value.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn inc(&self) {
        self.add(1);
    }

    pub fn dec(&self) {
        self.add(-1);
    }

    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Gauge operations on a handle that may not exist.
pub trait OptionalGauge {
    fn set(&self, value: i64);
    fn add(&self, delta: i64);
    fn inc(&self);
    fn dec(&self);
    fn get(&self) -> i64;
}

impl OptionalGauge for Option<Arc<Gauge>> {
    fn set(&self, value: i64) {
        if let Some(gauge) = self {
            gauge.set(value);
        }
    }

    fn add(&self, delta: i64) {
        if let Some(gauge) = self {
            gauge.add(delta);
        }
    }

    fn inc(&self) {
        self.add(1);
    }

    fn dec(&self) {
        self.add(-1);
    }

    fn get(&self) -> i64 {
        self.as_ref().map_or(0, |gauge| gauge.get())
    }
}
