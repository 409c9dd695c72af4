//! Bucketed histogram with percentile estimation.
//!
//! # Design Decisions
//! - Bucket `i` counts observations whose first matching upper bound is
//!   `bounds[i]`; the extra trailing slot is the implicit `+Inf` bucket
//! - The running sum is fixed point: whole seconds and the nanosecond
//!   remainder in two atomics, both updated with saturating adds, so large
//!   observations neither wrap nor lose the mean
//! - Percentiles are estimates bounded by bucket width

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Default ladder, in seconds: 1ms up to 10s.
pub const DEFAULT_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

const SUM_SCALE: f64 = 1_000_000_000.0;

/// A distribution of non-negative observations.
#[derive(Debug)]
pub struct Histogram {
    bounds: Vec<f64>,
    counts: Vec<AtomicU64>,
    sum_secs: AtomicU64,
    sum_nanos: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    /// Create a histogram over the given upper bounds.
    ///
    /// Non-finite bounds are dropped and the rest sorted and de-duplicated,
    /// so construction never fails. An empty ladder falls back to
    /// [`DEFAULT_BUCKETS`].
    pub fn new(buckets: Vec<f64>) -> Self {
        let bounds = sanitize_buckets(buckets);
        let counts = (0..=bounds.len()).map(|_| AtomicU64::new(0)).collect();
        Self {
            bounds,
            counts,
            sum_secs: AtomicU64::new(0),
            sum_nanos: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    pub fn with_default_buckets() -> Self {
        Self::new(DEFAULT_BUCKETS.to_vec())
    }

    /// Record one observation. Negative (and NaN) values count as zero.
    pub fn observe(&self, value: f64) {
        let value = if value > 0.0 { value } else { 0.0 };

        let slot = self
            .bounds
            .iter()
            .position(|bound| value <= *bound)
            .unwrap_or(self.bounds.len());
        self.counts[slot].fetch_add(1, Ordering::Relaxed);

        self.count.fetch_add(1, Ordering::Relaxed);

        let whole = value.trunc();
        // Float-to-int casts saturate; +Inf lands on u64::MAX seconds.
        saturating_add(&self.sum_secs, whole as u64);
        saturating_add(&self.sum_nanos, ((value - whole) * SUM_SCALE).round() as u64);
    }

    /// Record a duration in seconds.
    pub fn observe_duration(&self, elapsed: Duration) {
        self.observe(elapsed.as_secs_f64());
    }

    /// Estimate the `p` quantile, `p` in `[0, 1]`.
    ///
    /// Returns the upper bound of the first bucket whose cumulative count
    /// reaches `max(1, floor(count * p))`. Returns 0 when nothing has been
    /// observed or `p` is out of range.
    pub fn percentile(&self, p: f64) -> f64 {
        if !(0.0..=1.0).contains(&p) {
            return 0.0;
        }
        let count = self.count();
        if count == 0 {
            return 0.0;
        }

        let target = ((count as f64 * p).floor() as u64).max(1);
        let mut cumulative = 0u64;
        for (bound, slot) in self.bounds.iter().zip(&self.counts) {
            cumulative += slot.load(Ordering::Relaxed);
            if cumulative >= target {
                return *bound;
            }
        }

        // All remaining mass sits in +Inf.
        self.bounds.last().copied().unwrap_or(0.0)
    }

    pub fn p50(&self) -> f64 {
        self.percentile(0.5)
    }

    pub fn p90(&self) -> f64 {
        self.percentile(0.9)
    }

    pub fn p99(&self) -> f64 {
        self.percentile(0.99)
    }

    /// Sum of all observations.
    pub fn sum(&self) -> f64 {
        self.sum_secs.load(Ordering::Relaxed) as f64
            + self.sum_nanos.load(Ordering::Relaxed) as f64 / SUM_SCALE
    }

    /// Number of observations.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum() / count as f64
        }
    }

    /// Explicit upper bounds (the `+Inf` bucket is implicit).
    pub fn buckets(&self) -> &[f64] {
        &self.bounds
    }

    /// Per-bucket (non-cumulative) counts, `buckets().len() + 1` entries.
    pub fn bucket_counts(&self) -> Vec<u64> {
        self.counts
            .iter()
            .map(|slot| slot.load(Ordering::Relaxed))
            .collect()
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::with_default_buckets()
    }
}

fn saturating_add(cell: &AtomicU64, delta: u64) {
    if delta == 0 {
        return;
    }
    // The closure always returns Some, so this cannot fail.
    let _ = cell.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
        Some(current.saturating_add(delta))
    });
}

fn sanitize_buckets(mut buckets: Vec<f64>) -> Vec<f64> {
    buckets.retain(|b| b.is_finite());
    buckets.sort_by(f64::total_cmp);
    buckets.dedup();
    if buckets.is_empty() {
        DEFAULT_BUCKETS.to_vec()
    } else {
        buckets
    }
}

/// Histogram operations on a handle that may not exist.
pub trait OptionalHistogram {
    fn observe(&self, value: f64);
    fn observe_duration(&self, elapsed: Duration);
    fn percentile(&self, p: f64) -> f64;
    fn count(&self) -> u64;
}

impl OptionalHistogram for Option<Arc<Histogram>> {
    fn observe(&self, value: f64) {
        if let Some(histogram) = self {
            histogram.observe(value);
        }
    }

    fn observe_duration(&self, elapsed: Duration) {
        if let Some(histogram) = self {
            histogram.observe_duration(elapsed);
        }
    }

    fn percentile(&self, p: f64) -> f64 {
        self.as_ref().map_or(0.0, |histogram| histogram.percentile(p))
    }

    fn count(&self) -> u64 {
        self.as_ref().map_or(0, |histogram| histogram.count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_counts_sum_to_count() {
        let histogram = Histogram::with_default_buckets();
        for _ in 0..500 {
            histogram.observe(fastrand::f64() * 20.0);
        }
        histogram.observe(-3.0);
        histogram.observe(f64::NAN);

        let counts = histogram.bucket_counts();
        assert_eq!(counts.len(), DEFAULT_BUCKETS.len() + 1);
        assert_eq!(counts.iter().sum::<u64>(), histogram.count());
        assert_eq!(histogram.count(), 502);
    }

    #[test]
    fn test_sum_and_mean() {
        let histogram = Histogram::with_default_buckets();
        for value in [0.25, 0.5, 1.75, 3.5] {
            histogram.observe(value);
        }
        assert!((histogram.sum() - 6.0).abs() < 1e-9);
        assert!((histogram.mean() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_large_observations_keep_the_mean() {
        let histogram = Histogram::with_default_buckets();
        histogram.observe(2e10);
        histogram.observe(2e10);
        assert_eq!(histogram.count(), 2);
        assert_eq!(histogram.sum(), 4e10);
        assert_eq!(histogram.mean(), 2e10);

        histogram.observe(3e10 + 0.25);
        assert!((histogram.sum() - (7e10 + 0.25)).abs() < 1e-3);
    }

    #[test]
    fn test_infinite_observation_saturates_sum() {
        let histogram = Histogram::new(vec![1.0]);
        histogram.observe(f64::INFINITY);
        histogram.observe(f64::INFINITY);
        assert_eq!(histogram.count(), 2);
        assert_eq!(histogram.sum(), u64::MAX as f64);
        assert_eq!(histogram.bucket_counts(), vec![0, 2]);
    }

    #[test]
    fn test_negative_observation_lands_in_first_bucket() {
        let histogram = Histogram::new(vec![1.0, 2.0]);
        histogram.observe(-7.0);
        assert_eq!(histogram.bucket_counts(), vec![1, 0, 0]);
        assert_eq!(histogram.sum(), 0.0);
    }

    #[test]
    fn test_bound_is_inclusive_and_overflow_goes_to_inf() {
        let histogram = Histogram::new(vec![1.0, 2.0]);
        histogram.observe(1.0);
        histogram.observe(2.5);
        assert_eq!(histogram.bucket_counts(), vec![1, 0, 1]);
    }

    #[test]
    fn test_median_of_uniform_distribution() {
        let bounds: Vec<f64> = (1..=10).map(f64::from).collect();
        let histogram = Histogram::new(bounds);
        for bucket in 0..10 {
            for _ in 0..10 {
                histogram.observe(bucket as f64 + 0.5);
            }
        }

        let true_median = 5.0;
        let estimate = histogram.p50();
        assert!((estimate - true_median).abs() <= 1.0, "estimate {estimate}");
        assert_eq!(histogram.p90(), 9.0);
        assert_eq!(histogram.p99(), 10.0);
    }

    #[test]
    fn test_percentile_edge_cases() {
        let histogram = Histogram::new(vec![1.0, 2.0]);
        assert_eq!(histogram.percentile(0.5), 0.0);

        histogram.observe(100.0);
        assert_eq!(histogram.percentile(-0.1), 0.0);
        assert_eq!(histogram.percentile(1.5), 0.0);
        // Everything sits in +Inf: fall back to the last explicit bound.
        assert_eq!(histogram.percentile(0.5), 2.0);
        // p = 0 still targets the first observation.
        assert_eq!(histogram.percentile(0.0), 2.0);
    }

    #[test]
    fn test_bucket_sanitizing() {
        let histogram = Histogram::new(vec![5.0, f64::INFINITY, 1.0, 5.0, f64::NAN]);
        assert_eq!(histogram.buckets(), &[1.0, 5.0]);

        let fallback = Histogram::new(Vec::new());
        assert_eq!(fallback.buckets(), DEFAULT_BUCKETS);
    }

    #[test]
    fn test_observe_duration() {
        let histogram = Histogram::with_default_buckets();
        histogram.observe_duration(Duration::from_millis(20));
        assert_eq!(histogram.p50(), 0.025);
        assert!((histogram.sum() - 0.02).abs() < 1e-9);
    }

    #[test]
    fn test_missing_histogram_is_noop() {
        let missing: Option<Arc<Histogram>> = None;
        missing.observe(1.0);
        assert_eq!(missing.count(), 0);
        assert_eq!(missing.percentile(0.5), 0.0);
    }
}
