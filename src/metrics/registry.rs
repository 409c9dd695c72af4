//! Metric registry: canonical owner of every metric instance.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, PoisonError, RwLock};

use super::counter::Counter;
use super::export::{CounterSample, GaugeSample, HistogramSample, MetricsSnapshot};
use super::gauge::Gauge;
use super::histogram::{Histogram, DEFAULT_BUCKETS};
use super::labels::{Labels, MetricKey};

/// Owns every registered metric, deduplicated by name + label set.
///
/// Each metric kind lives in its own map behind its own lock. Names are not
/// checked across kinds: a counter and a gauge may share a name and are
/// tracked independently.
#[derive(Debug)]
pub struct Registry {
    counters: RwLock<HashMap<MetricKey, Arc<Counter>>>,
    gauges: RwLock<HashMap<MetricKey, Arc<Gauge>>>,
    histograms: RwLock<HashMap<MetricKey, Arc<Histogram>>>,
    default_buckets: Vec<f64>,
}

impl Registry {
    pub fn new() -> Self {
        Self::with_default_buckets(DEFAULT_BUCKETS.to_vec())
    }

    /// Create a registry whose histograms default to `buckets`.
    pub fn with_default_buckets(buckets: Vec<f64>) -> Self {
        Self {
            counters: RwLock::new(HashMap::new()),
            gauges: RwLock::new(HashMap::new()),
            histograms: RwLock::new(HashMap::new()),
            default_buckets: buckets,
        }
    }

    /// Get or create the counter identified by `name` and `labels`.
    pub fn register_counter(&self, name: &str, labels: &Labels) -> Arc<Counter> {
        get_or_create(&self.counters, MetricKey::new(name, labels), Counter::new)
    }

    /// Get or create the gauge identified by `name` and `labels`.
    pub fn register_gauge(&self, name: &str, labels: &Labels) -> Arc<Gauge> {
        get_or_create(&self.gauges, MetricKey::new(name, labels), Gauge::new)
    }

    /// Get or create a histogram.
    ///
    /// `buckets` only applies on first creation; an existing histogram keeps
    /// the ladder it was created with.
    pub fn register_histogram(
        &self,
        name: &str,
        labels: &Labels,
        buckets: Option<Vec<f64>>,
    ) -> Arc<Histogram> {
        get_or_create(&self.histograms, MetricKey::new(name, labels), || {
            Histogram::new(buckets.unwrap_or_else(|| self.default_buckets.clone()))
        })
    }

    /// Number of registered metrics across all kinds.
    pub fn len(&self) -> usize {
        read_len(&self.counters) + read_len(&self.gauges) + read_len(&self.histograms)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every registered metric.
    ///
    /// Handles already given out keep working but are no longer exported.
    pub fn reset(&self) {
        self.counters.write().unwrap_or_else(PoisonError::into_inner).clear();
        self.gauges.write().unwrap_or_else(PoisonError::into_inner).clear();
        self.histograms.write().unwrap_or_else(PoisonError::into_inner).clear();
        tracing::debug!("Metrics registry reset");
    }

    /// Snapshot every metric as it reads right now.
    ///
    /// Each metric is internally consistent; there is no atomicity across
    /// metrics.
    pub fn export(&self) -> MetricsSnapshot {
        let mut snapshot = MetricsSnapshot::default();

        for (key, counter) in self.counters.read().unwrap_or_else(PoisonError::into_inner).iter() {
            snapshot.counters.insert(
                key.identity(),
                CounterSample::new(&key.name, key.labels.clone(), counter.get()),
            );
        }

        for (key, gauge) in self.gauges.read().unwrap_or_else(PoisonError::into_inner).iter() {
            snapshot.gauges.insert(
                key.identity(),
                GaugeSample::new(&key.name, key.labels.clone(), gauge.get()),
            );
        }

        for (key, histogram) in self.histograms.read().unwrap_or_else(PoisonError::into_inner).iter() {
            snapshot.histograms.insert(
                key.identity(),
                HistogramSample::from_histogram(&key.name, key.labels.clone(), histogram),
            );
        }

        snapshot
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

fn get_or_create<K, T, F>(map: &RwLock<HashMap<K, Arc<T>>>, key: K, create: F) -> Arc<T>
where
    K: Eq + Hash,
    F: FnOnce() -> T,
{
    if let Some(existing) = map.read().unwrap_or_else(PoisonError::into_inner).get(&key) {
        return existing.clone();
    }

    let mut guard = map.write().unwrap_or_else(PoisonError::into_inner);
    // Another caller may have created it between the two locks.
    guard
        .entry(key)
        .or_insert_with(|| Arc::new(create()))
        .clone()
}

fn read_len<V>(map: &RwLock<HashMap<MetricKey, V>>) -> usize {
    map.read().unwrap_or_else(PoisonError::into_inner).len()
}
