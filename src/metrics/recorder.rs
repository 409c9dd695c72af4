//! Bridge from the `metrics` facade into a [`Registry`].
//!
//! Code instrumented with `metrics::counter!` and friends records into the
//! registry once a [`RegistryRecorder`] is installed, so both styles end up
//! in the same export.

use std::sync::Arc;

use metrics::{
    CounterFn, GaugeFn, HistogramFn, Key, KeyName, Metadata, Recorder, SharedString, Unit,
};

use super::counter::Counter;
use super::gauge::Gauge;
use super::histogram::Histogram;
use super::labels::Labels;
use super::registry::Registry;

#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    #[error("a global metrics recorder is already installed")]
    AlreadyInstalled,
}

/// `metrics::Recorder` backed by a shared [`Registry`].
#[derive(Debug, Clone)]
pub struct RegistryRecorder {
    registry: Arc<Registry>,
}

impl RegistryRecorder {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }
}

/// Install a [`RegistryRecorder`] as the process-wide `metrics` recorder.
pub fn install(registry: Arc<Registry>) -> Result<(), RecorderError> {
    metrics::set_global_recorder(RegistryRecorder::new(registry))
        .map_err(|_| RecorderError::AlreadyInstalled)?;
    tracing::info!("Metrics facade recorder installed");
    Ok(())
}

fn labels_of(key: &Key) -> Labels {
    key.labels()
        .map(|label| (label.key().to_string(), label.value().to_string()))
        .collect()
}

impl Recorder for RegistryRecorder {
    // Descriptions and units are not part of the export format.
    fn describe_counter(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
    fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
    fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn register_counter(&self, key: &Key, _metadata: &Metadata<'_>) -> metrics::Counter {
        let counter = self.registry.register_counter(key.name(), &labels_of(key));
        metrics::Counter::from_arc(Arc::new(CounterHandle(counter)))
    }

    fn register_gauge(&self, key: &Key, _metadata: &Metadata<'_>) -> metrics::Gauge {
        let gauge = self.registry.register_gauge(key.name(), &labels_of(key));
        metrics::Gauge::from_arc(Arc::new(GaugeHandle(gauge)))
    }

    fn register_histogram(&self, key: &Key, _metadata: &Metadata<'_>) -> metrics::Histogram {
        let histogram = self.registry.register_histogram(key.name(), &labels_of(key), None);
        metrics::Histogram::from_arc(Arc::new(HistogramHandle(histogram)))
    }
}

struct CounterHandle(Arc<Counter>);

impl CounterFn for CounterHandle {
    fn increment(&self, value: u64) {
        self.0.add(i64::try_from(value).unwrap_or(i64::MAX));
    }

    fn absolute(&self, value: u64) {
        self.0.raise_to(value);
    }
}

// The facade speaks f64; registry gauges are integers, so values truncate.
struct GaugeHandle(Arc<Gauge>);

impl GaugeFn for GaugeHandle {
    fn increment(&self, value: f64) {
        self.0.add(value as i64);
    }

    fn decrement(&self, value: f64) {
        self.0.add(-(value as i64));
    }

    fn set(&self, value: f64) {
        self.0.set(value as i64);
    }
}

struct HistogramHandle(Arc<Histogram>);

impl HistogramFn for HistogramHandle {
    fn record(&self, value: f64) {
        self.0.observe(value);
    }
}
