//! Structured snapshot of the registry and its text/JSON renderings.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use super::histogram::Histogram;
use super::labels::Labels;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterSample {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: MetricKind,
    pub labels: Labels,
    pub value: u64,
}

impl CounterSample {
    pub(crate) fn new(name: &str, labels: Labels, value: u64) -> Self {
        Self {
            name: name.to_string(),
            kind: MetricKind::Counter,
            labels,
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaugeSample {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: MetricKind,
    pub labels: Labels,
    pub value: i64,
}

impl GaugeSample {
    pub(crate) fn new(name: &str, labels: Labels, value: i64) -> Self {
        Self {
            name: name.to_string(),
            kind: MetricKind::Gauge,
            labels,
            value,
        }
    }
}

/// One histogram bucket. `count` is cumulative: observations `<= le`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketSample {
    pub le: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramSample {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: MetricKind,
    pub labels: Labels,
    pub count: u64,
    pub sum: f64,
    pub buckets: Vec<BucketSample>,
    pub p50: f64,
    pub p90: f64,
    pub p99: f64,
}

impl HistogramSample {
    pub(crate) fn from_histogram(name: &str, labels: Labels, histogram: &Histogram) -> Self {
        let mut cumulative = 0u64;
        let counts = histogram.bucket_counts();
        let les = histogram
            .buckets()
            .iter()
            .map(|bound| bound.to_string())
            .chain(std::iter::once("+Inf".to_string()));

        let buckets = les
            .zip(counts)
            .map(|(le, count)| {
                cumulative += count;
                BucketSample { le, count: cumulative }
            })
            .collect();

        Self {
            name: name.to_string(),
            kind: MetricKind::Histogram,
            labels,
            count: histogram.count(),
            sum: histogram.sum(),
            buckets,
            p50: histogram.p50(),
            p90: histogram.p90(),
            p99: histogram.p99(),
        }
    }
}

/// Point-in-time view of every registered metric, keyed by identity
/// (`name` or `name{k=v,...}`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub counters: BTreeMap<String, CounterSample>,
    pub gauges: BTreeMap<String, GaugeSample>,
    pub histograms: BTreeMap<String, HistogramSample>,
}

impl MetricsSnapshot {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Render in the Prometheus text exposition format.
    pub fn to_text(&self) -> String {
        let mut out = String::new();

        for (name, samples) in group_by_name(self.counters.values(), |s| &s.name) {
            let _ = writeln!(out, "# TYPE {} counter", name);
            for sample in samples {
                let _ = writeln!(out, "{}{} {}", name, render_labels(&sample.labels, None), sample.value);
            }
        }

        for (name, samples) in group_by_name(self.gauges.values(), |s| &s.name) {
            let _ = writeln!(out, "# TYPE {} gauge", name);
            for sample in samples {
                let _ = writeln!(out, "{}{} {}", name, render_labels(&sample.labels, None), sample.value);
            }
        }

        for (name, samples) in group_by_name(self.histograms.values(), |s| &s.name) {
            let _ = writeln!(out, "# TYPE {} histogram", name);
            for sample in samples {
                for bucket in &sample.buckets {
                    let _ = writeln!(
                        out,
                        "{}_bucket{} {}",
                        name,
                        render_labels(&sample.labels, Some(("le", &bucket.le))),
                        bucket.count
                    );
                }
                let labels = render_labels(&sample.labels, None);
                let _ = writeln!(out, "{}_sum{} {}", name, labels, sample.sum);
                let _ = writeln!(out, "{}_count{} {}", name, labels, sample.count);
            }
        }

        out
    }
}

fn group_by_name<'a, T, F>(samples: impl Iterator<Item = &'a T>, name: F) -> BTreeMap<&'a str, Vec<&'a T>>
where
    T: 'a,
    F: Fn(&'a T) -> &'a String,
{
    let mut groups: BTreeMap<&str, Vec<&T>> = BTreeMap::new();
    for sample in samples {
        groups.entry(name(sample).as_str()).or_default().push(sample);
    }
    groups
}

fn render_labels(labels: &Labels, extra: Option<(&str, &str)>) -> String {
    let mut pairs: Vec<String> = labels
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label_value(v)))
        .collect();
    if let Some((k, v)) = extra {
        pairs.push(format!("{}=\"{}\"", k, escape_label_value(v)));
    }

    if pairs.is_empty() {
        String::new()
    } else {
        format!("{{{}}}", pairs.join(","))
    }
}

fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
