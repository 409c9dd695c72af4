//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML files and
//! default every field, so an empty file is a valid configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_EVENT_QUEUE_SIZE: usize = 10_000;
pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 100;
pub const DEFAULT_RATE_LIMIT: u32 = 10_000;
pub const DEFAULT_SUBSCRIBER_CHANNEL_SIZE: usize = 1_000;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Event hub sizing and pacing.
    pub hub: HubConfig,

    /// Metrics registry settings.
    pub metrics: MetricsConfig,

    /// HTTP exporter for metrics and hub stats.
    pub exporter: ExporterConfig,

    /// Log output.
    pub logging: LoggingConfig,
}

/// Event hub configuration. A zero in any field selects its default.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct HubConfig {
    /// Capacity of the bounded publish queue.
    pub event_queue_size: usize,

    /// Events per batch before an immediate flush.
    pub batch_size: usize,

    /// Maximum time an admitted event waits in a batch.
    pub flush_interval_ms: u64,

    /// Events per second admitted from queue to batch (also the burst).
    pub rate_limit: u32,

    /// Capacity of each subscriber's output channel.
    pub subscriber_channel_size: usize,
}

impl HubConfig {
    /// Replace every zero field with its default, independently.
    pub fn normalized(mut self) -> Self {
        if self.event_queue_size == 0 {
            self.event_queue_size = DEFAULT_EVENT_QUEUE_SIZE;
        }
        if self.batch_size == 0 {
            self.batch_size = DEFAULT_BATCH_SIZE;
        }
        if self.flush_interval_ms == 0 {
            self.flush_interval_ms = DEFAULT_FLUSH_INTERVAL_MS;
        }
        if self.rate_limit == 0 {
            self.rate_limit = DEFAULT_RATE_LIMIT;
        }
        if self.subscriber_channel_size == 0 {
            self.subscriber_channel_size = DEFAULT_SUBSCRIBER_CHANNEL_SIZE;
        }
        self
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            event_queue_size: DEFAULT_EVENT_QUEUE_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            flush_interval_ms: DEFAULT_FLUSH_INTERVAL_MS,
            rate_limit: DEFAULT_RATE_LIMIT,
            subscriber_channel_size: DEFAULT_SUBSCRIBER_CHANNEL_SIZE,
        }
    }
}

/// Metrics registry configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    /// Route `metrics::counter!` and friends into the registry.
    pub install_recorder: bool,

    /// Histogram ladder used when a registration supplies none.
    pub default_buckets: Option<Vec<f64>>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            install_recorder: true,
            default_buckets: None,
        }
    }
}

/// Exporter configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExporterConfig {
    /// Serve metrics and hub stats over HTTP.
    pub enabled: bool,

    /// Bind address (e.g., "127.0.0.1:9464").
    pub bind_address: String,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "127.0.0.1:9464".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` overrides it.
    pub level: String,

    /// Pretty output for development, JSON for production.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}
