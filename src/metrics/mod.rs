//! Metrics subsystem.
//!
//! # Data Flow
//! ```text
//! Instrumented code:
//!     → Registry::register_* (get-or-create by name + canonical labels)
//!     → Counter / Gauge / Histogram handles (atomic updates)
//!
//! metrics::counter!/gauge!/histogram! (facade):
//!     → recorder.rs (RegistryRecorder) → same Registry
//!
//! Readers:
//!     → Registry::export() → MetricsSnapshot
//!     → to_json() / to_text() (served by the exporter)
//! ```
//!
//! # Design Decisions
//! - Values are atomics; registry locks only guard map lookup/insert
//! - Registration never fails and never validates names across kinds
//! - Handles are `Arc`s: they stay valid after a registry reset
//! - Optional handles (`Option<Arc<_>>`) are no-ops through the
//!   `Optional*` extension traits

pub mod counter;
pub mod export;
pub mod gauge;
pub mod histogram;
pub mod labels;
pub mod recorder;
pub mod registry;

pub use counter::{Counter, OptionalCounter};
pub use export::{BucketSample, CounterSample, GaugeSample, HistogramSample, MetricKind, MetricsSnapshot};
pub use gauge::{Gauge, OptionalGauge};
pub use histogram::{Histogram, OptionalHistogram, DEFAULT_BUCKETS};
pub use labels::Labels;
pub use recorder::{install, RecorderError, RegistryRecorder};
pub use registry::Registry;
