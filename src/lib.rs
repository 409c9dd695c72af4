//! Telemetry hub library.
//!
//! In-process metrics and a batched, rate-limited event hub.
//!
//! # Architecture Overview
//!
//! ```text
//!     instrumented code
//!        │            │
//!        │ publish    │ counter / gauge / histogram
//!        ▼            ▼
//!  ┌───────────┐   ┌────────────┐
//!  │ EventHub  │   │  Registry  │◀── metrics facade (recorder)
//!  │ queue     │   └─────┬──────┘
//!  │ → limiter │         │ export()
//!  │ → batch   │         ▼
//!  └─────┬─────┘   ┌────────────┐
//!        │ fan-out │  exporter  │ GET /metrics, /stats
//!        ▼         └────────────┘
//!   subscribers (MetricsTap, ...)
//! ```

// Core subsystems
pub mod events;
pub mod metrics;
pub mod profiling;

// Cross-cutting concerns
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use crate::config::schema::TelemetryConfig;
pub use crate::events::{Event, EventHub, EventType};
pub use crate::http::ExporterServer;
pub use crate::lifecycle::{Shutdown, Telemetry};
pub use crate::metrics::Registry;
