//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Registry → EventHub → MetricsTap → Exporter
//!
//! Shutdown (shutdown.rs):
//!     Trigger → hub drains and closes → tap ends → exporter stops
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: metrics first, then the hub, then listeners
//! - Ordered shutdown: events are drained before the exporter goes away

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{StartupError, Telemetry};
