//! HTTP exporter subsystem.
//!
//! # Data Flow
//! ```text
//! GET /metrics       → Registry::export().to_text()
//! GET /metrics/json  → Registry::export() (JSON)
//! GET /stats         → EventHub::stats()
//! GET /health        → version + hub state
//! ```
//!
//! # Design Decisions
//! - Read-only: nothing here mutates metrics or publishes events
//! - Every request renders a fresh snapshot; no caching

pub mod server;

pub use server::{ExporterServer, ExporterState, HealthStatus};
