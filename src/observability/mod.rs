//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing macros (structured log events)
//!
//! logging.rs installs:
//!     → EnvFilter (RUST_LOG or config level)
//!     → fmt layer (pretty or JSON) → stdout
//! ```
//!
//! Metrics for the process itself flow through [`crate::metrics`], not here.

pub mod logging;

pub use logging::{init_logging, LoggingError};
