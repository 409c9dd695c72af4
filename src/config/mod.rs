//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → TelemetryConfig (validated, immutable)
//!     → HubConfig::normalized() when the hub is built
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; a hub keeps the config it was built with
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{ExporterConfig, HubConfig, LogFormat, LoggingConfig, MetricsConfig, TelemetryConfig};
pub use validation::ValidationError;
