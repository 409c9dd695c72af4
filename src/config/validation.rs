//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses, log levels and histogram ladders
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Zero hub sizes are not errors: they select defaults

use std::net::SocketAddr;

use crate::config::schema::TelemetryConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("exporter.bind_address '{0}' is not a socket address")]
    BindAddress(String),

    #[error("logging.level '{0}' is not one of trace, debug, info, warn, error, off")]
    LogLevel(String),

    #[error("metrics.default_buckets must not be empty")]
    EmptyBuckets,

    #[error("metrics.default_buckets[{index}] = {value} must be finite and positive")]
    InvalidBucket { index: usize, value: f64 },

    #[error("metrics.default_buckets must be strictly increasing (index {index})")]
    UnorderedBuckets { index: usize },
}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &TelemetryConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.exporter.enabled && config.exporter.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.exporter.bind_address.clone()));
    }

    let level = config.logging.level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::LogLevel(config.logging.level.clone()));
    }

    if let Some(buckets) = &config.metrics.default_buckets {
        validate_buckets(buckets, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_buckets(buckets: &[f64], errors: &mut Vec<ValidationError>) {
    if buckets.is_empty() {
        errors.push(ValidationError::EmptyBuckets);
        return;
    }
    for (index, value) in buckets.iter().copied().enumerate() {
        if !value.is_finite() || value <= 0.0 {
            errors.push(ValidationError::InvalidBucket { index, value });
        }
    }
    for (i, pair) in buckets.windows(2).enumerate() {
        if pair[1] <= pair[0] {
            errors.push(ValidationError::UnorderedBuckets { index: i + 1 });
        }
    }
}
