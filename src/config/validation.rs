//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (capacity, intervals, timeouts > 0)
//! - Validate addresses parse as socket addresses
//! - Identity paths are configured together or not at all
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: DaemonConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::DaemonConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} is not a valid socket address: {value}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("identity.cert_path and identity.key_path must be set together")]
    IncompleteIdentity,
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &DaemonConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let non_zero = [
        ("load.max_concurrent_requests", config.load.max_concurrent_requests as u64),
        ("lifecycle.drain_timeout_secs", config.lifecycle.drain_timeout_secs),
        ("fetcher.polling_interval_ms", config.fetcher.polling_interval_ms),
        ("fetcher.error_retry_interval_ms", config.fetcher.error_retry_interval_ms),
        ("health.check_interval_secs", config.health.check_interval_secs),
        ("identity.refresh_interval_secs", config.identity.refresh_interval_secs),
    ];
    for (field, value) in non_zero {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    let mut addresses = vec![("service.bind_address", &config.service.bind_address)];
    if config.health.enabled {
        addresses.push(("health.bind_address", &config.health.bind_address));
    }
    if config.observability.metrics_enabled {
        addresses.push(("observability.metrics_address", &config.observability.metrics_address));
    }
    for (field, value) in addresses {
        if value.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidAddress {
                field,
                value: value.clone(),
            });
        }
    }

    if config.identity.cert_path.is_some() != config.identity.key_path.is_some() {
        errors.push(ValidationError::IncompleteIdentity);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
