//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (ceilings and intervals > 0, ports valid)
//! - Reject proxy and auth entries that cannot be turned into credentials
//! - Reject default headers that could never be sent
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: DispatcherConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use reqwest::header::{HeaderName, HeaderValue};
use thiserror::Error;

use crate::config::schema::DispatcherConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &DispatcherConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.pool.max_concurrent == 0 {
        errors.push(ValidationError::new("pool.max_concurrent", "must be greater than zero"));
    }
    if config.pool.idle_timeout_secs == 0 {
        errors.push(ValidationError::new("pool.idle_timeout_secs", "must be greater than zero"));
    }
    if config.pool.reap_interval_secs == 0 {
        errors.push(ValidationError::new("pool.reap_interval_secs", "must be greater than zero"));
    }
    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::new("timeouts.connect_secs", "must be greater than zero"));
    }
    if config.timeouts.transfer_secs == 0 {
        errors.push(ValidationError::new("timeouts.transfer_secs", "must be greater than zero"));
    }

    for (i, proxy) in config.proxies.iter().enumerate() {
        let field = format!("proxies[{}]", i);
        if proxy.host.trim().is_empty() {
            errors.push(ValidationError::new(format!("{}.host", field), "must not be empty"));
        }
        if proxy.port == 0 {
            errors.push(ValidationError::new(format!("{}.port", field), "must not be zero"));
        }
        if proxy.password.is_some() && proxy.username.is_none() {
            errors.push(ValidationError::new(format!("{}.password", field), "set without a username"));
        }
    }

    if config.auth.password.is_some() && config.auth.username.is_none() {
        errors.push(ValidationError::new("auth.password", "set without a username"));
    }

    if HeaderValue::from_str(&config.request.user_agent).is_err() {
        errors.push(ValidationError::new("request.user_agent", "is not a valid header value"));
    }
    for (name, value) in &config.request.default_headers {
        if HeaderName::from_bytes(name.as_bytes()).is_err() {
            errors.push(ValidationError::new(
                format!("request.default_headers.{}", name),
                "is not a valid header name",
            ));
        }
        if HeaderValue::from_str(value).is_err() {
            errors.push(ValidationError::new(
                format!("request.default_headers.{}", name),
                "is not a valid header value",
            ));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
