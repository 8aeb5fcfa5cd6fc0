//! Configuration validation.
//!
//! Semantic checks only; serde handles syntax. All problems are reported,
//! not just the first.

use std::net::SocketAddr;

use axum::http::{HeaderName, HeaderValue};
use thiserror::Error;

use crate::config::schema::AppConfig;
use crate::security::headers::SecurityHeaders;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
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

pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    let rl = &config.rate_limit;
    if rl.max_requests == 0 {
        errors.push(ValidationError::new("rate_limit.max_requests", "must be greater than 0"));
    }
    if rl.window_secs == 0 {
        errors.push(ValidationError::new("rate_limit.window_secs", "must be greater than 0"));
    }
    if rl.sweep_interval_secs == 0 {
        errors.push(ValidationError::new("rate_limit.sweep_interval_secs", "must be greater than 0"));
    }
    if !rl.mount_path.starts_with('/') {
        errors.push(ValidationError::new("rate_limit.mount_path", "must start with '/'"));
    }

    if config.body.limit_bytes == 0 {
        errors.push(ValidationError::new("body.limit_bytes", "must be greater than 0"));
    }
    if config.body.raw_limit_bytes == 0 {
        errors.push(ValidationError::new("body.raw_limit_bytes", "must be greater than 0"));
    }

    for (i, directive) in config.security.csp.iter().enumerate() {
        if directive.name.trim().is_empty() {
            errors.push(ValidationError::new(format!("security.csp[{i}].name"), "must not be empty"));
        }
    }
    if HeaderValue::from_str(&SecurityHeaders::policy_string(&config.security.csp)).is_err() {
        errors.push(ValidationError::new("security.csp", "not a valid header value"));
    }
    for (i, header) in config.security.headers.iter().enumerate() {
        if HeaderName::from_bytes(header.name.as_bytes()).is_err() {
            errors.push(ValidationError::new(
                format!("security.headers[{i}].name"),
                format!("'{}' is not a valid header name", header.name),
            ));
        }
        if HeaderValue::from_str(&header.value).is_err() {
            errors.push(ValidationError::new(
                format!("security.headers[{i}].value"),
                "not a valid header value",
            ));
        }
    }

    for (i, origin) in config.cors.allowed_origins.iter().enumerate() {
        if HeaderValue::from_str(origin).is_err() {
            errors.push(ValidationError::new(
                format!("cors.allowed_origins[{i}]"),
                "not a valid header value",
            ));
        }
    }

    if HeaderName::from_bytes(config.payments.signature_header.as_bytes()).is_err() {
        errors.push(ValidationError::new("payments.signature_header", "not a valid header name"));
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
