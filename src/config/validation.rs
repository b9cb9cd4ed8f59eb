//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (limits > 0, addresses parse)
//! - Check header names and URLs are usable before traffic arrives
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::HeaderName;
use url::Url;

use crate::config::schema::RelayConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("`{}` is not a socket address", config.listener.bind_address),
        ));
    }

    let relay = &config.relay;
    if !relay.path.starts_with('/') || relay.path.len() < 2 || relay.path.contains(['?', '#']) {
        errors.push(ValidationError::new(
            "relay.path",
            format!("`{}` must be an absolute path like /proxy", relay.path),
        ));
    }
    if relay.path == "/health" {
        errors.push(ValidationError::new("relay.path", "`/health` is reserved for the liveness probe"));
    }
    if relay.error_page_threshold == 0 {
        errors.push(ValidationError::new("relay.error_page_threshold", "must be greater than 0"));
    }
    if relay.peek_limit == 0 {
        errors.push(ValidationError::new("relay.peek_limit", "must be greater than 0"));
    }
    if relay.excerpt_limit == 0 {
        errors.push(ValidationError::new("relay.excerpt_limit", "must be greater than 0"));
    }

    let upstream = &config.upstream;
    if upstream.user_agent.trim().is_empty() {
        errors.push(ValidationError::new("upstream.user_agent", "must not be empty"));
    }
    if let Some(referer) = &upstream.default_referer {
        if Url::parse(referer).is_err() {
            errors.push(ValidationError::new(
                "upstream.default_referer",
                format!("`{referer}` is not an absolute URL"),
            ));
        }
    }
    for name in upstream.forward_headers.iter().chain(&upstream.response_headers) {
        if HeaderName::from_bytes(name.as_bytes()).is_err() {
            errors.push(ValidationError::new(
                "upstream.forward_headers/response_headers",
                format!("`{name}` is not a valid header name"),
            ));
        }
    }
    if upstream.connect_timeout_secs == Some(0) {
        errors.push(ValidationError::new("upstream.connect_timeout_secs", "must be greater than 0 when set"));
    }
    if upstream.request_timeout_secs == Some(0) {
        errors.push(ValidationError::new("upstream.request_timeout_secs", "must be greater than 0 when set"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("`{}` is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
