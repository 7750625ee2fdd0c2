//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and upstream URLs before anything binds or dials
//! - Validate value ranges (timeouts > 0, teardown grace covers a diagnostic write)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::{HeaderName, HeaderValue, Method};
use thiserror::Error;
use url::Url;

use crate::chat::DIAGNOSTIC_WRITE_TIMEOUT;
use crate::config::schema::{CorsConfig, GatewayConfig};

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field}: invalid URL '{value}'")]
    InvalidUrl { field: &'static str, value: String },

    #[error("{field}: unsupported scheme '{scheme}', expected one of {expected}")]
    UnsupportedScheme {
        field: &'static str,
        scheme: String,
        expected: &'static str,
    },

    #[error("route '{name}': path '{path}' must start with '/'")]
    RoutePath { name: String, path: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("{field} must be at least {min_ms}ms")]
    BelowMinimum { field: &'static str, min_ms: u64 },

    #[error("cors: {0}")]
    Cors(String),
}

/// Validate a configuration, collecting every error found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    check_url(
        &mut errors,
        "services.chat_endpoint",
        &config.services.chat_endpoint,
        &["ws", "wss"],
        "ws, wss",
    );
    check_url(
        &mut errors,
        "services.user_rest",
        &config.services.user_rest,
        &["http"],
        "http",
    );

    for route in &config.routes.proxy {
        if !route.path.starts_with('/') {
            errors.push(ValidationError::RoutePath {
                name: route.name.clone(),
                path: route.path.clone(),
            });
        }
    }

    check_cors(&mut errors, &config.cors);

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero("timeouts.request_secs"));
    }
    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::Zero("timeouts.connect_secs"));
    }
    if config.chat.max_frame_bytes == 0 {
        errors.push(ValidationError::Zero("chat.max_frame_bytes"));
    }
    // Teardown must outlast a pending diagnostic write.
    let min_grace_ms = DIAGNOSTIC_WRITE_TIMEOUT.as_millis() as u64;
    if config.chat.teardown_grace_ms < min_grace_ms {
        errors.push(ValidationError::BelowMinimum {
            field: "chat.teardown_grace_ms",
            min_ms: min_grace_ms,
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_url(
    errors: &mut Vec<ValidationError>,
    field: &'static str,
    value: &str,
    schemes: &[&str],
    expected: &'static str,
) {
    match Url::parse(value) {
        Ok(url) if schemes.contains(&url.scheme()) => {}
        Ok(url) => errors.push(ValidationError::UnsupportedScheme {
            field,
            scheme: url.scheme().to_string(),
            expected,
        }),
        Err(_) => errors.push(ValidationError::InvalidUrl {
            field,
            value: value.to_string(),
        }),
    }
}

fn check_cors(errors: &mut Vec<ValidationError>, cors: &CorsConfig) {
    if cors.allow_origin == "*" {
        if cors.allow_credentials {
            errors.push(ValidationError::Cors(
                "allow_origin '*' cannot be combined with allow_credentials".to_string(),
            ));
        }
    } else if HeaderValue::from_str(&cors.allow_origin).is_err() {
        errors.push(ValidationError::Cors(format!(
            "invalid allow_origin '{}'",
            cors.allow_origin
        )));
    }
    for method in &cors.allow_methods {
        if Method::from_bytes(method.as_bytes()).is_err() {
            errors.push(ValidationError::Cors(format!("invalid method '{}'", method)));
        }
    }
    for header in &cors.allow_headers {
        if HeaderName::from_bytes(header.as_bytes()).is_err() {
            errors.push(ValidationError::Cors(format!("invalid header '{}'", header)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut config = GatewayConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.services.chat_endpoint = "http://localhost:50064".into();
        config.services.user_rest = "::".into();
        config.routes.proxy[0].path = "api/v1/me".into();
        config.timeouts.request_secs = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 5);
        assert!(matches!(
            errors[1],
            ValidationError::UnsupportedScheme { field: "services.chat_endpoint", .. }
        ));
        assert!(errors.contains(&ValidationError::Zero("timeouts.request_secs")));
    }

    #[test]
    fn teardown_grace_must_cover_a_diagnostic_write() {
        let mut config = GatewayConfig::default();
        for grace_ms in [0, 249] {
            config.chat.teardown_grace_ms = grace_ms;
            assert_eq!(
                validate_config(&config).unwrap_err(),
                vec![ValidationError::BelowMinimum {
                    field: "chat.teardown_grace_ms",
                    min_ms: 250,
                }]
            );
        }

        config.chat.teardown_grace_ms = 250;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn rejects_wildcard_origin_with_credentials() {
        let mut config = GatewayConfig::default();
        config.cors.allow_origin = "*".into();
        config.cors.allow_headers.push("bad header".into());
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| matches!(e, ValidationError::Cors(_))));

        config.cors.allow_credentials = false;
        config.cors.allow_headers.pop();
        assert!(validate_config(&config).is_ok());
    }
}
