//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, body limit > 0)
//! - Reject CORS combinations the browser would refuse
//! - Check the log filter parses
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;

use axum::http::{HeaderName, HeaderValue, Method};
use tracing_subscriber::EnvFilter;

use crate::config::schema::AppConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
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

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let server = &config.server;

    if server.read_timeout_secs == 0 {
        errors.push(ValidationError::new("server.read_timeout_secs", "must be greater than 0"));
    }
    if server.write_timeout_secs == 0 {
        errors.push(ValidationError::new("server.write_timeout_secs", "must be greater than 0"));
    }
    if server.max_body_bytes == 0 {
        errors.push(ValidationError::new("server.max_body_bytes", "must be greater than 0"));
    }

    let cors = &server.cors;
    if cors.enable_cors {
        if cors.allowed_domains.is_empty() {
            errors.push(ValidationError::new(
                "server.cors.allowed_domains",
                "must not be empty when CORS is enabled",
            ));
        }
        let wildcard = cors.allowed_domains.iter().any(|d| d == "*");
        if wildcard && cors.cookies_allowed {
            errors.push(ValidationError::new(
                "server.cors.cookies_allowed",
                "cannot be combined with a `*` allowed domain",
            ));
        }
        for domain in cors.allowed_domains.iter().filter(|d| *d != "*") {
            if HeaderValue::from_str(domain).is_err() {
                errors.push(ValidationError::new(
                    "server.cors.allowed_domains",
                    format!("invalid origin `{}`", domain),
                ));
            }
        }
        for method in &cors.allowed_methods {
            if method != "*" && method.parse::<Method>().is_err() {
                errors.push(ValidationError::new(
                    "server.cors.allowed_methods",
                    format!("invalid method `{}`", method),
                ));
            }
        }
        for header in &cors.allowed_headers {
            if header != "*" && header.parse::<HeaderName>().is_err() {
                errors.push(ValidationError::new(
                    "server.cors.allowed_headers",
                    format!("invalid header `{}`", header),
                ));
            }
        }
    }

    if let Err(e) = EnvFilter::try_new(&config.log.level) {
        errors.push(ValidationError::new("log.level", e.to_string()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&AppConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = AppConfig::default();
        config.server.read_timeout_secs = 0;
        config.server.write_timeout_secs = 0;
        config.log.level = "api=verbose".to_string();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec!["server.read_timeout_secs", "server.write_timeout_secs", "log.level"]
        );
    }

    #[test]
    fn test_cors_rules() {
        let mut config = AppConfig::default();
        config.server.cors.enable_cors = true;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "server.cors.allowed_domains");

        config.server.cors.allowed_domains = vec!["*".into()];
        config.server.cors.cookies_allowed = true;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "server.cors.cookies_allowed");

        config.server.cors.cookies_allowed = false;
        config.server.cors.allowed_methods = vec!["GET".into(), "NOT A METHOD".into()];
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "server.cors.allowed_methods");
    }
}
