//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Every model has at least one usable backend
//! - Validate value ranges (attempts, timeouts, intervals > 0)
//! - Validate listener and metrics addresses
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RouterConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use secrecy::ExposeSecret;
use thiserror::Error;
use url::Url;

use crate::config::schema::RouterConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no models configured")]
    NoModels,

    #[error("model `{model}` has no backends")]
    EmptyPool { model: String },

    #[error("model `{model}` backend #{index}: invalid endpoint `{endpoint}`")]
    InvalidEndpoint {
        model: String,
        index: usize,
        endpoint: String,
    },

    #[error("model `{model}` backend #{index}: deployment is empty")]
    MissingDeployment { model: String, index: usize },

    #[error("model `{model}` backend #{index}: api_key is empty")]
    MissingApiKey { model: String, index: usize },

    #[error("{field} must be greater than zero")]
    NotPositive { field: &'static str },

    #[error("{field} `{value}` is not a valid socket address")]
    InvalidAddress { field: &'static str, value: String },

    #[error("admin is enabled but admin.api_key is empty")]
    MissingAdminKey,
}

/// Validate a parsed configuration, collecting every error.
pub fn validate_config(config: &RouterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.models.is_empty() {
        errors.push(ValidationError::NoModels);
    }

    for (model, model_config) in &config.models {
        if model_config.backends.is_empty() {
            errors.push(ValidationError::EmptyPool {
                model: model.clone(),
            });
        }

        for (index, backend) in model_config.backends.iter().enumerate() {
            let endpoint_ok = Url::parse(&backend.endpoint)
                .map(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
                .unwrap_or(false);
            if !endpoint_ok {
                errors.push(ValidationError::InvalidEndpoint {
                    model: model.clone(),
                    index,
                    endpoint: backend.endpoint.clone(),
                });
            }
            if backend.deployment.trim().is_empty() {
                errors.push(ValidationError::MissingDeployment {
                    model: model.clone(),
                    index,
                });
            }
            if backend.api_key.expose_secret().is_empty() {
                errors.push(ValidationError::MissingApiKey {
                    model: model.clone(),
                    index,
                });
            }
        }
    }

    let positives = [
        ("retry.max_attempts", u64::from(config.retry.max_attempts)),
        ("retry.timeout_secs", config.retry.timeout_secs),
        ("retry.connect_timeout_secs", config.retry.connect_timeout_secs),
        ("health.sweep_interval_secs", config.health.sweep_interval_secs),
        ("health.recovery_window_secs", config.health.recovery_window_secs),
        ("security.max_body_size", config.security.max_body_size as u64),
    ];
    for (field, value) in positives {
        if value == 0 {
            errors.push(ValidationError::NotPositive { field });
        }
    }

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "server.bind_address",
            value: config.server.bind_address.clone(),
        });
    }
    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if config.admin.enabled && config.admin.api_key.expose_secret().is_empty() {
        errors.push(ValidationError::MissingAdminKey);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
