//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the router.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;

use crate::load_balancer::FailoverPolicy;

/// Root configuration for the model router.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RouterConfig {
    /// Listener settings.
    pub server: ServerConfig,

    /// Logical model name -> ordered backend pool.
    pub models: BTreeMap<String, ModelConfig>,

    /// Retry policy applied per inbound request.
    pub retry: RetryConfig,

    /// Passive health tracking and recovery sweep.
    pub health: HealthConfig,

    /// Request limits.
    pub security: SecurityConfig,

    /// Inbound API key authentication.
    pub auth: AuthConfig,

    /// Admin endpoints.
    pub admin: AdminConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Backend pool for one logical model.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ModelConfig {
    /// Backends in failover order.
    pub backends: Vec<BackendConfig>,
}

/// A single model-serving deployment.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Base URL, e.g. "https://my-resource.openai.azure.com".
    pub endpoint: String,

    /// Credential sent in the `api-key` header.
    pub api_key: SecretString,

    /// Deployment name used for chat and embeddings paths.
    #[serde(default)]
    pub deployment: String,

    /// `api-version` query parameter. Falls back to the default when unset.
    #[serde(default)]
    pub api_version: Option<String>,
}

impl BackendConfig {
    /// Convenience constructor, mostly for tests and programmatic setups.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        deployment: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: SecretString::from(api_key.into()),
            deployment: deployment.into(),
            api_version: None,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum attempts per request (capped by the pool size).
    pub max_attempts: u32,

    /// Per-attempt timeout in seconds (until response headers arrive).
    pub timeout_secs: u64,

    /// TCP/TLS connect timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl RetryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            timeout_secs: 30,
            connect_timeout_secs: 10,
        }
    }
}

/// Health tracking configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// How often the recovery sweep runs, in seconds.
    pub sweep_interval_secs: u64,

    /// How long a backend stays unhealthy before the sweep resets it.
    pub recovery_window_secs: u64,

    /// Ordering of the per-request failover sequence.
    pub failover_policy: FailoverPolicy,
}

impl HealthConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn recovery_window(&self) -> Duration {
        Duration::from_secs(self.recovery_window_secs)
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 10,
            recovery_window_secs: 30,
            failover_policy: FailoverPolicy::default(),
        }
    }
}

/// Request limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Bodies at or above this size are rejected with 413.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

/// Inbound authentication.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    pub enabled: bool,
    pub keys: Vec<ApiKeyConfig>,
}

impl AuthConfig {
    /// Auth is only enforced when switched on and at least one key exists.
    pub fn is_enabled(&self) -> bool {
        self.enabled && !self.keys.is_empty()
    }
}

/// A named client key.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeyConfig {
    /// Label used in logs instead of the key itself.
    pub name: String,
    pub key: SecretString,
}

/// Admin endpoint configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Mount `/admin/*` routes.
    pub enabled: bool,

    /// Bearer token required by admin routes.
    pub api_key: SecretString,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: SecretString::from(String::new()),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
