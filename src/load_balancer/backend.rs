//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single model-serving deployment (immutable after startup)
//! - Track its health (healthy flag, last transition, failure count)

use std::time::{Duration, Instant};

use secrecy::{ExposeSecret, SecretString};

use crate::config::BackendConfig;

/// `api-version` used when a backend does not configure one.
pub const DEFAULT_API_VERSION: &str = "2024-02-01";

/// A single backend deployment.
///
/// Built once from configuration and shared read-only across requests.
#[derive(Debug)]
pub struct Backend {
    /// Base URL without a trailing slash.
    pub endpoint: String,
    /// Deployment name used in chat/embeddings paths.
    pub deployment: String,
    /// Configured `api-version`, if any.
    pub api_version: Option<String>,
    /// Stable identifier for logs and metrics (`deployment@endpoint`).
    pub label: String,
    api_key: SecretString,
}

impl Backend {
    /// Create a backend from its configuration.
    pub fn from_config(config: &BackendConfig) -> Self {
        let endpoint = config.endpoint.trim_end_matches('/').to_string();
        let label = format!("{}@{}", config.deployment, endpoint);
        Self {
            endpoint,
            deployment: config.deployment.clone(),
            api_version: config.api_version.clone(),
            label,
            api_key: config.api_key.clone(),
        }
    }

    /// Credential for the outbound `api-key` header.
    pub fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }

    /// Effective `api-version`, falling back to [`DEFAULT_API_VERSION`].
    pub fn api_version(&self) -> &str {
        self.api_version
            .as_deref()
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_API_VERSION)
    }
}

/// Mutable health record for one backend.
///
/// Lives inside its pool and is only touched under the pool's lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendStatus {
    pub healthy: bool,
    /// Time of the last health transition (`None` until the first one).
    pub last_checked: Option<Instant>,
    /// Failures since the last successful dispatch.
    pub fail_count: u32,
}

impl Default for BackendStatus {
    fn default() -> Self {
        Self {
            healthy: true,
            last_checked: None,
            fail_count: 0,
        }
    }
}

impl BackendStatus {
    /// Report a failed attempt.
    pub fn mark_unhealthy(&mut self, now: Instant) {
        self.healthy = false;
        self.last_checked = Some(now);
        self.fail_count = self.fail_count.saturating_add(1);
    }

    /// Report a successful attempt.
    pub fn mark_healthy(&mut self, now: Instant) {
        self.healthy = true;
        self.last_checked = Some(now);
        self.fail_count = 0;
    }

    /// Flip back to healthy once the recovery window has elapsed.
    ///
    /// The failure count is left alone; only a real success clears it.
    /// Returns true when the backend was recovered.
    pub fn recover_if_expired(&mut self, now: Instant, window: Duration) -> bool {
        if self.healthy {
            return false;
        }
        let expired = self
            .last_checked
            .map_or(true, |at| now.saturating_duration_since(at) > window);
        if expired {
            self.healthy = true;
        }
        expired
    }
}
