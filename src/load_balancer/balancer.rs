//! Process-wide load balancer.
//!
//! # Responsibilities
//! - Own one [`ModelPool`] per configured model
//! - Answer selection and failover queries by model name
//! - Apply health transitions reported by the dispatcher
//! - Provide the pool snapshot walked by the recovery sweep

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::{ConfigError, HealthConfig, ModelConfig, RouterConfig, ValidationError};
use crate::load_balancer::{
    pool::{ModelPool, SelectedBackend},
    FailoverPolicy,
};
use crate::observability::metrics;

/// Model name → backend pool.
///
/// Built once at startup and never structurally modified, so lookups need
/// no lock. Share it through an `Arc`.
#[derive(Debug)]
pub struct LoadBalancer {
    pools: HashMap<String, Arc<ModelPool>>,
    recovery_window: Duration,
    policy: FailoverPolicy,
}

impl LoadBalancer {
    /// Build one pool per model. A model without backends is a
    /// configuration error.
    pub fn new<'a>(
        models: impl IntoIterator<Item = (&'a String, &'a ModelConfig)>,
        health: &HealthConfig,
    ) -> Result<Self, ConfigError> {
        let mut pools = HashMap::new();
        let mut empty = Vec::new();

        for (model, config) in models {
            if config.backends.is_empty() {
                empty.push(ValidationError::EmptyPool {
                    model: model.clone(),
                });
                continue;
            }
            pools.insert(model.clone(), Arc::new(ModelPool::new(&config.backends)));
        }

        if !empty.is_empty() {
            return Err(ConfigError::Validation(empty));
        }

        for (model, pool) in &pools {
            for backend in pool.backends() {
                metrics::record_backend_health(model, &backend.label, true);
            }
        }

        Ok(Self {
            pools,
            recovery_window: health.recovery_window(),
            policy: health.failover_policy,
        })
    }

    pub fn from_config(config: &RouterConfig) -> Result<Self, ConfigError> {
        Self::new(&config.models, &config.health)
    }

    pub fn has_model(&self, model: &str) -> bool {
        self.pools.contains_key(model)
    }

    /// Configured model names, sorted.
    pub fn models(&self) -> Vec<String> {
        let mut names: Vec<String> = self.pools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn pool(&self, model: &str) -> Option<&Arc<ModelPool>> {
        self.pools.get(model)
    }

    pub fn pool_size(&self, model: &str) -> Option<usize> {
        self.pools.get(model).map(|pool| pool.len())
    }

    pub fn policy(&self) -> FailoverPolicy {
        self.policy
    }

    pub fn recovery_window(&self) -> Duration {
        self.recovery_window
    }

    /// Round-robin pick preferring healthy backends. `None` for unknown models.
    pub fn next_single(&self, model: &str) -> Option<SelectedBackend> {
        self.pools.get(model)?.next_single()
    }

    /// Every backend of the model in attempt order (see [`FailoverPolicy`]).
    pub fn failover_sequence(&self, model: &str) -> Option<Vec<SelectedBackend>> {
        self.pools
            .get(model)
            .map(|pool| pool.failover_sequence(self.policy))
    }

    pub fn mark_unhealthy(&self, model: &str, selected: &SelectedBackend) {
        let Some(pool) = self.pools.get(model) else {
            return;
        };
        if let Some(status) = pool.mark_unhealthy(selected.index) {
            tracing::warn!(
                model = %model,
                backend = %selected.backend.label,
                fail_count = status.fail_count,
                "Backend marked unhealthy"
            );
            metrics::record_backend_health(model, &selected.backend.label, false);
        }
    }

    pub fn mark_healthy(&self, model: &str, selected: &SelectedBackend) {
        let Some(pool) = self.pools.get(model) else {
            return;
        };
        if let Some(previous) = pool.mark_healthy(selected.index) {
            if !previous.healthy || previous.fail_count > 0 {
                tracing::info!(
                    model = %model,
                    backend = %selected.backend.label,
                    "Backend healthy again"
                );
            }
            metrics::record_backend_health(model, &selected.backend.label, true);
        }
    }

    /// Copy of the pool list so a sweep never holds more than one pool lock.
    pub fn pools(&self) -> Vec<(String, Arc<ModelPool>)> {
        self.pools
            .iter()
            .map(|(model, pool)| (model.clone(), pool.clone()))
            .collect()
    }

    /// One recovery pass over every pool. Returns how many backends recovered.
    pub fn recover_expired(&self, now: Instant) -> usize {
        let mut recovered = 0;
        for (model, pool) in self.pools() {
            for index in pool.recover_expired(now, self.recovery_window) {
                let label = &pool.backends()[index].label;
                tracing::info!(model = %model, backend = %label, "Backend recovery window elapsed, eligible again");
                metrics::record_backend_health(&model, label, true);
                recovered += 1;
            }
        }
        recovered
    }

    /// Point-in-time health view of every pool.
    pub fn snapshot(&self) -> Vec<ModelSnapshot> {
        let now = Instant::now();
        let mut models: Vec<ModelSnapshot> = self
            .pools
            .iter()
            .map(|(model, pool)| {
                let backends = pool
                    .backends()
                    .iter()
                    .zip(pool.statuses())
                    .map(|(backend, status)| BackendSnapshot {
                        deployment: backend.deployment.clone(),
                        endpoint: backend.endpoint.clone(),
                        healthy: status.healthy,
                        fail_count: status.fail_count,
                        secs_since_transition: status
                            .last_checked
                            .map(|at| now.saturating_duration_since(at).as_secs()),
                    })
                    .collect();
                ModelSnapshot {
                    model: model.clone(),
                    backends,
                }
            })
            .collect();
        models.sort_by(|a, b| a.model.cmp(&b.model));
        models
    }
}

/// Health of one model's pool.
#[derive(Debug, Clone, Serialize)]
pub struct ModelSnapshot {
    pub model: String,
    pub backends: Vec<BackendSnapshot>,
}

/// Health of one backend.
#[derive(Debug, Clone, Serialize)]
pub struct BackendSnapshot {
    pub deployment: String,
    pub endpoint: String,
    pub healthy: bool,
    pub fail_count: u32,
    pub secs_since_transition: Option<u64>,
}
