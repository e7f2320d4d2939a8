//! Backend pool for a single model.
//!
//! # Responsibilities
//! - Hold the ordered, immutable backend list for one model
//! - Guard per-backend health behind a pool-scoped read-write lock
//! - Produce single selections and failover sequences from the rotation cursor

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use crate::config::BackendConfig;
use crate::load_balancer::{
    backend::{Backend, BackendStatus},
    round_robin::RoundRobin,
    FailoverPolicy,
};

/// A backend picked from a pool, remembering where it lives in that pool.
#[derive(Debug, Clone)]
pub struct SelectedBackend {
    /// Position in the pool (stable for the process lifetime).
    pub index: usize,
    pub backend: Arc<Backend>,
}

/// Ordered backends of one model plus their health and rotation cursor.
#[derive(Debug)]
pub struct ModelPool {
    backends: Vec<Arc<Backend>>,
    statuses: RwLock<Vec<BackendStatus>>,
    rotation: RoundRobin,
}

impl ModelPool {
    /// Build a pool; every backend starts healthy.
    pub fn new(configs: &[BackendConfig]) -> Self {
        let backends: Vec<Arc<Backend>> = configs
            .iter()
            .map(|config| Arc::new(Backend::from_config(config)))
            .collect();
        let statuses = vec![BackendStatus::default(); backends.len()];
        Self {
            backends,
            statuses: RwLock::new(statuses),
            rotation: RoundRobin::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn backends(&self) -> &[Arc<Backend>] {
        &self.backends
    }

    // A panic while holding the lock cannot leave a status half-written
    // (every mutation is a plain field store), so poisoning is ignored.
    fn read_statuses(&self) -> RwLockReadGuard<'_, Vec<BackendStatus>> {
        self.statuses.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_statuses(&self) -> RwLockWriteGuard<'_, Vec<BackendStatus>> {
        self.statuses.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn selected(&self, index: usize) -> SelectedBackend {
        SelectedBackend {
            index,
            backend: self.backends[index].clone(),
        }
    }

    /// Advance the cursor by one and pick the first healthy backend within
    /// one rotation. When none is healthy the backend at the pre-advance
    /// position is returned anyway so callers always get a candidate.
    pub fn next_single(&self) -> Option<SelectedBackend> {
        if self.is_empty() {
            return None;
        }
        let start = self.rotation.advance();
        let statuses = self.read_statuses();
        let index = RoundRobin::rotation(start, self.len())
            .find(|&i| statuses[i].healthy)
            .unwrap_or(start % self.len());
        Some(self.selected(index))
    }

    /// The whole pool in rotation order from the current cursor, without
    /// advancing it.
    pub fn failover_sequence(&self, policy: FailoverPolicy) -> Vec<SelectedBackend> {
        if self.is_empty() {
            return Vec::new();
        }
        let order = RoundRobin::rotation(self.rotation.current(), self.len());
        match policy {
            FailoverPolicy::FullRotation => order.map(|i| self.selected(i)).collect(),
            FailoverPolicy::HealthyFirst => {
                let statuses = self.read_statuses();
                let (healthy, unhealthy): (Vec<usize>, Vec<usize>) =
                    order.partition(|&i| statuses[i].healthy);
                drop(statuses);
                healthy
                    .into_iter()
                    .chain(unhealthy)
                    .map(|i| self.selected(i))
                    .collect()
            }
        }
    }

    /// Record a failure. Returns the updated status.
    pub fn mark_unhealthy(&self, index: usize) -> Option<BackendStatus> {
        let mut statuses = self.write_statuses();
        let status = statuses.get_mut(index)?;
        status.mark_unhealthy(Instant::now());
        Some(*status)
    }

    /// Record a success. Returns the status as it was before the update.
    pub fn mark_healthy(&self, index: usize) -> Option<BackendStatus> {
        let mut statuses = self.write_statuses();
        let status = statuses.get_mut(index)?;
        let previous = *status;
        status.mark_healthy(Instant::now());
        Some(previous)
    }

    /// Reset every backend unhealthy for longer than `window`.
    ///
    /// Holds the write lock only for this pool. Returns the recovered indices.
    pub fn recover_expired(&self, now: Instant, window: Duration) -> Vec<usize> {
        let mut statuses = self.write_statuses();
        statuses
            .iter_mut()
            .enumerate()
            .filter_map(|(i, status)| status.recover_if_expired(now, window).then_some(i))
            .collect()
    }

    pub fn status(&self, index: usize) -> Option<BackendStatus> {
        self.read_statuses().get(index).copied()
    }

    /// Copy of all statuses, in pool order.
    pub fn statuses(&self) -> Vec<BackendStatus> {
        self.read_statuses().clone()
    }
}
