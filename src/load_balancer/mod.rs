//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request names a model
//!     → balancer.rs (look up the model's pool)
//!     → pool.rs (ordered backends + health under a pool-scoped RwLock)
//!     → round_robin.rs (atomic rotation cursor)
//!     → Return a single pick or the full failover sequence
//!
//! Dispatcher outcome:
//!     → mark_unhealthy / mark_healthy (backend.rs status update)
//! Recovery sweep (health::recovery):
//!     → recover_expired (unhealthy longer than the window → healthy)
//! ```
//!
//! # Design Decisions
//! - Pools are fixed after startup; only health and the cursor change
//! - Cursor is lock-free; health fields sit behind one lock per pool
//! - Health is a soft signal: failover sequences still contain every backend

pub mod backend;
pub mod balancer;
pub mod pool;
pub mod round_robin;

use serde::Deserialize;

pub use backend::{Backend, BackendStatus, DEFAULT_API_VERSION};
pub use balancer::{BackendSnapshot, LoadBalancer, ModelSnapshot};
pub use pool::{ModelPool, SelectedBackend};

/// How a request's failover sequence is ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailoverPolicy {
    /// Whole pool in rotation order from the cursor, health ignored.
    /// Stale health flags never stop a backend from being tried, at the cost
    /// of re-trying a backend that recently failed.
    #[default]
    FullRotation,
    /// Same rotation, with currently-healthy backends moved ahead of
    /// unhealthy ones. Unhealthy backends stay in the sequence as a last resort.
    HealthyFirst,
}
