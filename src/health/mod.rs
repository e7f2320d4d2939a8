//! Health tracking subsystem.
//!
//! # Data Flow
//! ```text
//! Passive detection (proxy::dispatch):
//!     Transport error / timeout / 5xx observed
//!     → LoadBalancer::mark_unhealthy (fail_count += 1)
//!     Any other response
//!     → LoadBalancer::mark_healthy (fail_count = 0)
//!
//! Timed recovery (recovery.rs):
//!     Periodic timer
//!     → Snapshot pools
//!     → Per pool: unhealthy longer than the window → healthy
//! ```
//!
//! # Design Decisions
//! - No active probing; recovery is optimistic and time based
//! - Recovery does not clear fail_count; only a real success does
//! - Health is per-backend, locked per-pool

pub mod recovery;

pub use recovery::RecoverySweep;
