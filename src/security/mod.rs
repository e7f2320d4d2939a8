//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming /v1/* request:
//!     → auth.rs (client API key, when enabled)
//!     → limits.rs (body size cap, before parsing)
//!     → Pass to dispatch
//!
//! Outbound attempt / relayed response:
//!     → headers.rs (drop hop-by-hop and caller credentials)
//! ```
//!
//! # Design Decisions
//! - Fail closed: a configured key list rejects anything not on it
//! - Keys are compared in constant time and never logged in full

pub mod auth;
pub mod headers;
pub mod limits;

pub use auth::{require_api_key, ApiKeys, AuthenticatedKey};
pub use limits::read_body_limited;
