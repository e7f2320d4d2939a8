//! Request forwarding to model backends.
//!
//! # Data Flow
//! ```text
//! http::handlers (body read, size-checked)
//!     → dispatch.rs (model lookup, transform, retry loop)
//!     → upstream.rs (target URL, outbound headers)
//!     → relay.rs (streamed or buffered response)
//! ```
//!
//! # Design Decisions
//! - Attempts are sequential and follow the pool's failover sequence
//! - Only exhaustion of every attempt is reported to the caller
//! - The payload is rewritten once per request, not per attempt

pub mod dispatch;
pub mod error;
pub mod relay;
pub mod transform;
pub mod upstream;

pub use dispatch::{prepare, AttemptFailure, Dispatcher, InboundRequest, PreparedRequest};
pub use error::ProxyError;
pub use upstream::{build_client, ApiType};
