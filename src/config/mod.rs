//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → RouterConfig (validated, immutable)
//!     → consumed once at startup by the load balancer and dispatcher
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; backend membership never changes at runtime
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Credentials are `SecretString` so they never end up in logs

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AdminConfig, ApiKeyConfig, AuthConfig, BackendConfig, HealthConfig, LogFormat, ModelConfig,
    ObservabilityConfig, RetryConfig, RouterConfig, SecurityConfig, ServerConfig,
};
pub use validation::ValidationError;
