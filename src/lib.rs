//! OpenAI-compatible model router.
//!
//! Accepts chat completion, embedding and responses calls, picks a backend
//! deployment for the requested model and fails over across the model's pool
//! when backends error or time out.

pub mod admin;
pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod proxy;
pub mod security;

pub use config::schema::RouterConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use load_balancer::LoadBalancer;
