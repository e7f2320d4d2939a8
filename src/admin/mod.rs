//! Admin API: read-only views of router state.
//!
//! Mounted only when `admin.enabled` is set; every route requires the admin
//! bearer key.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{middleware, routing::get, Router};
use secrecy::SecretString;

use self::auth::admin_auth_middleware;
use self::handlers::{get_backends, get_status};
use crate::load_balancer::LoadBalancer;

pub fn router(balancer: Arc<LoadBalancer>, admin_key: SecretString) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/backends", get(get_backends))
        .route_layer(middleware::from_fn_with_state(
            Arc::new(admin_key),
            admin_auth_middleware,
        ))
        .with_state(balancer)
}
