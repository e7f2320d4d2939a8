use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::load_balancer::{LoadBalancer, ModelSnapshot};

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub models: usize,
    pub backends: usize,
    pub healthy_backends: usize,
}

pub async fn get_status(State(balancer): State<Arc<LoadBalancer>>) -> Json<SystemStatus> {
    let snapshot = balancer.snapshot();
    let backends = snapshot.iter().map(|m| m.backends.len()).sum();
    let healthy_backends = snapshot
        .iter()
        .flat_map(|m| &m.backends)
        .filter(|b| b.healthy)
        .count();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        models: snapshot.len(),
        backends,
        healthy_backends,
    })
}

pub async fn get_backends(State(balancer): State<Arc<LoadBalancer>>) -> Json<Vec<ModelSnapshot>> {
    Json(balancer.snapshot())
}
