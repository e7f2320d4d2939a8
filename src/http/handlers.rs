//! Endpoint handlers.
//!
//! The three `/v1/*` handlers differ only in the backend surface they
//! target; everything else goes through [`proxy`].

use std::time::Instant;

use axum::{
    extract::{Request, State},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::http::request::request_id;
use crate::http::server::AppState;
use crate::observability::metrics::record_request;
use crate::proxy::{ApiType, InboundRequest, ProxyError};
use crate::security::{read_body_limited, AuthenticatedKey};

pub async fn chat_completions(State(state): State<AppState>, request: Request) -> Response {
    proxy(state, ApiType::ChatCompletions, request).await
}

pub async fn embeddings(State(state): State<AppState>, request: Request) -> Response {
    proxy(state, ApiType::Embeddings, request).await
}

pub async fn responses(State(state): State<AppState>, request: Request) -> Response {
    proxy(state, ApiType::Responses, request).await
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
}

/// Liveness only: says nothing about backend health.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    })
}

async fn proxy(state: AppState, api_type: ApiType, request: Request) -> Response {
    let start = Instant::now();
    let (parts, body) = request.into_parts();
    let key_name = parts
        .extensions
        .get::<AuthenticatedKey>()
        .map(|k| k.0.clone());

    tracing::info!(
        api_type = %api_type,
        request_id = %request_id(&parts.headers),
        key_name = key_name.as_deref().unwrap_or("-"),
        "Received request"
    );

    // Cancelled on shutdown, or when this handler is dropped because the
    // caller went away. Once a response exists only shutdown cancels it, so
    // a relayed stream can keep using the token.
    let cancel = state.shutdown.child_token();
    let cancel_on_drop = cancel.clone().drop_guard();

    let result: Result<Response, ProxyError> = async move {
        let body = read_body_limited(&parts.headers, body, state.max_body_size).await?;
        let inbound = InboundRequest {
            api_type,
            headers: parts.headers,
            body,
        };
        state.dispatcher.dispatch(inbound, &cancel).await
    }
    .await;
    cancel_on_drop.disarm();

    let response = match result {
        Ok(response) => response,
        Err(e) => {
            tracing::debug!(api_type = %api_type, error = %e, "Request failed");
            e.into_response()
        }
    };
    record_request(api_type.as_str(), response.status().as_u16(), start);
    response
}
