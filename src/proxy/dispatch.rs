//! Failover dispatch.
//!
//! # Data Flow
//! ```text
//! Inbound body
//!     → parse `model` (400 on bad JSON / missing / unknown model)
//!     → rewrite payload once
//!     → failover sequence from the model's pool
//!     → attempt 1..=bound, strictly sequential:
//!         transport error | timeout | 5xx → mark unhealthy, next backend
//!         anything else                 → relay, done
//!             event stream   → mark healthy, stream until end/cancel
//!             buffered body  → read under the timeout, then mark
//!     → 503 with the last failure once the bound is exhausted
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use bytes::Bytes;
use reqwest::Client;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::error::ProxyError;
use super::relay::{buffered_response, is_event_stream, stream_response};
use super::transform::transform_body;
use super::upstream::{outbound_headers, target_url, ApiType};
use crate::config::RetryConfig;
use crate::load_balancer::{LoadBalancer, SelectedBackend};
use crate::observability::metrics::record_attempt;

/// Longest backend error body kept for logging.
const MAX_LOGGED_ERROR_BODY: usize = 1024;

/// A caller request after the body has been read and size-checked.
#[derive(Debug)]
pub struct InboundRequest {
    pub api_type: ApiType,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Body ready to forward, with the model it targets.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRequest {
    pub model: String,
    pub body: Bytes,
}

/// Why a single backend attempt was abandoned.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptFailure {
    Transport(String),
    Timeout(Duration),
    Status(StatusCode),
}

impl AttemptFailure {
    /// Metrics label.
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport_error",
            Self::Timeout(_) => "timeout",
            Self::Status(_) => "server_error",
        }
    }
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "backend request failed: {e}"),
            Self::Timeout(d) => write!(f, "backend did not respond within {}s", d.as_secs_f64()),
            Self::Status(s) => write!(f, "backend returned status {}", s.as_u16()),
        }
    }
}

/// Extract the target model and apply the payload rewrite.
///
/// Fails before any backend is contacted, so client errors never touch
/// backend health.
pub fn prepare(balancer: &LoadBalancer, body: Bytes) -> Result<PreparedRequest, ProxyError> {
    let payload: Value =
        serde_json::from_slice(&body).map_err(|e| ProxyError::InvalidJson(e.to_string()))?;

    let model = payload
        .get("model")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .ok_or(ProxyError::MissingModel)?
        .to_string();

    if !balancer.has_model(&model) {
        tracing::warn!(model = %model, "Model not configured");
        return Err(ProxyError::UnknownModel { model });
    }

    let body = transform_body(body, payload);
    Ok(PreparedRequest { model, body })
}

/// Runs the retry loop for inbound requests.
#[derive(Clone)]
pub struct Dispatcher {
    balancer: Arc<LoadBalancer>,
    client: Client,
    max_attempts: usize,
    attempt_timeout: Duration,
}

impl Dispatcher {
    pub fn new(balancer: Arc<LoadBalancer>, client: Client, retry: &RetryConfig) -> Self {
        Self {
            balancer,
            client,
            max_attempts: retry.max_attempts as usize,
            attempt_timeout: retry.timeout(),
        }
    }

    pub fn balancer(&self) -> &Arc<LoadBalancer> {
        &self.balancer
    }

    /// Route one request, failing over across the model's pool.
    ///
    /// `cancel` fires when the caller disconnects or the server shuts down;
    /// the loop then stops without touching backend health. A relayed event
    /// stream keeps watching it until the stream ends.
    pub async fn dispatch(
        &self,
        request: InboundRequest,
        cancel: &CancellationToken,
    ) -> Result<Response, ProxyError> {
        let prepared = prepare(&self.balancer, request.body)?;
        self.forward(request.api_type, &request.headers, prepared, cancel)
            .await
    }

    async fn forward(
        &self,
        api_type: ApiType,
        inbound: &HeaderMap,
        prepared: PreparedRequest,
        cancel: &CancellationToken,
    ) -> Result<Response, ProxyError> {
        let PreparedRequest { model, body } = prepared;
        let sequence = self
            .balancer
            .failover_sequence(&model)
            .ok_or_else(|| ProxyError::UnknownModel { model: model.clone() })?;
        if sequence.is_empty() {
            return Err(ProxyError::BackendsExhausted {
                detail: "no backends available".to_string(),
            });
        }

        let bound = self.max_attempts.min(sequence.len());
        let mut last_failure: Option<AttemptFailure> = None;

        for attempt in 0..bound {
            if cancel.is_cancelled() {
                tracing::info!(model = %model, attempt, "Request cancelled before attempt");
                return Err(ProxyError::Cancelled);
            }

            let selected = &sequence[attempt % sequence.len()];
            let backend = &selected.backend;
            let url = target_url(backend, api_type);

            tracing::info!(
                model = %model,
                backend = %backend.label,
                api_version = backend.api_version(),
                attempt = attempt + 1,
                "Forwarding request"
            );

            let send = self
                .client
                .post(&url)
                .headers(outbound_headers(inbound, backend))
                .body(body.clone())
                .send();

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(model = %model, backend = %backend.label, "Request cancelled during attempt");
                    return Err(ProxyError::Cancelled);
                }
                outcome = tokio::time::timeout(self.attempt_timeout, send) => outcome,
            };

            let failure = match outcome {
                Err(_) => AttemptFailure::Timeout(self.attempt_timeout),
                Ok(Err(e)) => AttemptFailure::Transport(e.to_string()),
                Ok(Ok(response)) if response.status().as_u16() >= 500 => {
                    let status = response.status();
                    let body = self.drain_error_body(response).await;
                    tracing::warn!(
                        model = %model,
                        backend = %backend.label,
                        status = status.as_u16(),
                        body = %body,
                        "Backend returned server error"
                    );
                    AttemptFailure::Status(status)
                }
                Ok(Ok(response)) => return self.relay(&model, response, selected, cancel).await,
            };

            tracing::warn!(
                model = %model,
                backend = %backend.label,
                attempt = attempt + 1,
                error = %failure,
                "Backend attempt failed"
            );
            self.balancer.mark_unhealthy(&model, selected);
            record_attempt(&model, &backend.label, failure.outcome());
            last_failure = Some(failure);
        }

        let detail = last_failure
            .map(|f| f.to_string())
            .unwrap_or_else(|| "no attempts were made".to_string());
        tracing::error!(model = %model, attempts = bound, detail = %detail, "All backends failed");
        Err(ProxyError::BackendsExhausted { detail })
    }

    /// Relay the response of the backend that answered.
    ///
    /// The attempt is committed here: a buffered body that stalls or breaks
    /// marks the backend unhealthy but is not retried.
    async fn relay(
        &self,
        model: &str,
        response: reqwest::Response,
        selected: &SelectedBackend,
        cancel: &CancellationToken,
    ) -> Result<Response, ProxyError> {
        let label = &selected.backend.label;
        tracing::debug!(
            backend = %label,
            status = response.status().as_u16(),
            "Relaying backend response"
        );
        if is_event_stream(&response) {
            self.balancer.mark_healthy(model, selected);
            record_attempt(model, label, "success");
            return Ok(stream_response(response, label.clone(), cancel.clone()));
        }

        match buffered_response(response, self.attempt_timeout).await {
            Ok(response) => {
                self.balancer.mark_healthy(model, selected);
                record_attempt(model, label, "success");
                Ok(response)
            }
            Err(e) => {
                tracing::warn!(model = %model, backend = %label, error = %e, "Backend response body failed");
                self.balancer.mark_unhealthy(model, selected);
                record_attempt(model, label, "body_error");
                Err(e)
            }
        }
    }

    /// Read a failed response for logging, bounded by the attempt timeout.
    async fn drain_error_body(&self, response: reqwest::Response) -> String {
        match tokio::time::timeout(self.attempt_timeout, response.text()).await {
            Ok(Ok(mut text)) => {
                if text.len() > MAX_LOGGED_ERROR_BODY {
                    let mut cut = MAX_LOGGED_ERROR_BODY;
                    while !text.is_char_boundary(cut) {
                        cut -= 1;
                    }
                    text.truncate(cut);
                }
                text
            }
            Ok(Err(e)) => format!("<unreadable: {e}>"),
            Err(_) => "<timed out>".to_string(),
        }
    }
}
