//! Errors surfaced to callers of the proxy endpoints.

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::http::response::error_response;

/// Everything a proxied call can fail with, as seen by the caller.
///
/// Backend faults never show up individually: they are retried and only the
/// exhaustion of the whole attempt budget is reported.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("request body too large (limit is {limit} bytes)")]
    PayloadTooLarge { limit: usize },

    #[error("failed to read request body: {0}")]
    BodyRead(String),

    #[error("request body is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("model field is required")]
    MissingModel,

    #[error("model {model} is not configured")]
    UnknownModel { model: String },

    #[error("Missing API key. Please include your API key in the Authorization header using Bearer scheme, or in the api-key/x-api-key header.")]
    MissingApiKey,

    #[error("Invalid API key provided.")]
    InvalidApiKey,

    #[error("all backends failed: {detail}")]
    BackendsExhausted { detail: String },

    #[error("failed to read backend response: {0}")]
    UpstreamBody(String),

    #[error("backend response body not received within {}s", .0.as_secs_f64())]
    UpstreamTimeout(Duration),

    /// The caller went away or the server is shutting down.
    #[error("request cancelled")]
    Cancelled,
}

impl ProxyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::BodyRead(_) | Self::InvalidJson(_) | Self::MissingModel | Self::UnknownModel { .. } => {
                StatusCode::BAD_REQUEST
            }
            Self::MissingApiKey | Self::InvalidApiKey => StatusCode::UNAUTHORIZED,
            Self::BackendsExhausted { .. } | Self::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            Self::UpstreamBody(_) => StatusCode::BAD_GATEWAY,
            Self::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            Self::BackendsExhausted { .. }
            | Self::UpstreamBody(_)
            | Self::UpstreamTimeout(_)
            | Self::Cancelled => "upstream_error",
            _ => "invalid_request_error",
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::PayloadTooLarge { .. } => "payload_too_large",
            Self::BodyRead(_) => "body_read_error",
            Self::InvalidJson(_) => "invalid_json",
            Self::MissingModel => "missing_model",
            Self::UnknownModel { .. } => "model_not_found",
            Self::MissingApiKey => "missing_api_key",
            Self::InvalidApiKey => "invalid_api_key",
            Self::BackendsExhausted { .. } => "backends_exhausted",
            Self::UpstreamBody(_) => "upstream_body_error",
            Self::UpstreamTimeout(_) => "upstream_timeout",
            Self::Cancelled => "request_cancelled",
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        error_response(self.status_code(), &self.to_string(), self.error_type(), self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_are_4xx() {
        for err in [
            ProxyError::MissingModel,
            ProxyError::InvalidJson("eof".into()),
            ProxyError::UnknownModel { model: "x".into() },
            ProxyError::PayloadTooLarge { limit: 1 },
            ProxyError::InvalidApiKey,
        ] {
            assert!(err.status_code().is_client_error(), "{err}");
        }
    }

    #[test]
    fn exhaustion_is_503_with_detail() {
        let err = ProxyError::BackendsExhausted {
            detail: "backend returned status 500".into(),
        };
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.to_string(), "all backends failed: backend returned status 500");
    }
}
