//! Backend addressing: target URLs, outbound headers and the shared client.

use std::fmt;

use axum::http::{header, HeaderMap, HeaderValue};
use reqwest::Client;

use crate::config::RetryConfig;
use crate::load_balancer::Backend;
use crate::security::headers::forwardable_request_headers;

/// Header carrying the backend credential.
pub const BACKEND_KEY_HEADER: &str = "api-key";

/// The three OpenAI-compatible surfaces the router exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiType {
    ChatCompletions,
    Embeddings,
    Responses,
}

impl ApiType {
    /// Path segment used in the deployment URL, and the metrics label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ChatCompletions => "chat/completions",
            Self::Embeddings => "embeddings",
            Self::Responses => "responses",
        }
    }
}

impl fmt::Display for ApiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the backend URL for one attempt.
///
/// Deployment-scoped surfaces address
/// `{endpoint}/openai/deployments/{deployment}/{api}`, while the responses
/// surface is account-scoped and ignores the deployment.
pub fn target_url(backend: &Backend, api_type: ApiType) -> String {
    let version = backend.api_version();
    match api_type {
        ApiType::Responses => format!(
            "{}/openai/responses?api-version={}",
            backend.endpoint, version
        ),
        _ => format!(
            "{}/openai/deployments/{}/{}?api-version={}",
            backend.endpoint,
            backend.deployment,
            api_type.as_str(),
            version
        ),
    }
}

/// Headers for one attempt: the caller's headers minus connection and
/// credential headers, plus the backend key and a JSON content type.
pub fn outbound_headers(inbound: &HeaderMap, backend: &Backend) -> HeaderMap {
    let mut headers = forwardable_request_headers(inbound);
    match HeaderValue::from_str(backend.api_key()) {
        Ok(mut value) => {
            value.set_sensitive(true);
            headers.insert(BACKEND_KEY_HEADER, value);
        }
        Err(_) => {
            tracing::warn!(backend = %backend.label, "Backend API key is not a valid header value");
        }
    }
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers
}

/// Client shared by every attempt.
///
/// Only the connect phase is bounded here; the per-attempt timeout wraps the
/// wait for response headers so long streams are never cut off.
pub fn build_client(retry: &RetryConfig) -> reqwest::Result<Client> {
    Client::builder()
        .connect_timeout(retry.connect_timeout())
        .pool_idle_timeout(std::time::Duration::from_secs(90))
        .build()
}
