//! Client API key authentication for the `/v1/*` surface.
//!
//! # Responsibilities
//! - Extract the caller's key from `Authorization: Bearer`, `api-key` or
//!   `x-api-key` (in that order)
//! - Match it against the configured keys in constant time
//! - Record which key matched so handlers can log it
//!
//! # Design Decisions
//! - Rejected keys are only ever logged masked
//! - Every configured key is compared, even after a match

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;

use crate::config::ApiKeyConfig;
use crate::proxy::ProxyError;

/// Name of the key that authenticated the request, stored in extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedKey(pub String);

/// The set of accepted client keys.
#[derive(Debug, Clone)]
pub struct ApiKeys {
    keys: Vec<(String, SecretString)>,
}

impl ApiKeys {
    pub fn new(configs: &[ApiKeyConfig]) -> Self {
        Self {
            keys: configs
                .iter()
                .map(|k| (k.name.clone(), k.key.clone()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Name of the matching key, if any.
    pub fn validate(&self, candidate: &str) -> Option<&str> {
        let mut matched = None;
        for (name, key) in &self.keys {
            if constant_time_compare(candidate, key.expose_secret()) && matched.is_none() {
                matched = Some(name.as_str());
            }
        }
        matched
    }
}

pub fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// First non-empty credential in the supported headers.
pub fn extract_api_key(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|k| !k.is_empty());
    if bearer.is_some() {
        return bearer;
    }
    ["api-key", "x-api-key"].into_iter().find_map(|name| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .filter(|k| !k.is_empty())
    })
}

/// Keep only a short prefix of a key for logging.
pub fn mask_api_key(key: &str) -> String {
    match key.char_indices().nth(8) {
        Some((cut, _)) => format!("{}***", &key[..cut]),
        None => "***".to_string(),
    }
}

/// Middleware rejecting requests without a valid client key.
pub async fn require_api_key(
    State(keys): State<Arc<ApiKeys>>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    let Some(candidate) = extract_api_key(request.headers()) else {
        tracing::warn!(path = %path, "Missing API key");
        return ProxyError::MissingApiKey.into_response();
    };

    match keys.validate(candidate) {
        Some(name) => {
            tracing::debug!(path = %path, key_name = %name, "API key accepted");
            let key = AuthenticatedKey(name.to_string());
            request.extensions_mut().insert(key);
            next.run(request).await
        }
        None => {
            tracing::warn!(path = %path, masked_key = %mask_api_key(candidate), "Invalid API key");
            ProxyError::InvalidApiKey.into_response()
        }
    }
}
