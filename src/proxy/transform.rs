//! Outbound payload rewriting for backend compatibility.
//!
//! - `max_tokens` becomes `max_completion_tokens` unless the latter is
//!   already present (newer deployments reject the legacy name)
//! - Fields the backend protocol does not accept are dropped
//!
//! The rewrite is idempotent: the legacy field is gone after one pass.

use bytes::Bytes;
use serde_json::{Map, Value};

pub const LEGACY_TOKEN_LIMIT: &str = "max_tokens";
pub const TOKEN_LIMIT: &str = "max_completion_tokens";

/// Fields stripped before forwarding.
pub const UNSUPPORTED_FIELDS: &[&str] = &["chat_template_kwargs", "enable_thinking"];

/// Rewrite a JSON object in place. Returns true when anything changed.
pub fn transform_payload(payload: &mut Map<String, Value>) -> bool {
    let mut modified = false;

    if !payload.contains_key(TOKEN_LIMIT) {
        if let Some(value) = payload.remove(LEGACY_TOKEN_LIMIT) {
            tracing::debug!(value = %value, "Renamed max_tokens to max_completion_tokens");
            payload.insert(TOKEN_LIMIT.to_string(), value);
            modified = true;
        }
    }

    for field in UNSUPPORTED_FIELDS.iter().copied() {
        if payload.remove(field).is_some() {
            tracing::debug!(field, "Removed unsupported parameter");
            modified = true;
        }
    }

    modified
}

/// Apply [`transform_payload`] to an already-parsed body.
///
/// Returns the original bytes untouched when no rewrite was needed, or when
/// the payload is not a JSON object.
pub fn transform_body(original: Bytes, mut payload: Value) -> Bytes {
    let Some(object) = payload.as_object_mut() else {
        return original;
    };
    if !transform_payload(object) {
        return original;
    }
    match serde_json::to_vec(&payload) {
        Ok(rewritten) => Bytes::from(rewritten),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to re-serialize rewritten payload, forwarding original");
            original
        }
    }
}
