//! Bearer-token guard for the admin routes.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use secrecy::{ExposeSecret, SecretString};

use crate::http::response::error_response;
use crate::security::auth::constant_time_compare;

/// Reject requests whose `Authorization: Bearer` token is not the admin key.
pub async fn admin_auth_middleware(
    State(admin_key): State<Arc<SecretString>>,
    request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    let expected = admin_key.expose_secret();
    match token {
        Some(token) if !expected.is_empty() && constant_time_compare(token, expected) => {
            next.run(request).await
        }
        _ => {
            tracing::warn!(path = %request.uri().path(), "Rejected admin request");
            error_response(
                StatusCode::UNAUTHORIZED,
                "Invalid admin credentials.",
                "invalid_request_error",
                "invalid_admin_key",
            )
        }
    }
}
