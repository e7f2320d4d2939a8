//! Response helpers.
//!
//! Errors use the OpenAI-compatible envelope
//! `{"error": {"message", "type", "code"}}` so existing client SDKs can
//! surface them unchanged.

use std::any::Any;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody<'a> {
    pub error: ErrorDetail<'a>,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail<'a> {
    pub message: &'a str,
    #[serde(rename = "type")]
    pub error_type: &'a str,
    pub code: &'a str,
}

pub fn error_response(status: StatusCode, message: &str, error_type: &str, code: &str) -> Response {
    let body = ErrorBody {
        error: ErrorDetail {
            message,
            error_type,
            code,
        },
    };
    (status, Json(body)).into_response()
}

/// Turns a handler panic into a 500 so the connection still gets an answer.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = %detail, "Handler panicked");
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal server error",
        "server_error",
        "internal_error",
    )
}
