//! Relaying a chosen backend response back to the caller.
//!
//! # Responsibilities
//! - Stream `text/event-stream` bodies chunk by chunk as they arrive
//! - Buffer everything else and mirror status and headers
//!
//! # Design Decisions
//! - Once headers have been relayed the attempt is committed: a mid-stream
//!   backend error ends the stream, it is never retried
//! - A caller that disconnects, or a server shutdown, stops the relay task;
//!   the backend connection is dropped with it
//! - Buffered bodies are read under the attempt timeout

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use super::error::ProxyError;
use crate::security::headers::forwardable_response_headers;

/// Largest chunk written to the caller in one go.
pub const STREAM_CHUNK_SIZE: usize = 4096;

/// Chunks buffered between the backend reader and the caller.
const STREAM_BUFFER: usize = 16;

/// True when the backend answered with a server-sent event stream.
pub fn is_event_stream(response: &reqwest::Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("text/event-stream"))
}

/// Split `chunk` into pieces of at most `max` bytes without copying.
pub fn split_chunk(mut chunk: Bytes, max: usize) -> Vec<Bytes> {
    let max = max.max(1);
    let mut pieces = Vec::with_capacity(chunk.len().div_ceil(max));
    while chunk.len() > max {
        pieces.push(chunk.split_to(max));
    }
    if !chunk.is_empty() {
        pieces.push(chunk);
    }
    pieces
}

/// Relay an event stream, forwarding each piece as soon as it is read.
///
/// The relay task stops when `cancel` fires or the caller goes away, even
/// while the backend is quiet.
pub fn stream_response(
    upstream: reqwest::Response,
    backend: String,
    cancel: CancellationToken,
) -> Response {
    let status = upstream.status();
    let (tx, rx) = mpsc::channel::<Result<Bytes, Infallible>>(STREAM_BUFFER);

    tokio::spawn(async move {
        let mut body = upstream.bytes_stream();
        let mut relayed: usize = 0;
        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(backend = %backend, relayed, "Stream stopped by shutdown");
                    return;
                }
                _ = tx.closed() => {
                    tracing::info!(backend = %backend, relayed, "Client disconnected during stream");
                    return;
                }
                next = body.next() => next,
            };
            let chunk = match next {
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => {
                    tracing::warn!(backend = %backend, error = %e, relayed, "Error reading backend stream");
                    return;
                }
                None => break,
            };
            for piece in split_chunk(chunk, STREAM_CHUNK_SIZE) {
                let len = piece.len();
                if tx.send(Ok(piece)).await.is_err() {
                    tracing::info!(backend = %backend, relayed, "Client disconnected during stream");
                    return;
                }
                relayed += len;
            }
        }
        tracing::debug!(backend = %backend, relayed, "Stream complete");
    });

    let mut response = Body::from_stream(ReceiverStream::new(rx)).into_response();
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    response
}

/// Read the whole backend body and mirror it with the backend's status.
///
/// A body that does not complete within `timeout` is abandoned.
pub async fn buffered_response(
    upstream: reqwest::Response,
    timeout: Duration,
) -> Result<Response, ProxyError> {
    let status = upstream.status();
    let headers = forwardable_response_headers(upstream.headers());
    let body = tokio::time::timeout(timeout, upstream.bytes())
        .await
        .map_err(|_| ProxyError::UpstreamTimeout(timeout))?
        .map_err(|e| ProxyError::UpstreamBody(e.to_string()))?;

    let mut response = Body::from(body).into_response();
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}
