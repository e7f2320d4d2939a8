//! Request body limits.
//!
//! # Responsibilities
//! - Enforce maximum request body size before any parsing
//!
//! # Design Decisions
//! - A declared `Content-Length` at or above the cap is rejected without
//!   reading the body
//! - The read itself is capped, so chunked uploads cannot exceed it either
//! - Bodies exactly at the cap are rejected (413 Payload Too Large)

use axum::body::{to_bytes, Body};
use axum::http::{header, HeaderMap};
use bytes::Bytes;

use crate::proxy::ProxyError;

/// Read `body` fully, rejecting anything at or above `limit` bytes.
pub async fn read_body_limited(
    headers: &HeaderMap,
    body: Body,
    limit: usize,
) -> Result<Bytes, ProxyError> {
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if let Some(length) = declared {
        if length >= limit as u64 {
            tracing::warn!(size = length, limit, "Request body too large");
            return Err(ProxyError::PayloadTooLarge { limit });
        }
    }

    let bytes = match to_bytes(body, limit).await {
        Ok(bytes) => bytes,
        Err(e) => {
            // `to_bytes` reports overflow as a length-limit error somewhere in
            // the source chain.
            let too_large = std::iter::successors(
                Some(&e as &(dyn std::error::Error + 'static)),
                |err| err.source(),
            )
            .any(|err| err.is::<http_body_util::LengthLimitError>());
            if too_large {
                tracing::warn!(limit, "Request body too large");
                return Err(ProxyError::PayloadTooLarge { limit });
            }
            tracing::error!(error = %e, "Failed to read request body");
            return Err(ProxyError::BodyRead(e.to_string()));
        }
    };

    if bytes.len() >= limit {
        tracing::warn!(size = bytes.len(), limit, "Request body too large");
        return Err(ProxyError::PayloadTooLarge { limit });
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[tokio::test]
    async fn accepts_small_body() {
        let body = Body::from("{\"model\":\"m\"}");
        let bytes = read_body_limited(&HeaderMap::new(), body, 1024).await.unwrap();
        assert_eq!(&bytes[..], b"{\"model\":\"m\"}");
    }

    #[tokio::test]
    async fn rejects_body_at_limit() {
        let body = Body::from(vec![b'a'; 16]);
        let err = read_body_limited(&HeaderMap::new(), body, 16).await.unwrap_err();
        assert!(matches!(err, ProxyError::PayloadTooLarge { limit: 16 }));
    }

    #[tokio::test]
    async fn rejects_body_over_limit() {
        let body = Body::from(vec![b'a'; 64]);
        let err = read_body_limited(&HeaderMap::new(), body, 16).await.unwrap_err();
        assert!(matches!(err, ProxyError::PayloadTooLarge { .. }));
    }

    #[tokio::test]
    async fn rejects_declared_length_before_reading() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("1000000"));
        let err = read_body_limited(&headers, Body::empty(), 1024).await.unwrap_err();
        assert!(matches!(err, ProxyError::PayloadTooLarge { limit: 1024 }));
    }
}
