//! Header filtering between the caller and backends.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers in both directions
//! - Keep caller credentials away from backends
//!
//! # Design Decisions
//! - `host` and `content-length` are recomputed by the HTTP client
//! - The backend credential is the only authentication forwarded

use axum::http::{header, HeaderMap, HeaderName};

/// Connection-scoped headers that must not be forwarded (RFC 9110 §7.6.1).
const HOP_BY_HOP: &[HeaderName] = &[
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Headers carrying the caller's credential for this router.
const CALLER_CREDENTIALS: &[&str] = &["authorization", "api-key", "x-api-key"];

pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(name) || name.as_str() == "keep-alive"
}

/// Copy of inbound headers that is safe to send to a backend.
pub fn forwardable_request_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(inbound.len());
    for (name, value) in inbound {
        if is_hop_by_hop(name)
            || name == header::HOST
            || name == header::CONTENT_LENGTH
            || CALLER_CREDENTIALS.contains(&name.as_str())
        {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}

/// Copy of backend response headers that is safe to mirror to the caller.
pub fn forwardable_response_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(upstream.len());
    for (name, value) in upstream {
        if is_hop_by_hop(name) || name == header::CONTENT_LENGTH {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn request_headers_drop_credentials_and_hop_by_hop() {
        let mut inbound = HeaderMap::new();
        inbound.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer sk-client"));
        inbound.insert("x-api-key", HeaderValue::from_static("sk-client"));
        inbound.insert(header::HOST, HeaderValue::from_static("router.local"));
        inbound.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        inbound.insert(header::CONTENT_LENGTH, HeaderValue::from_static("42"));
        inbound.insert("x-request-id", HeaderValue::from_static("abc"));
        inbound.append(header::ACCEPT, HeaderValue::from_static("text/event-stream"));
        inbound.append(header::ACCEPT, HeaderValue::from_static("application/json"));

        let out = forwardable_request_headers(&inbound);
        assert_eq!(out.len(), 3);
        assert_eq!(out.get("x-request-id").unwrap(), "abc");
        assert_eq!(out.get_all(header::ACCEPT).iter().count(), 2);
    }

    #[test]
    fn response_headers_drop_framing() {
        let mut upstream = HeaderMap::new();
        upstream.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        upstream.insert(header::CONTENT_LENGTH, HeaderValue::from_static("10"));
        upstream.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        upstream.insert("x-ms-region", HeaderValue::from_static("East US"));

        let out = forwardable_response_headers(&upstream);
        assert_eq!(out.len(), 2);
        assert!(out.contains_key(header::CONTENT_TYPE));
        assert!(out.contains_key("x-ms-region"));
    }
}
