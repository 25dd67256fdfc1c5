//! Request inspection helpers.
//!
//! # Responsibilities
//! - Name the request ID header added by the request-id layers
//! - Work out the host, scheme and original URI a client addressed

use axum::http::{header::HOST, HeaderMap, HeaderName, Request};

use crate::security::headers::X_FORWARDED_PROTO;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

pub trait RequestIdExt {
    /// Request ID assigned at the edge, or "unknown".
    fn request_id(&self) -> &str;
}

impl<B> RequestIdExt for Request<B> {
    fn request_id(&self) -> &str {
        self.headers()
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
    }
}

/// Host the client addressed: the URI authority, else the Host header.
pub fn request_host<B>(request: &Request<B>) -> Option<String> {
    if let Some(authority) = request.uri().authority() {
        return Some(authority.as_str().to_string());
    }
    request
        .headers()
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .filter(|host| !host.is_empty())
        .map(str::to_string)
}

/// Scheme the client used, honouring a fronting proxy's X-Forwarded-Proto.
pub fn request_scheme(headers: &HeaderMap) -> &str {
    headers
        .get(X_FORWARDED_PROTO)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|scheme| *scheme == "https" || *scheme == "http")
        .unwrap_or("http")
}

/// Path and query of the request.
pub fn request_uri<B>(request: &Request<B>) -> String {
    request
        .uri()
        .path_and_query()
        .map_or_else(|| "/".to_string(), |pq| pq.as_str().to_string())
}
