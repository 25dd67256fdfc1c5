//! Outbound request signing.

use axum::http::{header::AUTHORIZATION, header::HOST, HeaderValue, Request};

use crate::forwarding::state::SharedCredential;
use crate::observability::metrics;
use crate::security::headers::X_FORWARDED_AGENT;

/// Attaches the forwarding credential to requests bound for matching hosts.
#[derive(Debug, Clone)]
pub struct RequestSigner {
    credential: SharedCredential,
    domains: Vec<String>,
}

impl RequestSigner {
    /// An empty `domains` list signs every request.
    pub fn new(credential: SharedCredential, domains: Vec<String>) -> Self {
        Self { credential, domains }
    }

    /// Substring match of the target host against the domain filter.
    pub fn matches(&self, authority: &str) -> bool {
        self.domains.is_empty() || self.domains.iter().any(|domain| authority.contains(domain.as_str()))
    }

    /// Sign `request` in place. Returns false when it was left untouched.
    pub fn sign<B>(&self, request: &mut Request<B>) -> bool {
        let authority = target_authority(request);
        if !self.matches(&authority) {
            return false;
        }

        let Some(token) = self.credential.token() else {
            tracing::warn!(host = %authority, "No access token available yet, forwarding unsigned");
            return false;
        };

        let Ok(bearer) = HeaderValue::from_str(&format!("Bearer {token}")) else {
            tracing::error!(host = %authority, "Access token is not a valid header value");
            return false;
        };

        let headers = request.headers_mut();
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(X_FORWARDED_AGENT, HeaderValue::from_static(env!("CARGO_PKG_NAME")));
        metrics::record_signed_request();
        true
    }
}

/// Host and port of an absolute-form request target, else the Host header.
/// Userinfo never takes part in matching.
fn target_authority<B>(request: &Request<B>) -> String {
    let uri = request.uri();
    if let Some(host) = uri.host() {
        return match uri.port_u16() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
    }
    request
        .headers()
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
