//! Authenticating reverse proxy handler.
//!
//! # Data Flow
//! ```text
//! request
//!     → SessionGuard::resolve
//!         authenticated → identity headers, cookie redaction,
//!                         hop-by-hop stripping, X-Forwarded-*
//!                       → upstream (session cookies appended to the response)
//!         login         → 303 to the authorization endpoint
//!         denied        → 401 / 403 JSON error
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header::HOST, uri::Uri, Method, Request, Version},
    response::{IntoResponse, Redirect, Response},
};
use thiserror::Error;

use crate::auth::{RequestContext, SessionGuard, SessionOutcome};
use crate::cookies::{append_set_cookies, filter_cookies};
use crate::http::request::{request_host, request_scheme, request_uri, RequestIdExt};
use crate::http::response::ApiError;
use crate::http::server::UpstreamClient;
use crate::observability::metrics;
use crate::security::headers::{append_forwarded_headers, inject_identity_headers, strip_hop_by_hop};

#[derive(Debug, Error)]
#[error("invalid upstream url '{url}': {reason}")]
pub struct InvalidUpstream {
    url: String,
    reason: String,
}

/// Base URL requests are forwarded to.
#[derive(Debug, Clone)]
pub struct Upstream {
    base: String,
}

impl Upstream {
    pub fn parse(url: &str) -> Result<Self, InvalidUpstream> {
        let invalid = |reason: &str| InvalidUpstream {
            url: url.to_string(),
            reason: reason.to_string(),
        };

        let uri: Uri = url.parse().map_err(|_| invalid("not a valid URI"))?;
        if uri.scheme_str() != Some("http") {
            return Err(invalid("only http upstreams are supported"));
        }
        if uri.authority().is_none() {
            return Err(invalid("missing host"));
        }
        if uri.query().is_some() {
            return Err(invalid("must not carry a query"));
        }

        Ok(Self {
            base: url.trim_end_matches('/').to_string(),
        })
    }

    /// Upstream URI for a request path and query.
    pub fn target(&self, path_and_query: &str) -> Option<Uri> {
        format!("{}{}", self.base, path_and_query).parse().ok()
    }
}

/// State for the reverse-mode handlers.
#[derive(Clone)]
pub struct ReverseState {
    pub guard: Arc<SessionGuard>,
    pub upstream: Arc<Upstream>,
    pub client: UpstreamClient,
}

/// Fallback handler: every path not claimed by the OAuth endpoints.
pub async fn reverse_handler(
    State(state): State<ReverseState>,
    ConnectInfo(client): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start = Instant::now();
    let response = proxy(state, client, request)
        .await
        .unwrap_or_else(IntoResponse::into_response);
    metrics::record_request("reverse", response.status().as_u16(), start);
    response
}

async fn proxy(state: ReverseState, client: SocketAddr, mut request: Request<Body>) -> Result<Response, ApiError> {
    if request.method() == Method::CONNECT {
        return Err(ApiError::NotImplemented("CONNECT is not supported".into()));
    }

    let request_id = request.request_id().to_string();
    let host = request_host(&request).ok_or_else(|| ApiError::BadRequest("missing host".into()))?;
    let scheme = request_scheme(request.headers()).to_string();
    let uri = request_uri(&request);
    let ctx = RequestContext {
        host: &host,
        scheme: &scheme,
        request_uri: &uri,
    };

    let (identity, cookies) = match state.guard.resolve(request.headers(), &ctx).await {
        SessionOutcome::Authenticated { identity, cookies } => (identity, cookies),
        SessionOutcome::Login { location, cookies } => {
            let mut response = Redirect::to(&location).into_response();
            append_set_cookies(response.headers_mut(), &cookies);
            return Ok(response);
        }
        SessionOutcome::Denied { error, cookies } => {
            tracing::info!(request_id = %request_id, uri = %uri, error = %error, "Request denied");
            let mut response = ApiError::from(error).into_response();
            append_set_cookies(response.headers_mut(), &cookies);
            return Ok(response);
        }
    };

    let target = state
        .upstream
        .target(&uri)
        .ok_or_else(|| ApiError::BadRequest("invalid request target".into()))?;

    tracing::debug!(
        request_id = %request_id,
        subject = %identity.id(),
        target = %target,
        "Forwarding authenticated request"
    );

    let headers = request.headers_mut();
    inject_identity_headers(headers, &identity);
    filter_cookies(headers, state.guard.redacted_cookies());
    strip_hop_by_hop(headers);
    append_forwarded_headers(headers, Some(client), &scheme);
    headers.remove(HOST);
    *request.uri_mut() = target;
    *request.version_mut() = Version::HTTP_11;

    let upstream_response = state.client.request(request).await.map_err(|e| {
        tracing::error!(request_id = %request_id, error = %e, "Upstream error");
        ApiError::BadGateway("upstream request failed".into())
    })?;

    let (mut parts, body) = upstream_response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    let mut response = Response::from_parts(parts, Body::new(body));
    append_set_cookies(response.headers_mut(), &cookies);
    Ok(response)
}
