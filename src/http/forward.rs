//! Forward signing proxy handler.
//!
//! Clients use the gatekeeper as an HTTP proxy (absolute-form request
//! targets). Requests to matching hosts leave with the service account's
//! bearer token attached.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Method, Request, Version},
    response::{IntoResponse, Response},
};

use crate::forwarding::RequestSigner;
use crate::http::request::RequestIdExt;
use crate::http::response::ApiError;
use crate::http::server::UpstreamClient;
use crate::observability::metrics;
use crate::security::headers::{append_forwarded_headers, strip_hop_by_hop};

/// State for the forwarding-mode handler.
#[derive(Clone)]
pub struct ForwardState {
    pub signer: Arc<RequestSigner>,
    pub client: UpstreamClient,
}

pub async fn forward_handler(
    State(state): State<ForwardState>,
    ConnectInfo(client): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start = Instant::now();
    let response = forward(state, client, request)
        .await
        .unwrap_or_else(IntoResponse::into_response);
    metrics::record_request("forwarding", response.status().as_u16(), start);
    response
}

async fn forward(state: ForwardState, client: SocketAddr, mut request: Request<Body>) -> Result<Response, ApiError> {
    if request.method() == Method::CONNECT {
        return Err(ApiError::NotImplemented("CONNECT tunnelling is not supported".into()));
    }

    // Origin-form targets are addressed to the proxy itself.
    if request.uri().authority().is_none() {
        return Err(ApiError::BadRequest("not a proxy request".into()));
    }
    if request.uri().scheme_str() != Some("http") {
        return Err(ApiError::BadRequest("only http targets can be proxied".into()));
    }

    let request_id = request.request_id().to_string();
    let headers = request.headers_mut();
    strip_hop_by_hop(headers);
    append_forwarded_headers(headers, Some(client), "http");

    let signed = state.signer.sign(&mut request);
    *request.version_mut() = Version::HTTP_11;

    tracing::debug!(
        request_id = %request_id,
        target = %request.uri(),
        signed,
        "Forwarding outbound request"
    );

    let upstream_response = state.client.request(request).await.map_err(|e| {
        tracing::error!(request_id = %request_id, error = %e, "Upstream error");
        ApiError::BadGateway("upstream request failed".into())
    })?;

    let (mut parts, body) = upstream_response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    Ok(Response::from_parts(parts, Body::new(body)))
}
