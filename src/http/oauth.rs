//! OAuth endpoints served by the gatekeeper in reverse mode.

use std::time::Instant;

use axum::{
    body::Body,
    extract::{Query, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;

use crate::auth::RequestContext;
use crate::cookies::append_set_cookies;
use crate::http::request::{request_host, request_scheme, request_uri};
use crate::http::response::ApiError;
use crate::http::reverse::ReverseState;
use crate::observability::metrics;

#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// `GET /oauth/callback`: finish the authorization code flow.
pub async fn callback_handler(
    State(state): State<ReverseState>,
    Query(params): Query<CallbackParams>,
    request: Request<Body>,
) -> Response {
    let start = Instant::now();
    let response = callback(state, params, request)
        .await
        .unwrap_or_else(IntoResponse::into_response);
    metrics::record_request("reverse", response.status().as_u16(), start);
    response
}

async fn callback(state: ReverseState, params: CallbackParams, request: Request<Body>) -> Result<Response, ApiError> {
    if let Some(error) = params.error {
        tracing::warn!(error = %error, description = ?params.error_description, "Authorization was refused");
        return Err(ApiError::BadRequest(format!("authorization failed: {error}")));
    }
    let code = params
        .code
        .ok_or_else(|| ApiError::BadRequest("missing authorization code".into()))?;

    let host = request_host(&request).ok_or_else(|| ApiError::BadRequest("missing host".into()))?;
    let scheme = request_scheme(request.headers());
    let uri = request_uri(&request);
    let ctx = RequestContext {
        host: &host,
        scheme,
        request_uri: &uri,
    };

    let login = state
        .guard
        .complete_login(request.headers(), &ctx, &code, params.state.as_deref().unwrap_or_default())
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "Failed to complete login");
            ApiError::from(e)
        })?;

    let mut response = Redirect::to(&login.redirect_to).into_response();
    append_set_cookies(response.headers_mut(), &login.cookies);
    Ok(response)
}

/// `GET|POST /oauth/logout`: drop every session cookie.
pub async fn logout_handler(State(state): State<ReverseState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let response = match request_host(&request) {
        Some(host) => {
            let cookies = state.guard.logout(request.headers(), &host);
            tracing::info!(cleared = cookies.len(), "Session logged out");
            let mut response = StatusCode::OK.into_response();
            append_set_cookies(response.headers_mut(), &cookies);
            response
        }
        None => ApiError::BadRequest("missing host".into()).into_response(),
    };
    metrics::record_request("reverse", response.status().as_u16(), start);
    response
}
