//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router for the selected mode
//! - Wire up middleware (tracing, timeout, request ID)
//! - Serve on a listener until the shutdown token fires

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    body::Body,
    routing::get,
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::auth::{CALLBACK_PATH, LOGOUT_PATH};
use crate::config::TimeoutConfig;
use crate::http::forward::{forward_handler, ForwardState};
use crate::http::oauth::{callback_handler, logout_handler};
use crate::http::reverse::{reverse_handler, ReverseState};
use crate::observability::tracing::request_span;

/// Client used for every upstream call.
pub type UpstreamClient = Client<HttpConnector, Body>;

pub fn upstream_client(timeouts: &TimeoutConfig) -> UpstreamClient {
    let mut connector = HttpConnector::new();
    connector.set_connect_timeout(Some(Duration::from_secs(timeouts.connect_secs)));
    Client::builder(TokioExecutor::new()).build(connector)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Reverse,
    Forwarding,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Reverse => "reverse",
            Mode::Forwarding => "forwarding",
        }
    }
}

/// HTTP server for either proxy mode.
pub struct HttpServer {
    router: Router,
    mode: Mode,
}

impl HttpServer {
    /// Authenticating reverse proxy in front of one upstream.
    pub fn reverse(state: ReverseState, timeouts: &TimeoutConfig) -> Self {
        let router = Router::new()
            .route(CALLBACK_PATH, get(callback_handler))
            .route(LOGOUT_PATH, get(logout_handler).post(logout_handler))
            .fallback(reverse_handler)
            .with_state(state);

        Self {
            router: Self::with_layers(router, timeouts),
            mode: Mode::Reverse,
        }
    }

    /// Forward proxy signing outbound requests.
    pub fn forwarding(state: ForwardState, timeouts: &TimeoutConfig) -> Self {
        let router = Router::new().fallback(forward_handler).with_state(state);

        Self {
            router: Self::with_layers(router, timeouts),
            mode: Mode::Forwarding,
        }
    }

    /// Wrap the router with all middleware layers.
    #[allow(deprecated)]
    fn with_layers(router: Router, timeouts: &TimeoutConfig) -> Router {
        router
            .layer(TimeoutLayer::new(Duration::from_secs(timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(request_span))
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener, shutdown: CancellationToken) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, mode = self.mode.as_str(), "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
