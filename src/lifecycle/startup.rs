//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the subsystems for the selected mode in dependency order
//! - Start background tasks (credential renewal, metrics)
//! - Bind the listener and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The listener binds last (traffic only when ready)

use std::sync::Arc;

use metrics_exporter_prometheus::BuildError;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::auth::{JwtVerifier, KeyError, SessionGuard, TokenVerifier};
use crate::config::loader::ConfigError;
use crate::config::GatekeeperConfig;
use crate::forwarding::{CredentialRenewer, RequestSigner, SharedCredential};
use crate::http::{upstream_client, ForwardState, HttpServer, InvalidUpstream, ReverseState, Upstream};
use crate::lifecycle::shutdown::Shutdown;
use crate::observability::metrics;
use crate::provider::{IdentityProvider, OAuthClient, ProviderError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build the identity provider client: {0}")]
    Provider(#[from] ProviderError),

    #[error("failed to build the token verifier: {0}")]
    Verifier(#[from] KeyError),

    #[error(transparent)]
    Upstream(#[from] InvalidUpstream),

    #[error("invalid authorization url: {0}")]
    AuthorizationUrl(#[from] url::ParseError),

    #[error("invalid metrics address '{0}'")]
    MetricsAddress(String),

    #[error("failed to start the metrics endpoint: {0}")]
    Metrics(#[from] BuildError),

    #[error("failed to bind '{address}': {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Server(#[source] std::io::Error),
}

/// Build the server for the configured mode with production collaborators.
pub fn build(config: &GatekeeperConfig, shutdown: &Shutdown) -> Result<HttpServer, StartupError> {
    if config.is_forwarding() {
        let provider = Arc::new(OAuthClient::new(&config.oidc, &config.timeouts)?);
        return Ok(build_forwarding(config, provider, shutdown));
    }

    let verifier = Arc::new(JwtVerifier::from_config(&config.auth)?);
    let provider: Option<Arc<dyn IdentityProvider>> = if config.oidc.token_url.is_empty() {
        None
    } else {
        Some(Arc::new(OAuthClient::new(&config.oidc, &config.timeouts)?))
    };
    build_reverse(config, verifier, provider)
}

/// Forwarding mode: spawns the renewal task, which stops with `shutdown`.
pub fn build_forwarding(
    config: &GatekeeperConfig,
    provider: Arc<dyn IdentityProvider>,
    shutdown: &Shutdown,
) -> HttpServer {
    let credential = SharedCredential::new();
    let renewer = CredentialRenewer::new(provider, &config.forwarding, credential.clone());
    tokio::spawn(renewer.run(shutdown.subscribe()));

    tracing::info!(
        username = %config.forwarding.username,
        domains = ?config.forwarding.domains,
        "Forwarding proxy configured"
    );

    let state = ForwardState {
        signer: Arc::new(RequestSigner::new(credential, config.forwarding.domains.clone())),
        client: upstream_client(&config.timeouts),
    };
    HttpServer::forwarding(state, &config.timeouts)
}

pub fn build_reverse(
    config: &GatekeeperConfig,
    verifier: Arc<dyn TokenVerifier>,
    provider: Option<Arc<dyn IdentityProvider>>,
) -> Result<HttpServer, StartupError> {
    let upstream = Upstream::parse(&config.upstream.url)?;
    let guard = SessionGuard::new(
        &config.cookies,
        &config.oidc,
        config.auth.audience.clone(),
        verifier,
        provider,
    )?;

    tracing::info!(
        upstream = %config.upstream.url,
        budget = ?guard.codec().budget(),
        login = !config.oidc.authorization_url.is_empty(),
        "Reverse proxy configured"
    );

    let state = ReverseState {
        guard: Arc::new(guard),
        upstream: Arc::new(upstream),
        client: upstream_client(&config.timeouts),
    };
    Ok(HttpServer::reverse(state, &config.timeouts))
}

/// Start everything and serve until `shutdown` is triggered.
pub async fn start(config: GatekeeperConfig, shutdown: Shutdown) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        let addr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|_| StartupError::MetricsAddress(config.observability.metrics_address.clone()))?;
        metrics::init_metrics(addr)?;
    }

    let server = build(&config, &shutdown)?;

    let listener = TcpListener::bind(&config.listener.bind_address)
        .await
        .map_err(|source| StartupError::Bind {
            address: config.listener.bind_address.clone(),
            source,
        })?;

    let result = server.run(listener, shutdown.subscribe()).await;
    // The renewal task must not outlive the server.
    shutdown.trigger();
    result.map_err(StartupError::Server)
}
