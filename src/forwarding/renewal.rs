//! Forwarding credential renewal.
//!
//! # States
//! - NeedsLogin: no usable credential, perform a password grant
//! - Active: credential held, refresh it as expiry approaches
//!
//! # State Transitions
//! ```text
//! NeedsLogin → Active:     login succeeded (wait for 85% of the token lifetime)
//! NeedsLogin → NeedsLogin: login failed (5s backoff, retried forever)
//! Active → Active:         refresh succeeded (wait again)
//! Active → NeedsLogin:     refresh failed, or no refresh token held (no wait)
//! ```
//!
//! # Design Decisions
//! - Network calls and sleeps happen outside the credential lock
//! - Shutdown is checked at the top of every iteration and raced against
//!   every network call and every wait
//! - An expired refresh token is only logged differently; it takes the same
//!   path as any other refresh failure

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::config::ForwardingConfig;
use crate::forwarding::state::{CredentialState, SharedCredential};
use crate::identity::{TokenOrigin, UserIdentity};
use crate::observability::metrics;
use crate::provider::{IdentityProvider, ProviderError};

/// Delay before retrying a failed login.
pub const LOGIN_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Share of the remaining token lifetime slept before renewing.
const RENEWAL_FRACTION: f64 = 0.85;

/// What the loop does once a step completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pause {
    /// Start the next iteration immediately.
    Continue,
    /// Login failed; wait before retrying.
    Backoff(Duration),
    /// Credential is fresh; wait until it nears expiry.
    UntilRenewal(Duration),
}

/// Time to sleep so that roughly 15% of the credential lifetime remains on wake-up.
pub fn renewal_delay(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (expires_at - now)
        .to_std()
        .map(|remaining| remaining.mul_f64(RENEWAL_FRACTION))
        .unwrap_or(Duration::ZERO)
}

/// Background task keeping the forwarding credential valid.
pub struct CredentialRenewer {
    provider: Arc<dyn IdentityProvider>,
    username: String,
    password: String,
    credential: SharedCredential,
}

impl CredentialRenewer {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        config: &ForwardingConfig,
        credential: SharedCredential,
    ) -> Self {
        Self {
            provider,
            username: config.username.clone(),
            password: config.password.clone(),
            credential,
        }
    }

    pub fn credential(&self) -> SharedCredential {
        self.credential.clone()
    }

    /// Run until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!(username = %self.username, "Credential renewal started");

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            let pause = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                pause = self.step() => pause,
            };

            let delay = match pause {
                Pause::Continue => continue,
                Pause::Backoff(delay) | Pause::UntilRenewal(delay) => delay,
            };

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        tracing::info!("Credential renewal stopped");
    }

    /// Perform one iteration of the state machine.
    pub async fn step(&self) -> Pause {
        let mut state = CredentialState::default();
        self.credential.update(|current| {
            current.awaiting_expiry = false;
            state = current.clone();
        });

        if state.needs_login {
            return self.login().await;
        }

        tracing::info!(
            subject = %state.subject(),
            email = %state.email(),
            "Access token is about to expire"
        );

        match state.refresh_token.as_deref() {
            Some(refresh_token) => self.refresh(refresh_token, &state).await,
            None => {
                tracing::info!(
                    subject = %state.subject(),
                    email = %state.email(),
                    "Session does not support refresh token, acquiring new token"
                );
                self.demote();
                Pause::Continue
            }
        }
    }

    async fn login(&self) -> Pause {
        tracing::info!(username = %self.username, "Requesting access token for user");

        let tokens = match self.provider.password_grant(&self.username, &self.password).await {
            Ok(tokens) => tokens,
            Err(e) => {
                tracing::error!(error = %e, "Failed to login to authentication service");
                metrics::record_credential_renewal("login", "failure");
                return Pause::Backoff(LOGIN_RETRY_DELAY);
            }
        };

        let identity = match UserIdentity::from_unverified_token(&tokens.access_token, TokenOrigin::Bearer) {
            Ok(identity) => Arc::new(identity),
            Err(e) => {
                tracing::error!(error = %e, "Failed to parse the access token");
                metrics::record_credential_renewal("login", "failure");
                return Pause::Backoff(LOGIN_RETRY_DELAY);
            }
        };

        let expires_at = identity.expires_at();
        tracing::info!(
            subject = %identity.id(),
            email = %identity.email(),
            expires = %expires_at.to_rfc3339(),
            "Successfully retrieved access token for subject"
        );

        let refresh_token = tokens.refresh_token().map(str::to_string);
        self.credential.update(move |state| {
            state.token = tokens.access_token;
            state.refresh_token = refresh_token;
            state.identity = Some(identity);
            state.expires_at = Some(expires_at);
            state.awaiting_expiry = true;
            state.needs_login = false;
        });
        metrics::record_credential_renewal("login", "success");

        self.wait_for_expiry()
    }

    async fn refresh(&self, refresh_token: &str, state: &CredentialState) -> Pause {
        tracing::info!(
            subject = %state.subject(),
            email = %state.email(),
            expires = ?state.expires_at.map(|at| at.to_rfc3339()),
            "Attempting to refresh the access token"
        );

        let tokens = match self.provider.refresh_grant(refresh_token).await {
            Ok(tokens) => tokens,
            Err(ProviderError::RefreshTokenExpired) => {
                tracing::warn!(
                    subject = %state.subject(),
                    email = %state.email(),
                    "The refresh token has expired, need to login again"
                );
                metrics::record_credential_renewal("refresh", "expired");
                self.demote();
                return Pause::Continue;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to refresh the access token");
                metrics::record_credential_renewal("refresh", "failure");
                self.demote();
                return Pause::Continue;
            }
        };

        let expires_at = match UserIdentity::from_unverified_token(&tokens.access_token, TokenOrigin::Bearer) {
            Ok(identity) => identity.expires_at(),
            Err(e) => {
                tracing::error!(error = %e, "Failed to parse the refreshed access token");
                metrics::record_credential_renewal("refresh", "failure");
                self.demote();
                return Pause::Continue;
            }
        };

        let new_refresh_token = tokens.refresh_token().map(str::to_string);
        self.credential.update(move |state| {
            state.token = tokens.access_token;
            state.expires_at = Some(expires_at);
            state.awaiting_expiry = true;
            state.needs_login = false;
            if let Some(refresh_token) = new_refresh_token {
                state.refresh_token = Some(refresh_token);
            }
        });

        tracing::info!(
            subject = %state.subject(),
            email = %state.email(),
            expires = %expires_at.to_rfc3339(),
            "Successfully refreshed the access token"
        );
        metrics::record_credential_renewal("refresh", "success");

        self.wait_for_expiry()
    }

    fn demote(&self) {
        self.credential.update(|state| {
            state.needs_login = true;
            state.awaiting_expiry = false;
        });
    }

    fn wait_for_expiry(&self) -> Pause {
        let state = self.credential.snapshot();
        match (state.awaiting_expiry, state.expires_at) {
            (true, Some(expires_at)) => {
                let delay = renewal_delay(expires_at, Utc::now());
                tracing::info!(
                    token_expiration = %expires_at.to_rfc3339(),
                    renewal_duration = ?delay,
                    "Waiting for expiration of access token"
                );
                Pause::UntilRenewal(delay)
            }
            _ => Pause::Continue,
        }
    }
}
