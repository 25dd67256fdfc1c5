//! Reverse-mode session resolution.
//!
//! # Data Flow
//! ```text
//! Authorization: Bearer <token> ──▶ verify ──▶ identity (origin Bearer)
//!        │ absent
//!        ▼
//! divided access cookie ──▶ verify ──▶ identity (origin Cookie)
//!        │ absent/expired                     │
//!        ▼                                    ▼
//! refresh cookie + provider ──▶ refresh grant ──▶ rewrite cookies
//!        │ unavailable
//!        ▼
//! state cookies + 303 to the authorization endpoint (or 401)
//! ```
//!
//! # Design Decisions
//! - Bearer sessions are never refreshed or redirected; they either verify or
//!   get a 401
//! - A failed refresh clears the whole session instead of retrying

use axum::http::{header::AUTHORIZATION, HeaderMap};
use chrono::{TimeDelta, Utc};
use std::sync::Arc;
use thiserror::Error;

use crate::auth::login::{callback_uri, AuthorizationRedirect};
use crate::auth::verifier::{TokenVerifier, VerifyError};
use crate::config::{CookieConfig, OidcConfig};
use crate::cookies::{CookieCodec, RequestCookies, SetCookie};
use crate::identity::{Claims, IdentityError, TokenOrigin, UserIdentity};
use crate::observability::metrics;
use crate::provider::IdentityProvider;

/// Reasons a request is refused.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("authentication required")]
    Unauthenticated,

    #[error(transparent)]
    Token(#[from] VerifyError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error("the identity is not permitted for audience '{0}'")]
    Audience(String),

    #[error("failed to refresh the session: {0}")]
    Refresh(String),

    #[error("the state parameter does not match the login request")]
    StateMismatch,

    #[error("login is not configured")]
    LoginUnavailable,

    #[error("failed to exchange the authorization code: {0}")]
    Exchange(String),
}

impl SessionError {
    /// The caller is known but not allowed, as opposed to unauthenticated.
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::Audience(_) | Self::StateMismatch | Self::Exchange(_))
    }
}

/// Where a request came from, as needed to build cookies and redirects.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext<'a> {
    pub host: &'a str,
    pub scheme: &'a str,
    /// Path and query of the original request.
    pub request_uri: &'a str,
}

#[derive(Debug)]
pub enum SessionOutcome {
    /// Forward upstream; `cookies` are set on the response (after a refresh).
    Authenticated {
        identity: UserIdentity,
        cookies: Vec<SetCookie>,
    },
    /// Send the browser to the authorization endpoint.
    Login { location: String, cookies: Vec<SetCookie> },
    Denied {
        error: SessionError,
        cookies: Vec<SetCookie>,
    },
}

/// Result of a completed authorization code round trip.
#[derive(Debug)]
pub struct CompletedLogin {
    pub identity: UserIdentity,
    /// Where the browser was headed before the login.
    pub redirect_to: String,
    pub cookies: Vec<SetCookie>,
}

/// Validates and maintains browser and bearer sessions.
pub struct SessionGuard {
    codec: CookieCodec,
    verifier: Arc<dyn TokenVerifier>,
    provider: Option<Arc<dyn IdentityProvider>>,
    login: Option<AuthorizationRedirect>,
    oidc: OidcConfig,
    audience: Option<String>,
    redacted: Vec<String>,
}

impl SessionGuard {
    pub fn new(
        cookies: &CookieConfig,
        oidc: &OidcConfig,
        audience: Option<String>,
        verifier: Arc<dyn TokenVerifier>,
        provider: Option<Arc<dyn IdentityProvider>>,
    ) -> Result<Self, url::ParseError> {
        let redacted = if cookies.redact {
            vec![cookies.access_name.clone(), cookies.refresh_name.clone()]
        } else {
            Vec::new()
        };

        Ok(Self {
            codec: CookieCodec::from_config(cookies),
            verifier,
            provider,
            login: AuthorizationRedirect::from_config(oidc)?,
            oidc: oidc.clone(),
            audience,
            redacted,
        })
    }

    pub fn codec(&self) -> &CookieCodec {
        &self.codec
    }

    /// Cookie name prefixes censored before forwarding upstream.
    pub fn redacted_cookies(&self) -> &[String] {
        &self.redacted
    }

    pub async fn resolve(&self, headers: &HeaderMap, ctx: &RequestContext<'_>) -> SessionOutcome {
        if let Some(token) = bearer_token(headers) {
            return match self.identify(token, TokenOrigin::Bearer) {
                Ok(identity) => SessionOutcome::Authenticated {
                    identity,
                    cookies: Vec::new(),
                },
                Err(error) => {
                    tracing::debug!(error = %error, "Rejected bearer token");
                    SessionOutcome::Denied {
                        error,
                        cookies: Vec::new(),
                    }
                }
            };
        }

        let cookies = RequestCookies::from_headers(headers);
        let Some(token) = self.codec.read_access_token(&cookies) else {
            if self.codec.read_refresh_token(&cookies).is_some() {
                return self.refresh_or_login(&cookies, ctx).await;
            }
            return self.login_or_deny(ctx, Vec::new());
        };

        match self.identify(&token, TokenOrigin::Cookie) {
            Ok(identity) => SessionOutcome::Authenticated {
                identity,
                cookies: Vec::new(),
            },
            Err(SessionError::Token(VerifyError::Expired)) => self.refresh_or_login(&cookies, ctx).await,
            Err(error @ SessionError::Audience(_)) => SessionOutcome::Denied {
                error,
                cookies: Vec::new(),
            },
            Err(error) => {
                tracing::warn!(error = %error, "Discarding invalid session cookie");
                let cleared = self.codec.clear_all(&cookies, ctx.host);
                self.login_or_deny(ctx, cleared)
            }
        }
    }

    /// Finish the authorization code flow started by a login redirect.
    pub async fn complete_login(
        &self,
        headers: &HeaderMap,
        ctx: &RequestContext<'_>,
        code: &str,
        state: &str,
    ) -> Result<CompletedLogin, SessionError> {
        let provider = self.provider.as_ref().ok_or(SessionError::LoginUnavailable)?;
        let cookies = RequestCookies::from_headers(headers);

        if state.is_empty() || self.codec.read_state(&cookies).as_deref() != Some(state) {
            return Err(SessionError::StateMismatch);
        }

        let redirect_uri = callback_uri(&self.oidc, ctx.scheme, ctx.host);
        let tokens = provider
            .exchange_code(code, &redirect_uri)
            .await
            .map_err(|e| SessionError::Exchange(e.to_string()))?;
        let identity = self.identify(&tokens.access_token, TokenOrigin::Cookie)?;

        let redirect_to = self
            .codec
            .read_request_uri(&cookies)
            .filter(|uri| uri.starts_with('/') && !uri.starts_with("//"))
            .unwrap_or_else(|| "/".to_string());

        let mut set = self.session_cookies(ctx.host, &identity, tokens.refresh_token());
        set.extend(self.codec.clear_state(&cookies, ctx.host));

        tracing::info!(
            subject = %identity.id(),
            email = %identity.email(),
            expires = %identity.expires_at().to_rfc3339(),
            "Issuing session for authenticated user"
        );

        Ok(CompletedLogin {
            identity,
            redirect_to,
            cookies: set,
        })
    }

    /// Cookies removing every part of the session.
    pub fn logout(&self, headers: &HeaderMap, host: &str) -> Vec<SetCookie> {
        self.codec.clear_all(&RequestCookies::from_headers(headers), host)
    }

    fn identify(&self, token: &str, origin: TokenOrigin) -> Result<UserIdentity, SessionError> {
        let claims = self.verifier.verify(token)?;
        let identity = UserIdentity::from_claims(claims, token, origin)?;

        if let Some(audience) = &self.audience {
            if !identity.is_audience(audience) {
                return Err(SessionError::Audience(audience.clone()));
            }
        }
        Ok(identity)
    }

    async fn refresh_or_login(&self, cookies: &RequestCookies, ctx: &RequestContext<'_>) -> SessionOutcome {
        let refresh_token = if self.oidc.enable_refresh_tokens {
            self.codec.read_refresh_token(cookies)
        } else {
            None
        };

        let (Some(provider), Some(refresh_token)) = (&self.provider, refresh_token) else {
            tracing::debug!("Session expired and cannot be refreshed");
            let cleared = self.codec.clear_access_token(cookies, ctx.host);
            return self.login_or_deny(ctx, cleared);
        };

        let refreshed = match provider.refresh_grant(&refresh_token).await {
            Ok(tokens) => self
                .identify(&tokens.access_token, TokenOrigin::Cookie)
                .map(|identity| (identity, tokens)),
            Err(e) => Err(SessionError::Refresh(e.to_string())),
        };

        match refreshed {
            Ok((identity, tokens)) => {
                tracing::info!(
                    subject = %identity.id(),
                    expires = %identity.expires_at().to_rfc3339(),
                    "Refreshed session access token"
                );
                metrics::record_credential_renewal("session", "success");
                let refresh_token = tokens.refresh_token().unwrap_or(&refresh_token);
                let set = self.session_cookies(ctx.host, &identity, Some(refresh_token));
                SessionOutcome::Authenticated { identity, cookies: set }
            }
            Err(error) => {
                tracing::warn!(error = %error, "Failed to refresh session, clearing cookies");
                metrics::record_credential_renewal("session", "failure");
                SessionOutcome::Denied {
                    error,
                    cookies: self.codec.clear_all(cookies, ctx.host),
                }
            }
        }
    }

    fn login_or_deny(&self, ctx: &RequestContext<'_>, mut cookies: Vec<SetCookie>) -> SessionOutcome {
        let Some(login) = &self.login else {
            return SessionOutcome::Denied {
                error: SessionError::Unauthenticated,
                cookies,
            };
        };

        let (state, state_cookies) = self.codec.write_state_parameter(ctx.host, ctx.request_uri);
        cookies.extend(state_cookies);
        let location = login.location(&callback_uri(&self.oidc, ctx.scheme, ctx.host), &state);
        tracing::debug!(request_uri = %ctx.request_uri, "Redirecting to authorization endpoint");

        SessionOutcome::Login { location, cookies }
    }

    /// Access cookie, plus the refresh cookie when refresh tokens are enabled.
    ///
    /// With a refresh token stored, the access cookie outlives its token so
    /// an expired session can still be recognised and refreshed.
    fn session_cookies(&self, host: &str, identity: &UserIdentity, refresh_token: Option<&str>) -> Vec<SetCookie> {
        let now = Utc::now();
        let access_lifetime = (identity.expires_at() - now).max(TimeDelta::seconds(1));

        let refresh = refresh_token
            .filter(|_| self.oidc.enable_refresh_tokens)
            .map(|token| (token, token_lifetime(token, now).unwrap_or(access_lifetime)));

        match refresh {
            Some((token, lifetime)) => {
                let mut cookies = self.codec.write_access_token(host, identity.token(), lifetime);
                cookies.extend(self.codec.write_refresh_token(host, token, lifetime));
                cookies
            }
            None => self.codec.write_access_token(host, identity.token(), access_lifetime),
        }
    }
}

/// Remaining lifetime of a JWT-shaped token, if it carries a future `exp`.
fn token_lifetime(token: &str, now: chrono::DateTime<Utc>) -> Option<TimeDelta> {
    let expires_at = Claims::from_unverified_jwt(token).ok()?.time_claim("exp").ok()??;
    let lifetime = expires_at - now;
    (lifetime > TimeDelta::zero()).then_some(lifetime)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
