//! Identity provider client.
//!
//! # Responsibilities
//! - Obtain tokens with the password, refresh and authorization code grants
//! - Classify token endpoint failures (expired refresh token vs anything else)
//!
//! # Design Decisions
//! - The proxy only depends on the [`IdentityProvider`] trait; the renewal
//!   task and the session handlers never see HTTP details
//! - [`OAuthClient`] is the production implementation over `reqwest`

pub mod oauth;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

pub use oauth::OAuthClient;

/// Successful token endpoint response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,

    #[serde(default)]
    pub refresh_token: Option<String>,

    /// Access token lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,

    #[serde(default)]
    pub id_token: Option<String>,
}

impl TokenResponse {
    /// The refresh token, ignoring an empty value.
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref().filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("token endpoint request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("identity provider rejected the request ({status}): {error}")]
    Rejected {
        status: u16,
        error: String,
        description: Option<String>,
    },

    #[error("the refresh token has expired")]
    RefreshTokenExpired,

    #[error("invalid token endpoint response: {0}")]
    InvalidResponse(String),

    #[error("invalid identity provider configuration: {0}")]
    Configuration(String),
}

/// OAuth2 token operations against the identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resource owner password credentials grant.
    async fn password_grant(&self, username: &str, password: &str) -> Result<TokenResponse, ProviderError>;

    /// Refresh token grant. An expired or revoked refresh token is reported as
    /// [`ProviderError::RefreshTokenExpired`].
    async fn refresh_grant(&self, refresh_token: &str) -> Result<TokenResponse, ProviderError>;

    /// Authorization code grant.
    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenResponse, ProviderError>;
}
