//! OAuth2 token endpoint client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use url::Url;

use crate::config::{OidcConfig, TimeoutConfig};
use crate::provider::{IdentityProvider, ProviderError, TokenResponse};

/// RFC 6749 error body.
#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Token endpoint client for a confidential or public OAuth2 client.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    http: reqwest::Client,
    token_url: Url,
    client_id: String,
    client_secret: String,
    scopes: String,
}

impl OAuthClient {
    pub fn new(config: &OidcConfig, timeouts: &TimeoutConfig) -> Result<Self, ProviderError> {
        if config.client_id.is_empty() {
            return Err(ProviderError::Configuration("client id is empty".into()));
        }
        let token_url = Url::parse(&config.token_url)
            .map_err(|e| ProviderError::Configuration(format!("token url '{}': {}", config.token_url, e)))?;

        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .timeout(Duration::from_secs(timeouts.request_secs))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            token_url,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            scopes: config.scopes.join(" "),
        })
    }

    async fn token_request(&self, grant_type: &str, params: &[(&str, &str)]) -> Result<TokenResponse, ProviderError> {
        let mut form: Vec<(&str, &str)> = vec![("grant_type", grant_type), ("client_id", &self.client_id)];
        if !self.client_secret.is_empty() {
            form.push(("client_secret", &self.client_secret));
        }
        form.extend_from_slice(params);

        let response = self
            .http
            .post(self.token_url.clone())
            .header(ACCEPT, "application/json")
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let (error, description) = match serde_json::from_slice::<OAuthErrorBody>(&body) {
                Ok(body) => (body.error, body.error_description),
                Err(_) => (status.canonical_reason().unwrap_or("unknown").to_string(), None),
            };
            tracing::debug!(
                status = status.as_u16(),
                grant_type,
                error = %error,
                description = ?description,
                "Token endpoint rejected request"
            );
            return Err(ProviderError::Rejected {
                status: status.as_u16(),
                error,
                description,
            });
        }

        serde_json::from_slice(&body).map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl IdentityProvider for OAuthClient {
    async fn password_grant(&self, username: &str, password: &str) -> Result<TokenResponse, ProviderError> {
        let mut params = vec![("username", username), ("password", password)];
        if !self.scopes.is_empty() {
            params.push(("scope", self.scopes.as_str()));
        }
        self.token_request("password", &params).await
    }

    async fn refresh_grant(&self, refresh_token: &str) -> Result<TokenResponse, ProviderError> {
        match self
            .token_request("refresh_token", &[("refresh_token", refresh_token)])
            .await
        {
            Err(ProviderError::Rejected { error, .. }) if error == "invalid_grant" => {
                Err(ProviderError::RefreshTokenExpired)
            }
            other => other,
        }
    }

    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenResponse, ProviderError> {
        self.token_request(
            "authorization_code",
            &[("code", code), ("redirect_uri", redirect_uri)],
        )
        .await
    }
}
