//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{de, Deserialize, Deserializer, Serialize};

use crate::cookies::SameSite;

/// Root configuration for the gatekeeper.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatekeeperConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Protected upstream (reverse mode).
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Session cookie settings.
    pub cookies: CookieConfig,

    /// OAuth2 client registration and provider endpoints.
    pub oidc: OidcConfig,

    /// Access token verification.
    pub auth: AuthConfig,

    /// Forward signing proxy settings.
    pub forwarding: ForwardingConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl GatekeeperConfig {
    /// True when the proxy signs outbound traffic instead of guarding an upstream.
    pub fn is_forwarding(&self) -> bool {
        self.forwarding.enabled
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

/// Upstream the reverse proxy protects.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the upstream (e.g., "http://127.0.0.1:8080").
    pub url: String,
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
        }
    }
}

/// Session cookie configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CookieConfig {
    /// Fixed cookie domain; empty derives it from the request host.
    pub domain: String,

    /// Browser-session cookies: no Expires attribute unless clearing.
    pub session_cookies: bool,

    pub http_only: bool,

    pub secure: bool,

    /// SameSite attribute: "Strict", "Lax", "None", or "" to omit it.
    #[serde(deserialize_with = "same_site_attribute")]
    pub same_site: Option<SameSite>,

    /// Base name of the access token cookie.
    pub access_name: String,

    /// Base name of the refresh token cookie.
    pub refresh_name: String,

    /// Redact session cookies before forwarding upstream.
    pub redact: bool,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            domain: String::new(),
            session_cookies: false,
            http_only: true,
            secure: true,
            same_site: Some(SameSite::Lax),
            access_name: "kc-access".to_string(),
            refresh_name: "kc-state".to_string(),
            redact: true,
        }
    }
}

fn same_site_attribute<'de, D>(deserializer: D) -> Result<Option<SameSite>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    match value.as_str() {
        "" => Ok(None),
        "Strict" => Ok(Some(SameSite::Strict)),
        "Lax" => Ok(Some(SameSite::Lax)),
        "None" => Ok(Some(SameSite::None)),
        other => Err(de::Error::unknown_variant(other, &["Strict", "Lax", "None", ""])),
    }
}

/// OAuth2 client settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OidcConfig {
    pub client_id: String,

    pub client_secret: String,

    /// Token endpoint (password, refresh and code grants).
    pub token_url: String,

    /// Authorization endpoint; empty disables login redirects.
    pub authorization_url: String,

    /// Absolute callback URL; empty derives it from the request host.
    pub redirect_url: String,

    pub scopes: Vec<String>,

    /// Keep refresh tokens in a cookie and use them on expiry.
    pub enable_refresh_tokens: bool,
}

impl Default for OidcConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            token_url: String::new(),
            authorization_url: String::new(),
            redirect_url: String::new(),
            scopes: vec!["openid".to_string()],
            enable_refresh_tokens: true,
        }
    }
}

/// Access token verification.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// JWS algorithm (e.g., "RS256", "ES256", "HS256").
    pub algorithm: String,

    /// PEM public key for asymmetric algorithms.
    pub public_key_path: Option<String>,

    /// Shared secret for HMAC algorithms.
    pub secret: Option<String>,

    /// Expected issuer, if any.
    pub issuer: Option<String>,

    /// Audience every identity must carry, if any.
    pub audience: Option<String>,

    /// Clock skew tolerance in seconds.
    pub leeway_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            algorithm: "RS256".to_string(),
            public_key_path: None,
            secret: None,
            issuer: None,
            audience: None,
            leeway_secs: 30,
        }
    }
}

/// Forward signing proxy configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ForwardingConfig {
    /// Run as a forward signing proxy.
    pub enabled: bool,

    /// Service account used for the password grant.
    pub username: String,

    pub password: String,

    /// Hosts to sign (substring match); empty signs everything.
    pub domains: Vec<String>,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
