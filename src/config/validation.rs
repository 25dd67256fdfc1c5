//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check that the selected mode has what it needs (credentials, keys, upstream)
//! - Validate value ranges and URLs
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatekeeperConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use std::str::FromStr;

use jsonwebtoken::Algorithm;
use thiserror::Error;
use url::Url;

use crate::config::schema::GatekeeperConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid listener bind address '{0}'")]
    BindAddress(String),

    #[error("{field} must be greater than zero")]
    ZeroTimeout { field: &'static str },

    #[error("{field} is required{context}")]
    Missing {
        field: &'static str,
        context: &'static str,
    },

    #[error("{field} is not a valid http(s) URL: '{value}'")]
    InvalidUrl { field: &'static str, value: String },

    #[error("unsupported token algorithm '{0}'")]
    Algorithm(String),

    #[error("cookie access_name and refresh_name must differ")]
    CookieNameClash,
}

fn missing(field: &'static str, context: &'static str) -> ValidationError {
    ValidationError::Missing { field, context }
}

fn check_url(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    let valid = Url::parse(value)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.host().is_some())
        .unwrap_or(false);
    if !valid {
        errors.push(ValidationError::InvalidUrl {
            field,
            value: value.to_string(),
        });
    }
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &GatekeeperConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout { field: "timeouts.request_secs" });
    }
    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::ZeroTimeout { field: "timeouts.connect_secs" });
    }
    if config.cookies.access_name.is_empty() {
        errors.push(missing("cookies.access_name", ""));
    }
    if config.cookies.refresh_name.is_empty() {
        errors.push(missing("cookies.refresh_name", ""));
    }
    if !config.cookies.access_name.is_empty() && config.cookies.access_name == config.cookies.refresh_name {
        errors.push(ValidationError::CookieNameClash);
    }

    if config.is_forwarding() {
        validate_forwarding(config, &mut errors);
    } else {
        validate_reverse(config, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_forwarding(config: &GatekeeperConfig, errors: &mut Vec<ValidationError>) {
    const CONTEXT: &str = " in forwarding mode";

    if config.oidc.client_id.is_empty() {
        errors.push(missing("oidc.client_id", CONTEXT));
    }
    if config.oidc.token_url.is_empty() {
        errors.push(missing("oidc.token_url", CONTEXT));
    } else {
        check_url(errors, "oidc.token_url", &config.oidc.token_url);
    }
    if config.forwarding.username.is_empty() {
        errors.push(missing("forwarding.username", CONTEXT));
    }
    if config.forwarding.password.is_empty() {
        errors.push(missing("forwarding.password", CONTEXT));
    }
}

fn validate_reverse(config: &GatekeeperConfig, errors: &mut Vec<ValidationError>) {
    const CONTEXT: &str = " in reverse proxy mode";

    if config.upstream.url.is_empty() {
        errors.push(missing("upstream.url", CONTEXT));
    } else {
        check_url(errors, "upstream.url", &config.upstream.url);
    }

    match Algorithm::from_str(&config.auth.algorithm) {
        Ok(Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) => {
            if config.auth.secret.as_deref().unwrap_or_default().is_empty() {
                errors.push(missing("auth.secret", " for HMAC algorithms"));
            }
        }
        Ok(_) => {
            if config.auth.public_key_path.is_none() {
                errors.push(missing("auth.public_key_path", " for asymmetric algorithms"));
            }
        }
        Err(_) => errors.push(ValidationError::Algorithm(config.auth.algorithm.clone())),
    }

    if !config.oidc.authorization_url.is_empty() {
        check_url(errors, "oidc.authorization_url", &config.oidc.authorization_url);
        if config.oidc.client_id.is_empty() {
            errors.push(missing("oidc.client_id", " when login redirects are enabled"));
        }
        if config.oidc.token_url.is_empty() {
            errors.push(missing("oidc.token_url", " when login redirects are enabled"));
        }
    }
    if !config.oidc.token_url.is_empty() {
        check_url(errors, "oidc.token_url", &config.oidc.token_url);
    }
    if !config.oidc.redirect_url.is_empty() {
        check_url(errors, "oidc.redirect_url", &config.oidc.redirect_url);
    }
}
