//! Access token verification.
//!
//! # Design Decisions
//! - Signature, expiry and issuer are checked here; audience membership is a
//!   session policy and is checked against the extracted identity instead
//! - Expiry is reported distinctly so cookie sessions can be refreshed

use std::fs;
use std::str::FromStr;

use jsonwebtoken::{errors::ErrorKind, Algorithm, DecodingKey, Validation};
use thiserror::Error;

use crate::config::AuthConfig;
use crate::identity::Claims;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("the access token has expired")]
    Expired,

    #[error("invalid access token: {0}")]
    Invalid(String),
}

/// Failure to build a verifier from configuration.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("unsupported signing algorithm '{0}'")]
    Algorithm(String),

    #[error("no {0} configured for the signing algorithm")]
    Missing(&'static str),

    #[error("failed to read key '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid verification key: {0}")]
    Key(#[from] jsonwebtoken::errors::Error),
}

/// Checks a token's signature and standard claims.
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<Claims, VerifyError>;
}

/// [`TokenVerifier`] over a single static key.
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(algorithm: Algorithm, key: DecodingKey, config: &AuthConfig) -> Self {
        let mut validation = Validation::new(algorithm);
        validation.validate_aud = false;
        validation.leeway = config.leeway_secs;
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
        }
        Self { key, validation }
    }

    pub fn from_config(config: &AuthConfig) -> Result<Self, KeyError> {
        let algorithm =
            Algorithm::from_str(&config.algorithm).map_err(|_| KeyError::Algorithm(config.algorithm.clone()))?;

        let key = match algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
                let secret = config.secret.as_deref().ok_or(KeyError::Missing("secret"))?;
                DecodingKey::from_secret(secret.as_bytes())
            }
            _ => {
                let path = config
                    .public_key_path
                    .as_deref()
                    .ok_or(KeyError::Missing("public key"))?;
                let pem = fs::read(path).map_err(|source| KeyError::Io {
                    path: path.to_string(),
                    source,
                })?;
                match algorithm {
                    Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(&pem)?,
                    Algorithm::EdDSA => DecodingKey::from_ed_pem(&pem)?,
                    _ => DecodingKey::from_rsa_pem(&pem)?,
                }
            }
        };

        tracing::info!(algorithm = ?algorithm, issuer = ?config.issuer, "Token verifier configured");
        Ok(Self::new(algorithm, key, config))
    }
}

impl TokenVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Result<Claims, VerifyError> {
        match jsonwebtoken::decode::<Claims>(token, &self.key, &self.validation) {
            Ok(data) => Ok(data.claims),
            Err(e) => match e.kind() {
                ErrorKind::ExpiredSignature => Err(VerifyError::Expired),
                _ => Err(VerifyError::Invalid(e.to_string())),
            },
        }
    }
}
