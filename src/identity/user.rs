//! The authenticated user behind a request.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::identity::claims::{
    Claims, CLAIM_EMAIL, CLAIM_EXPIRY, CLAIM_GROUPS, CLAIM_PREFERRED_NAME, CLAIM_SUBJECT,
};
use crate::identity::error::IdentityError;

/// Where the token of an identity came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenOrigin {
    /// Session cookie set by the proxy.
    Cookie,
    /// `Authorization: Bearer` header.
    Bearer,
}

/// Identity extracted from a validated token. Immutable once built.
#[derive(Debug, Clone)]
pub struct UserIdentity {
    id: String,
    email: String,
    preferred_name: String,
    audiences: Vec<String>,
    roles: Vec<String>,
    groups: Vec<String>,
    expires_at: DateTime<Utc>,
    claims: Claims,
    token: String,
    origin: TokenOrigin,
}

impl UserIdentity {
    /// Build an identity from a verified claim set.
    pub fn from_claims(
        claims: Claims,
        token: impl Into<String>,
        origin: TokenOrigin,
    ) -> Result<Self, IdentityError> {
        let id = claims
            .string_claim(CLAIM_SUBJECT)?
            .ok_or(IdentityError::MissingClaim(CLAIM_SUBJECT))?
            .to_string();
        let email = claims.string_claim(CLAIM_EMAIL)?.unwrap_or_default().to_string();
        let expires_at = claims
            .time_claim(CLAIM_EXPIRY)?
            .ok_or(IdentityError::MissingClaim(CLAIM_EXPIRY))?;

        let preferred_name = match claims.string_claim(CLAIM_PREFERRED_NAME) {
            Ok(Some(name)) => name.to_string(),
            _ => email.clone(),
        };

        let audiences = claims.audiences()?;

        let mut roles = claims.realm_roles();
        roles.extend(claims.client_roles());

        let groups = claims.strings_claim(CLAIM_GROUPS)?.unwrap_or_default();

        Ok(Self {
            id,
            email,
            preferred_name,
            audiences,
            roles,
            groups,
            expires_at,
            claims,
            token: token.into(),
            origin,
        })
    }

    /// Build an identity from a token received straight from the identity provider.
    pub fn from_unverified_token(token: &str, origin: TokenOrigin) -> Result<Self, IdentityError> {
        let claims = Claims::from_unverified_jwt(token)?;
        Self::from_claims(claims, token, origin)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn preferred_name(&self) -> &str {
        &self.preferred_name
    }

    pub fn audiences(&self) -> &[String] {
        &self.audiences
    }

    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn origin(&self) -> TokenOrigin {
        self.origin
    }

    pub fn is_audience(&self, audience: &str) -> bool {
        self.audiences.iter().any(|a| a == audience)
    }

    /// Roles as a comma separated list.
    pub fn roles_joined(&self) -> String {
        self.roles.join(",")
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }

    /// Time left before expiry, zero once expired.
    pub fn expires_in(&self) -> Duration {
        (self.expires_at - Utc::now()).to_std().unwrap_or(Duration::ZERO)
    }

    pub fn is_bearer(&self) -> bool {
        self.origin == TokenOrigin::Bearer
    }

    pub fn is_cookie(&self) -> bool {
        !self.is_bearer()
    }
}

impl fmt::Display for UserIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "user: {}, expires: {}, roles: {}",
            self.preferred_name,
            self.expires_at,
            self.roles_joined()
        )
    }
}
