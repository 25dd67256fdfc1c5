//! Token claim access.
//!
//! Two decoding regimes live side by side:
//! - strict accessors (`string_claim`, `strings_claim`, `time_claim`) fail on a
//!   present claim of the wrong shape
//! - lenient role decoders return nothing on any shape mismatch

use base64::{
    engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD},
    Engine as _,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::identity::error::IdentityError;

pub const CLAIM_SUBJECT: &str = "sub";
pub const CLAIM_EMAIL: &str = "email";
pub const CLAIM_EXPIRY: &str = "exp";
pub const CLAIM_AUDIENCE: &str = "aud";
pub const CLAIM_PREFERRED_NAME: &str = "preferred_username";
pub const CLAIM_REALM_ACCESS: &str = "realm_access";
pub const CLAIM_RESOURCE_ACCESS: &str = "resource_access";
pub const CLAIM_RESOURCE_ROLES: &str = "roles";
pub const CLAIM_GROUPS: &str = "groups";

/// Decoded claim set of a token.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Claims(Map<String, Value>);

impl Claims {
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Decode the payload segment of a compact JWT without checking its signature.
    ///
    /// Only for tokens obtained directly from the identity provider.
    pub fn from_unverified_jwt(token: &str) -> Result<Self, IdentityError> {
        let mut segments = token.split('.');
        let payload = match (segments.next(), segments.next(), segments.next()) {
            (Some(_), Some(payload), Some(_)) => payload,
            _ => return Err(IdentityError::MalformedToken("expected three segments".into())),
        };

        let bytes = URL_SAFE_NO_PAD
            .decode(payload)
            .or_else(|_| URL_SAFE.decode(payload))
            .map_err(|e| IdentityError::MalformedToken(e.to_string()))?;

        serde_json::from_slice(&bytes).map_err(|e| IdentityError::MalformedToken(e.to_string()))
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// A string claim; `Ok(None)` when absent.
    pub fn string_claim(&self, name: &str) -> Result<Option<&str>, IdentityError> {
        match self.0.get(name) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(_) => Err(IdentityError::InvalidClaim(name.to_string())),
        }
    }

    /// A list-of-strings claim; `Ok(None)` when absent.
    pub fn strings_claim(&self, name: &str) -> Result<Option<Vec<String>>, IdentityError> {
        match self.0.get(name) {
            None => Ok(None),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    _ => Err(IdentityError::InvalidClaim(name.to_string())),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Some),
            Some(_) => Err(IdentityError::InvalidClaim(name.to_string())),
        }
    }

    /// A NumericDate claim (seconds since the epoch).
    pub fn time_claim(&self, name: &str) -> Result<Option<DateTime<Utc>>, IdentityError> {
        let Some(value) = self.0.get(name) else {
            return Ok(None);
        };
        let seconds = value
            .as_f64()
            .ok_or_else(|| IdentityError::InvalidClaim(name.to_string()))?;
        DateTime::from_timestamp(seconds.trunc() as i64, 0)
            .map(Some)
            .ok_or_else(|| IdentityError::InvalidClaim(name.to_string()))
    }

    /// Audience as a single string or a list; absence (or any other shape) is fatal.
    pub fn audiences(&self) -> Result<Vec<String>, IdentityError> {
        if let Ok(Some(aud)) = self.string_claim(CLAIM_AUDIENCE) {
            return Ok(vec![aud.to_string()]);
        }
        match self.strings_claim(CLAIM_AUDIENCE) {
            Ok(Some(audiences)) => Ok(audiences),
            _ => Err(IdentityError::NoTokenAudience),
        }
    }

    /// Unqualified realm roles from `realm_access.roles`.
    pub fn realm_roles(&self) -> Vec<String> {
        self.0
            .get(CLAIM_REALM_ACCESS)
            .and_then(roles_of)
            .map(|roles| roles.iter().map(role_text).collect())
            .unwrap_or_default()
    }

    /// Client roles from `resource_access.<client>.roles`, as `client:role`.
    pub fn client_roles(&self) -> Vec<String> {
        let Some(Value::Object(accesses)) = self.0.get(CLAIM_RESOURCE_ACCESS) else {
            return Vec::new();
        };

        accesses
            .iter()
            .filter_map(|(client, access)| roles_of(access).map(|roles| (client, roles)))
            .flat_map(|(client, roles)| {
                roles
                    .iter()
                    .map(move |role| format!("{}:{}", client, role_text(role)))
            })
            .collect()
    }
}

impl From<Map<String, Value>> for Claims {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

fn roles_of(access: &Value) -> Option<&Vec<Value>> {
    access.as_object()?.get(CLAIM_RESOURCE_ROLES)?.as_array()
}

fn role_text(role: &Value) -> String {
    match role {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
