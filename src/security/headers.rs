//! Header manipulation for proxied requests.
//!
//! # Responsibilities
//! - Strip client-supplied identity headers and inject verified ones
//! - Add X-Forwarded-For, X-Forwarded-Proto, X-Forwarded-Host
//! - Strip hop-by-hop headers
//!
//! # Design Decisions
//! - Anything starting with `X-Auth-` is owned by the gatekeeper; a client
//!   can never smuggle its own identity headers upstream
//! - X-Forwarded-For is appended to, never replaced

use std::net::SocketAddr;

use axum::http::{
    header::{CONNECTION, HOST},
    HeaderMap, HeaderName, HeaderValue,
};

use crate::identity::UserIdentity;

pub const X_FORWARDED_AGENT: HeaderName = HeaderName::from_static("x-forwarded-agent");
pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
pub const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

pub const X_AUTH_SUBJECT: HeaderName = HeaderName::from_static("x-auth-subject");
pub const X_AUTH_USERNAME: HeaderName = HeaderName::from_static("x-auth-username");
pub const X_AUTH_EMAIL: HeaderName = HeaderName::from_static("x-auth-email");
pub const X_AUTH_ROLES: HeaderName = HeaderName::from_static("x-auth-roles");
pub const X_AUTH_GROUPS: HeaderName = HeaderName::from_static("x-auth-groups");
pub const X_AUTH_AUDIENCE: HeaderName = HeaderName::from_static("x-auth-audience");
pub const X_AUTH_EXPIRES_IN: HeaderName = HeaderName::from_static("x-auth-expiresin");
pub const X_AUTH_TOKEN: HeaderName = HeaderName::from_static("x-auth-token");

const X_AUTH_PREFIX: &str = "x-auth-";

/// RFC 7230 section 6.1 connection-scoped headers.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Remove hop-by-hop headers, including any listed in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Remove every `X-Auth-*` header.
pub fn strip_identity_headers(headers: &mut HeaderMap) {
    let names: Vec<HeaderName> = headers
        .keys()
        .filter(|name| name.as_str().starts_with(X_AUTH_PREFIX))
        .cloned()
        .collect();

    for name in names {
        headers.remove(name);
    }
}

/// Replace any client-supplied identity headers with those of `identity`.
pub fn inject_identity_headers(headers: &mut HeaderMap, identity: &UserIdentity) {
    strip_identity_headers(headers);

    let values = [
        (X_AUTH_SUBJECT, identity.id().to_string()),
        (X_AUTH_USERNAME, identity.preferred_name().to_string()),
        (X_AUTH_EMAIL, identity.email().to_string()),
        (X_AUTH_ROLES, identity.roles_joined()),
        (X_AUTH_GROUPS, identity.groups().join(",")),
        (X_AUTH_AUDIENCE, identity.audiences().join(",")),
        (X_AUTH_EXPIRES_IN, identity.expires_in().as_secs().to_string()),
        (X_AUTH_TOKEN, identity.token().to_string()),
    ];

    for (name, value) in values {
        match HeaderValue::from_str(&value) {
            Ok(value) => {
                headers.insert(name, value);
            }
            Err(_) => tracing::warn!(header = %name, subject = %identity.id(), "Dropping identity header with invalid value"),
        }
    }
}

/// Record the original client, host and scheme for the upstream.
pub fn append_forwarded_headers(headers: &mut HeaderMap, client: Option<SocketAddr>, scheme: &str) {
    if let Some(client) = client {
        let ip = client.ip().to_string();
        let forwarded_for = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
            Some(existing) if !existing.is_empty() => format!("{existing}, {ip}"),
            _ => ip,
        };
        if let Ok(value) = HeaderValue::from_str(&forwarded_for) {
            headers.insert(X_FORWARDED_FOR, value);
        }
    }

    if let Some(host) = headers.get(HOST).cloned() {
        headers.insert(X_FORWARDED_HOST, host);
    }
    if let Ok(value) = HeaderValue::from_str(scheme) {
        headers.insert(X_FORWARDED_PROTO, value);
    }
}
