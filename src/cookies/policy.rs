//! Cookie attribute policy.
//!
//! # Responsibilities
//! - Decide the Domain attribute (fixed, or derived from the request host)
//! - Decide whether an Expires attribute is emitted for a given lifetime
//! - Render `Set-Cookie` header values
//!
//! # Design Decisions
//! - Built once from configuration; request handling only reads it
//! - The sign of the lifetime carries the meaning:
//!   negative expires immediately, zero omits Expires, positive persists
//!
//! | domain fixed | session cookies | domain used       | Expires emitted when |
//! |--------------|-----------------|-------------------|----------------------|
//! | no           | yes             | host without port | lifetime < 0         |
//! | no           | no              | host without port | lifetime != 0        |
//! | yes          | yes             | configured value  | lifetime < 0         |
//! | yes          | no              | configured value  | lifetime != 0        |

use std::fmt;

use axum::http::HeaderValue;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::config::CookieConfig;

/// `Expires` attribute format (RFC 7231 IMF-fixdate).
const EXPIRES_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// SameSite cookie attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifetime used when invalidating a cookie.
pub fn clear_lifetime() -> TimeDelta {
    TimeDelta::hours(-10)
}

/// Strip the port from a `Host` header value.
pub fn strip_port(host: &str) -> &str {
    host.split_once(':').map_or(host, |(name, _)| name)
}

/// A cookie ready to be written as a `Set-Cookie` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: &'static str,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: Option<SameSite>,
    pub expires: Option<DateTime<Utc>>,
}

impl SetCookie {
    /// True if the browser will discard this cookie on receipt.
    pub fn is_removal(&self) -> bool {
        self.expires.is_some_and(|at| at <= Utc::now())
    }

    pub fn to_header_value(&self) -> Option<HeaderValue> {
        HeaderValue::from_str(&self.to_string()).ok()
    }
}

impl fmt::Display for SetCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}; Path={}", self.name, self.value, self.path)?;
        if !self.domain.is_empty() {
            write!(f, "; Domain={}", self.domain)?;
        }
        if let Some(expires) = self.expires {
            write!(f, "; Expires={}", expires.format(EXPIRES_FORMAT))?;
        }
        if self.http_only {
            f.write_str("; HttpOnly")?;
        }
        if self.secure {
            f.write_str("; Secure")?;
        }
        if let Some(same_site) = self.same_site {
            write!(f, "; SameSite={}", same_site)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum DomainRule {
    FromHost,
    Fixed(String),
}

/// Immutable cookie attribute policy derived from [`CookieConfig`].
#[derive(Debug, Clone)]
pub struct CookieAttributePolicy {
    domain: DomainRule,
    session_cookies: bool,
    http_only: bool,
    secure: bool,
    same_site: Option<SameSite>,
}

impl CookieAttributePolicy {
    pub fn from_config(config: &CookieConfig) -> Self {
        let domain = if config.domain.is_empty() {
            DomainRule::FromHost
        } else {
            DomainRule::Fixed(config.domain.clone())
        };

        Self {
            domain,
            session_cookies: config.session_cookies,
            http_only: config.http_only,
            secure: config.secure,
            same_site: config.same_site,
        }
    }

    /// Build the cookie for `name=value` as seen from `host`.
    pub fn attributes_for(&self, host: &str, name: &str, value: &str, lifetime: TimeDelta) -> SetCookie {
        self.attributes_at(host, name, value, lifetime, Utc::now())
    }

    /// Same as [`attributes_for`](Self::attributes_for) with an explicit clock.
    pub fn attributes_at(
        &self,
        host: &str,
        name: &str,
        value: &str,
        lifetime: TimeDelta,
        now: DateTime<Utc>,
    ) -> SetCookie {
        let domain = match &self.domain {
            DomainRule::FromHost => strip_port(host).to_string(),
            DomainRule::Fixed(domain) => domain.clone(),
        };

        SetCookie {
            name: name.to_string(),
            value: value.to_string(),
            domain,
            path: "/",
            http_only: self.http_only,
            secure: self.secure,
            same_site: self.same_site,
            expires: self.emits_expiry(lifetime).then(|| now + lifetime),
        }
    }

    fn emits_expiry(&self, lifetime: TimeDelta) -> bool {
        if self.session_cookies {
            lifetime < TimeDelta::zero()
        } else {
            !lifetime.is_zero()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(domain: &str, session_cookies: bool) -> CookieConfig {
        CookieConfig {
            domain: domain.to_string(),
            session_cookies,
            ..CookieConfig::default()
        }
    }

    fn lifetimes() -> [(TimeDelta, &'static str); 3] {
        [
            (TimeDelta::hours(-10), "negative"),
            (TimeDelta::zero(), "zero"),
            (TimeDelta::hours(1), "positive"),
        ]
    }

    #[test]
    fn test_attribute_matrix() {
        let now = Utc::now();
        let cases = [
            // (domain, session, expected domain, expiry for [neg, zero, pos])
            ("", true, "example.com", [true, false, false]),
            ("", false, "example.com", [true, false, true]),
            ("corp.io", true, "corp.io", [true, false, false]),
            ("corp.io", false, "corp.io", [true, false, true]),
        ];

        for (domain, session, expected_domain, expiry) in cases {
            let policy = CookieAttributePolicy::from_config(&config(domain, session));
            for ((lifetime, label), expect_expiry) in lifetimes().into_iter().zip(expiry) {
                let cookie = policy.attributes_at("example.com:8443", "kc-access", "v", lifetime, now);
                assert_eq!(cookie.domain, expected_domain, "domain={domain:?} session={session} {label}");
                assert_eq!(
                    cookie.expires.is_some(),
                    expect_expiry,
                    "domain={domain:?} session={session} {label}"
                );
                if let Some(at) = cookie.expires {
                    assert_eq!(at, now + lifetime);
                }
            }
        }
    }

    #[test]
    fn test_negative_lifetime_is_removal() {
        let policy = CookieAttributePolicy::from_config(&config("", true));
        let cookie = policy.attributes_for("example.com", "kc-access", "", clear_lifetime());
        assert!(cookie.is_removal());

        let cookie = policy.attributes_for("example.com", "kc-access", "v", TimeDelta::zero());
        assert!(!cookie.is_removal());
    }

    #[test]
    fn test_set_cookie_rendering() {
        let policy = CookieAttributePolicy::from_config(&CookieConfig {
            same_site: Some(SameSite::Strict),
            ..config("", false)
        });
        let now = DateTime::parse_from_rfc3339("2006-01-02T15:04:05Z")
            .unwrap()
            .with_timezone(&Utc);

        let cookie = policy.attributes_at("example.com:80", "kc-access", "abc", TimeDelta::hours(1), now);
        assert_eq!(
            cookie.to_string(),
            "kc-access=abc; Path=/; Domain=example.com; Expires=Mon, 02 Jan 2006 16:04:05 GMT; HttpOnly; Secure; SameSite=Strict"
        );

        let cookie = policy.attributes_at("example.com", "state", "xyz", TimeDelta::zero(), now);
        assert_eq!(
            cookie.to_string(),
            "state=xyz; Path=/; Domain=example.com; HttpOnly; Secure; SameSite=Strict"
        );
    }

    #[test]
    fn test_strip_port() {
        assert_eq!(strip_port("example.com:8443"), "example.com");
        assert_eq!(strip_port("example.com"), "example.com");
    }
}
