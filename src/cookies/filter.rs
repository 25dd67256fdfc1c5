//! Cookie redaction for requests leaving the proxy.

use axum::http::{header::COOKIE, HeaderMap, HeaderValue};

use crate::cookies::jar::RequestCookies;

/// Marker substituted for the value of a censored cookie.
pub const REDACTED: &str = "redacted";

/// Replace the value of every cookie whose name starts with one of `prefixes`.
pub fn redact(cookies: &RequestCookies, prefixes: &[String]) -> RequestCookies {
    cookies
        .iter()
        .map(|(name, value)| {
            let censored = prefixes.iter().any(|prefix| name.starts_with(prefix.as_str()));
            let value = if censored { REDACTED } else { value };
            (name.to_string(), value.to_string())
        })
        .collect()
}

/// Rewrite the `Cookie` headers of an outgoing request with censored values.
pub fn filter_cookies(headers: &mut HeaderMap, prefixes: &[String]) {
    let cookies = RequestCookies::from_headers(headers);
    if cookies.is_empty() {
        return;
    }

    let filtered = redact(&cookies, prefixes);
    headers.remove(COOKIE);
    match HeaderValue::from_str(&filtered.to_header_string()) {
        Ok(value) => {
            headers.insert(COOKIE, value);
        }
        Err(e) => {
            tracing::warn!(error = %e, "Dropping unrepresentable cookie header");
        }
    }
}
