//! Chunked cookie codec.
//!
//! # Responsibilities
//! - Split values larger than one cookie's budget across `name`, `name-1`, `name-2`, ...
//! - Reassemble a divided value from the request cookies
//! - Invalidate a divided cookie set, chunk by chunk
//! - Provide the access/refresh/state cookie helpers used by the session handlers
//!
//! # Design Decisions
//! - Stateless: every call is a pure function of configuration and request data
//! - Only continuation cookies present on the *request* are cleared
//! - An indivisible segment larger than the budget is emitted oversized; that is a
//!   configuration limit, not an error

use axum::http::{header::SET_COOKIE, HeaderMap};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::TimeDelta;
use uuid::Uuid;

use crate::config::CookieConfig;
use crate::cookies::budget::ChunkBudget;
use crate::cookies::jar::RequestCookies;
use crate::cookies::policy::{clear_lifetime, CookieAttributePolicy, SetCookie};
use crate::observability::metrics;

/// Holds the base64 request URI to return to after login.
pub const REQUEST_URI_COOKIE: &str = "request_uri";

/// Holds the anti-forgery state parameter of a pending login.
pub const REQUEST_STATE_COOKIE: &str = "OAuth_Token_Request_State";

/// Name of the `index`-th continuation cookie of `base`.
pub fn chunk_name(base: &str, index: usize) -> String {
    format!("{}-{}", base, index)
}

/// Append every cookie as its own `Set-Cookie` header.
pub fn append_set_cookies(headers: &mut HeaderMap, cookies: &[SetCookie]) {
    for cookie in cookies {
        match cookie.to_header_value() {
            Some(value) => {
                headers.append(SET_COOKIE, value);
            }
            None => tracing::warn!(cookie = %cookie.name, "Skipping cookie with invalid header value"),
        }
    }
}

/// Split `value` into strides of at most `budget` bytes on char boundaries.
fn split_chunks(value: &str, budget: usize) -> Vec<&str> {
    let budget = budget.max(1);
    let mut chunks = Vec::with_capacity(value.len() / budget + 1);
    let mut rest = value;
    while !rest.is_empty() {
        let mut end = budget.min(rest.len());
        while !rest.is_char_boundary(end) {
            end -= 1;
        }
        if end == 0 {
            // A single character wider than the budget goes out oversized.
            end = rest.chars().next().map_or(rest.len(), char::len_utf8);
        }
        let (chunk, tail) = rest.split_at(end);
        chunks.push(chunk);
        rest = tail;
    }
    chunks
}

/// Encoder/decoder for values spread over several cookies.
#[derive(Debug, Clone)]
pub struct CookieCodec {
    policy: CookieAttributePolicy,
    budget: ChunkBudget,
    access_name: String,
    refresh_name: String,
}

impl CookieCodec {
    pub fn from_config(config: &CookieConfig) -> Self {
        Self {
            policy: CookieAttributePolicy::from_config(config),
            budget: ChunkBudget::from_config(config),
            access_name: config.access_name.clone(),
            refresh_name: config.refresh_name.clone(),
        }
    }

    pub fn budget(&self) -> ChunkBudget {
        self.budget
    }

    pub fn access_name(&self) -> &str {
        &self.access_name
    }

    pub fn refresh_name(&self) -> &str {
        &self.refresh_name
    }

    /// Emit `value` under `name`, dividing it when it exceeds the budget.
    pub fn write_value(&self, host: &str, name: &str, value: &str, lifetime: TimeDelta) -> Vec<SetCookie> {
        let budget = self.budget.for_cookie(host, name);
        if value.len() <= budget {
            return vec![self.policy.attributes_for(host, name, value, lifetime)];
        }

        let cookies: Vec<SetCookie> = split_chunks(value, budget)
            .into_iter()
            .enumerate()
            .map(|(index, chunk)| {
                let chunk_cookie = if index == 0 {
                    name.to_string()
                } else {
                    chunk_name(name, index)
                };
                self.policy.attributes_for(host, &chunk_cookie, chunk, lifetime)
            })
            .collect();

        tracing::debug!(
            cookie = %name,
            length = value.len(),
            budget,
            chunks = cookies.len(),
            "Dividing oversized cookie"
        );
        metrics::record_cookie_chunks(cookies.len());
        cookies
    }

    /// Reassemble a divided value: the base cookie followed by `name-1`, `name-2`, ...
    pub fn read_value(&self, cookies: &RequestCookies, name: &str) -> Option<String> {
        let mut value = cookies.get(name)?.to_string();
        for index in 1.. {
            match cookies.get(&chunk_name(name, index)) {
                Some(chunk) => value.push_str(chunk),
                None => break,
            }
        }
        Some(value)
    }

    /// Invalidate `name` and every contiguous continuation present on the request.
    pub fn clear_value(&self, cookies: &RequestCookies, host: &str, name: &str) -> Vec<SetCookie> {
        let mut cleared = vec![self.policy.attributes_for(host, name, "", clear_lifetime())];

        // Bounded by the request's cookie count, so a malformed set cannot spin.
        for index in 1..cookies.len() {
            let chunk = chunk_name(name, index);
            if !cookies.contains(&chunk) {
                break;
            }
            cleared.push(self.policy.attributes_for(host, &chunk, "", clear_lifetime()));
        }
        cleared
    }

    pub fn read_access_token(&self, cookies: &RequestCookies) -> Option<String> {
        self.read_value(cookies, &self.access_name)
    }

    pub fn read_refresh_token(&self, cookies: &RequestCookies) -> Option<String> {
        self.read_value(cookies, &self.refresh_name)
    }

    pub fn write_access_token(&self, host: &str, value: &str, lifetime: TimeDelta) -> Vec<SetCookie> {
        self.write_value(host, &self.access_name, value, lifetime)
    }

    pub fn write_refresh_token(&self, host: &str, value: &str, lifetime: TimeDelta) -> Vec<SetCookie> {
        self.write_value(host, &self.refresh_name, value, lifetime)
    }

    /// Write the state parameter cookies for a login round trip.
    ///
    /// Returns the anti-forgery state and the cookies to set. Both cookies are
    /// browser-session scoped.
    pub fn write_state_parameter(&self, host: &str, request_uri: &str) -> (String, Vec<SetCookie>) {
        let state = Uuid::new_v4().to_string();
        let encoded_uri = STANDARD.encode(request_uri.as_bytes());
        let cookies = vec![
            self.policy
                .attributes_for(host, REQUEST_URI_COOKIE, &encoded_uri, TimeDelta::zero()),
            self.policy
                .attributes_for(host, REQUEST_STATE_COOKIE, &state, TimeDelta::zero()),
        ];
        (state, cookies)
    }

    /// Decode the request URI stored by [`write_state_parameter`](Self::write_state_parameter).
    pub fn read_request_uri(&self, cookies: &RequestCookies) -> Option<String> {
        let encoded = cookies.get(REQUEST_URI_COOKIE)?;
        let bytes = STANDARD.decode(encoded).ok()?;
        String::from_utf8(bytes).ok()
    }

    pub fn read_state(&self, cookies: &RequestCookies) -> Option<String> {
        cookies.get(REQUEST_STATE_COOKIE).map(str::to_string)
    }

    pub fn clear_access_token(&self, cookies: &RequestCookies, host: &str) -> Vec<SetCookie> {
        self.clear_value(cookies, host, &self.access_name)
    }

    pub fn clear_refresh_token(&self, cookies: &RequestCookies, host: &str) -> Vec<SetCookie> {
        self.clear_value(cookies, host, &self.refresh_name)
    }

    pub fn clear_state(&self, cookies: &RequestCookies, host: &str) -> Vec<SetCookie> {
        let mut cleared = self.clear_value(cookies, host, REQUEST_STATE_COOKIE);
        cleared.push(
            self.policy
                .attributes_for(host, REQUEST_URI_COOKIE, "", clear_lifetime()),
        );
        cleared
    }

    /// Invalidate the whole session: access, refresh and state cookies.
    pub fn clear_all(&self, cookies: &RequestCookies, host: &str) -> Vec<SetCookie> {
        let mut cleared = self.clear_access_token(cookies, host);
        cleared.extend(self.clear_refresh_token(cookies, host));
        cleared.extend(self.clear_state(cookies, host));
        cleared
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookies::policy::SameSite;

    fn codec() -> CookieCodec {
        CookieCodec::from_config(&CookieConfig {
            domain: String::new(),
            session_cookies: true,
            http_only: true,
            secure: true,
            same_site: Some(SameSite::Lax),
            access_name: "kc-access".to_string(),
            ..CookieConfig::default()
        })
    }

    fn payload(len: usize) -> String {
        (0..len).map(|i| char::from(b'a' + (i % 26) as u8)).collect()
    }

    #[test]
    fn test_small_value_single_cookie() {
        let cookies = codec().write_value("example.com:8443", "kc-access", "abc", TimeDelta::zero());
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies[0].name, "kc-access");
        assert_eq!(cookies[0].value, "abc");
    }

    #[test]
    fn test_value_at_budget_is_not_divided() {
        let value = payload(4011);
        let cookies = codec().write_value("example.com:8443", "kc-access", &value, TimeDelta::zero());
        assert_eq!(cookies.len(), 1);
    }

    #[test]
    fn test_chunk_layout() {
        let value = payload(8100);
        let cookies = codec().write_value("example.com:8443", "kc-access", &value, TimeDelta::hours(1));

        let names: Vec<_> = cookies.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["kc-access", "kc-access-1", "kc-access-2"]);
        assert_eq!(cookies[0].value, value[0..4011]);
        assert_eq!(cookies[1].value, value[4011..8022]);
        assert_eq!(cookies[2].value, value[8022..8100]);
        assert!(cookies.iter().all(|c| c.domain == "example.com"));
        assert!(cookies.iter().all(|c| c.expires == cookies[0].expires));
    }

    #[test]
    fn test_chunked_round_trip() {
        let codec = codec();
        for len in [0, 1, 4011, 4012, 12_033, 20_000] {
            let value = payload(len);
            let written = codec.write_value("example.com", "kc-access", &value, TimeDelta::zero());
            let request: RequestCookies = written
                .into_iter()
                .map(|c| (c.name, c.value))
                .collect();
            assert_eq!(codec.read_value(&request, "kc-access").as_deref(), Some(value.as_str()));
        }
    }

    #[test]
    fn test_read_stops_at_gap() {
        let request = RequestCookies::parse("kc-access=a; kc-access-1=b; kc-access-3=d");
        assert_eq!(codec().read_value(&request, "kc-access").as_deref(), Some("ab"));
        assert_eq!(codec().read_value(&request, "missing"), None);
    }

    #[test]
    fn test_clear_stops_at_first_gap() {
        let request = RequestCookies::parse("base=x; base-1=y; base-3=z");
        let cleared = codec().clear_value(&request, "example.com", "base");

        let names: Vec<_> = cleared.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["base", "base-1"]);
        assert!(cleared.iter().all(SetCookie::is_removal));
    }

    #[test]
    fn test_clear_is_capped_by_request_cookie_count() {
        let request = RequestCookies::parse("base-1=a; base-2=b");
        let cleared = codec().clear_value(&request, "example.com", "base");
        let names: Vec<_> = cleared.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["base", "base-1"]);

        let request = RequestCookies::parse("base-1=a");
        let cleared = codec().clear_value(&request, "example.com", "base");
        let names: Vec<_> = cleared.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["base"]);
    }

    #[test]
    fn test_clear_without_request_cookies_clears_base() {
        let cleared = codec().clear_value(&RequestCookies::default(), "example.com", "base");
        assert_eq!(cleared.len(), 1);
        assert_eq!(cleared[0].name, "base");
        assert!(cleared[0].is_removal());
    }

    #[test]
    fn test_multibyte_chunks_stay_on_boundaries() {
        let value = "é".repeat(3000);
        let cookies = codec().write_value("example.com", "kc-access", &value, TimeDelta::zero());
        assert!(cookies.len() > 1);
        assert!(cookies.iter().all(|c| c.value.len() <= 4011));
        let joined: String = cookies.iter().map(|c| c.value.as_str()).collect();
        assert_eq!(joined, value);
    }

    #[test]
    fn test_state_parameter_round_trip() {
        let codec = codec();
        let (state, cookies) = codec.write_state_parameter("example.com", "/admin?page=2");
        assert_eq!(cookies.len(), 2);
        assert!(cookies.iter().all(|c| c.expires.is_none()));

        let request: RequestCookies = cookies.into_iter().map(|c| (c.name, c.value)).collect();
        assert_eq!(codec.read_state(&request), Some(state));
        assert_eq!(codec.read_request_uri(&request).as_deref(), Some("/admin?page=2"));
    }

    #[test]
    fn test_clear_all_covers_every_session_cookie() {
        let codec = codec();
        let request = RequestCookies::parse("kc-access=a; kc-access-1=b; kc-state=r");
        let cleared = codec.clear_all(&request, "example.com");

        let names: Vec<_> = cleared.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["kc-access", "kc-access-1", "kc-state", REQUEST_STATE_COOKIE, REQUEST_URI_COOKIE]
        );
    }

    #[test]
    fn test_append_set_cookies() {
        let mut headers = HeaderMap::new();
        let cookies = codec().write_value("example.com", "kc-access", &payload(5000), TimeDelta::zero());
        append_set_cookies(&mut headers, &cookies);
        assert_eq!(headers.get_all(SET_COOKIE).iter().count(), 2);
    }
}
