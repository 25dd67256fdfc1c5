//! Cookies carried by an incoming request.

use axum::http::{header::COOKIE, HeaderMap};

/// Ordered view over the request's `Cookie` headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestCookies {
    pairs: Vec<(String, String)>,
}

impl RequestCookies {
    /// Collect cookies from every `Cookie` header, in order of appearance.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut cookies = Self::default();
        for value in headers.get_all(COOKIE) {
            if let Ok(value) = value.to_str() {
                cookies.extend_from_header(value);
            }
        }
        cookies
    }

    pub fn parse(header: &str) -> Self {
        let mut cookies = Self::default();
        cookies.extend_from_header(header);
        cookies
    }

    fn extend_from_header(&mut self, header: &str) {
        for part in header.split(';') {
            let part = part.trim();
            let Some((name, value)) = part.split_once('=') else {
                continue;
            };
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            self.pairs.push((name.to_string(), value.to_string()));
        }
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Serialise back into a single `Cookie` header value.
    pub fn to_header_string(&self) -> String {
        self.iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl FromIterator<(String, String)> for RequestCookies {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            pairs: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_parse_preserves_order() {
        let cookies = RequestCookies::parse("b=2; a=1;c=\"3\"; junk; =x");
        let pairs: Vec<_> = cookies.iter().collect();
        assert_eq!(pairs, vec![("b", "2"), ("a", "1"), ("c", "3")]);
        assert_eq!(cookies.get("a"), Some("1"));
        assert!(!cookies.contains("junk"));
    }

    #[test]
    fn test_from_multiple_headers() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("kc-access=abc"));
        headers.append(COOKIE, HeaderValue::from_static("kc-access-1=def; session=xyz"));

        let cookies = RequestCookies::from_headers(&headers);
        assert_eq!(cookies.len(), 3);
        assert_eq!(cookies.to_header_string(), "kc-access=abc; kc-access-1=def; session=xyz");
    }

    #[test]
    fn test_value_may_contain_equals() {
        let cookies = RequestCookies::parse("request_uri=Lz9hPWI=");
        assert_eq!(cookies.get("request_uri"), Some("Lz9hPWI="));
    }
}
