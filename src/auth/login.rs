//! Authorization code flow redirects.

use url::Url;

use crate::config::OidcConfig;

/// Path of the callback handled by the gatekeeper itself.
pub const CALLBACK_PATH: &str = "/oauth/callback";
pub const LOGOUT_PATH: &str = "/oauth/logout";

/// Absolute callback URL: the configured one, else derived from the request.
pub fn callback_uri(config: &OidcConfig, scheme: &str, host: &str) -> String {
    if config.redirect_url.is_empty() {
        format!("{scheme}://{host}{CALLBACK_PATH}")
    } else {
        config.redirect_url.clone()
    }
}

/// Authorization endpoint a browser is sent to when it has no session.
#[derive(Debug, Clone)]
pub struct AuthorizationRedirect {
    endpoint: Url,
    client_id: String,
    scopes: String,
}

impl AuthorizationRedirect {
    /// `None` when login redirects are disabled (no authorization URL).
    pub fn from_config(config: &OidcConfig) -> Result<Option<Self>, url::ParseError> {
        if config.authorization_url.is_empty() {
            return Ok(None);
        }
        Ok(Some(Self {
            endpoint: Url::parse(&config.authorization_url)?,
            client_id: config.client_id.clone(),
            scopes: config.scopes.join(" "),
        }))
    }

    pub fn location(&self, redirect_uri: &str, state: &str) -> String {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("scope", &self.scopes)
            .append_pair("state", state);
        url.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location() {
        let config = OidcConfig {
            client_id: "web".into(),
            authorization_url: "https://idp.example.com/auth?kc_idp_hint=corp".into(),
            scopes: vec!["openid".into(), "email".into()],
            ..OidcConfig::default()
        };
        let redirect = AuthorizationRedirect::from_config(&config).unwrap().unwrap();
        let location = Url::parse(&redirect.location("https://app.example.com/oauth/callback", "s-1")).unwrap();

        let pairs: Vec<(String, String)> = location.query_pairs().into_owned().collect();
        assert_eq!(location.host_str(), Some("idp.example.com"));
        assert!(pairs.contains(&("kc_idp_hint".into(), "corp".into())));
        assert!(pairs.contains(&("response_type".into(), "code".into())));
        assert!(pairs.contains(&("client_id".into(), "web".into())));
        assert!(pairs.contains(&("redirect_uri".into(), "https://app.example.com/oauth/callback".into())));
        assert!(pairs.contains(&("scope".into(), "openid email".into())));
        assert!(pairs.contains(&("state".into(), "s-1".into())));
    }

    #[test]
    fn test_disabled_without_authorization_url() {
        assert!(AuthorizationRedirect::from_config(&OidcConfig::default()).unwrap().is_none());
    }

    #[test]
    fn test_callback_uri() {
        let mut config = OidcConfig::default();
        assert_eq!(
            callback_uri(&config, "http", "app.local:3000"),
            "http://app.local:3000/oauth/callback"
        );

        config.redirect_url = "https://app.example.com/oauth/callback".into();
        assert_eq!(callback_uri(&config, "http", "ignored"), config.redirect_url);
    }
}
