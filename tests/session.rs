//! Authenticating reverse proxy, end to end.

mod common;

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::TimeDelta;
use reqwest::header::{AUTHORIZATION, COOKIE, LOCATION};
use reqwest::redirect::Policy;
use serde_json::{json, Value};

use common::{mint_token, set_cookies, spawn_gatekeeper, start_echo_backend, StaticProvider, SECRET};
use gatekeeper::auth::JwtVerifier;
use gatekeeper::config::AuthConfig;
use gatekeeper::cookies::{CookieCodec, REQUEST_STATE_COOKIE, REQUEST_URI_COOKIE};
use gatekeeper::lifecycle::startup::build_reverse;
use gatekeeper::provider::IdentityProvider;
use gatekeeper::{GatekeeperConfig, Shutdown};

fn config(upstream: SocketAddr, login: bool) -> GatekeeperConfig {
    let mut config = GatekeeperConfig::default();
    config.upstream.url = format!("http://{upstream}");
    config.auth = AuthConfig {
        algorithm: "HS256".into(),
        secret: Some(SECRET.into()),
        leeway_secs: 0,
        ..AuthConfig::default()
    };
    config.oidc.client_id = "web".into();
    if login {
        config.oidc.authorization_url = "https://idp.example.com/realms/main/auth".into();
    }
    config
}

async fn start(config: &GatekeeperConfig, provider: Option<Arc<dyn IdentityProvider>>, shutdown: &Shutdown) -> SocketAddr {
    let verifier = Arc::new(JwtVerifier::from_config(&config.auth).unwrap());
    let server = build_reverse(config, verifier, provider).unwrap();
    spawn_gatekeeper(server, shutdown).await
}

fn client() -> reqwest::Client {
    reqwest::Client::builder().redirect(Policy::none()).build().unwrap()
}

/// `name=value` pairs a browser would send back for these `Set-Cookie` headers.
fn cookie_header(set_cookies: &[String]) -> String {
    set_cookies
        .iter()
        .filter_map(|c| c.split(';').next())
        .collect::<Vec<_>>()
        .join("; ")
}

fn cookie_value<'a>(set_cookies: &'a [String], name: &str) -> Option<&'a str> {
    set_cookies
        .iter()
        .filter_map(|c| c.split(';').next())
        .find_map(|pair| pair.strip_prefix(name)?.strip_prefix('='))
}

#[tokio::test]
async fn test_bearer_request_reaches_upstream_with_identity() {
    let backend = start_echo_backend().await;
    let shutdown = Shutdown::new();
    let gatekeeper = start(&config(backend, false), None, &shutdown).await;
    let token = mint_token("jane", "web", 300, json!({"groups": ["ops"]}));

    let response = client()
        .get(format!("http://{gatekeeper}/reports?year=2024"))
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .header("x-auth-subject", "mallory")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let echoed: Value = response.json().await.unwrap();
    assert_eq!(echoed["uri"], "/reports?year=2024");
    let headers = &echoed["headers"];
    assert_eq!(headers["x-auth-subject"], "jane");
    assert_eq!(headers["x-auth-username"], "jane");
    assert_eq!(headers["x-auth-email"], "jane@example.com");
    assert_eq!(headers["x-auth-roles"], "user");
    assert_eq!(headers["x-auth-groups"], "ops");
    assert_eq!(headers["x-auth-audience"], "web");
    assert_eq!(headers["x-auth-token"], token.as_str());
    assert_eq!(headers["x-forwarded-host"], gatekeeper.to_string().as_str());
    assert_eq!(headers["x-forwarded-proto"], "http");
    assert!(headers["x-request-id"].is_string());
    shutdown.trigger();
}

#[tokio::test]
async fn test_divided_cookie_session_is_redacted_upstream() {
    let backend = start_echo_backend().await;
    let shutdown = Shutdown::new();
    let config = config(backend, false);
    let gatekeeper = start(&config, None, &shutdown).await;

    let token = mint_token("jane", "web", 300, json!({"padding": "x".repeat(7000)}));
    let codec = CookieCodec::from_config(&config.cookies);
    let written: Vec<String> = codec
        .write_access_token("127.0.0.1", &token, TimeDelta::seconds(300))
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(written.len(), 3);

    let response = client()
        .get(format!("http://{gatekeeper}/"))
        .header(COOKIE, format!("{}; theme=dark", cookie_header(&written)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let echoed: Value = response.json().await.unwrap();
    assert_eq!(echoed["headers"]["x-auth-subject"], "jane");
    assert_eq!(
        echoed["headers"]["cookie"],
        "kc-access=redacted; kc-access-1=redacted; kc-access-2=redacted; theme=dark"
    );
    shutdown.trigger();
}

#[tokio::test]
async fn test_audience_mismatch_is_forbidden() {
    let backend = start_echo_backend().await;
    let shutdown = Shutdown::new();
    let mut config = config(backend, false);
    config.auth.audience = Some("billing".into());
    let gatekeeper = start(&config, None, &shutdown).await;

    let response = client()
        .get(format!("http://{gatekeeper}/"))
        .header(AUTHORIZATION, format!("Bearer {}", mint_token("jane", "web", 300, json!({}))))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);
    shutdown.trigger();
}

#[tokio::test]
async fn test_no_session_without_login_is_unauthorized() {
    let backend = start_echo_backend().await;
    let shutdown = Shutdown::new();
    let gatekeeper = start(&config(backend, false), None, &shutdown).await;

    let response = client().get(format!("http://{gatekeeper}/")).send().await.unwrap();
    assert_eq!(response.status(), 401);
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"error": "authentication required"}));
    shutdown.trigger();
}

#[tokio::test]
async fn test_login_round_trip() {
    let backend = start_echo_backend().await;
    let shutdown = Shutdown::new();
    let token = mint_token("jane", "web", 300, json!({}));
    let provider: Arc<dyn IdentityProvider> = Arc::new(StaticProvider::new(token.clone(), Some("rt-1")));
    let gatekeeper = start(&config(backend, true), Some(provider), &shutdown).await;
    let client = client();

    // No session: sent to the authorization endpoint with state cookies.
    let response = client
        .get(format!("http://{gatekeeper}/reports?year=2024"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 303);
    let location = response.headers()[LOCATION].to_str().unwrap().to_string();
    assert!(location.starts_with("https://idp.example.com/realms/main/auth?"));
    let state_cookies = set_cookies(&response);
    let state = cookie_value(&state_cookies, REQUEST_STATE_COOKIE).unwrap().to_string();
    assert!(location.contains(&format!("state={state}")));
    assert!(cookie_value(&state_cookies, REQUEST_URI_COOKIE).is_some());

    // A forged state is refused.
    let response = client
        .get(format!("http://{gatekeeper}/oauth/callback?code=abc&state=forged"))
        .header(COOKIE, cookie_header(&state_cookies))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);

    // The real callback issues the session and returns to the original page.
    let response = client
        .get(format!("http://{gatekeeper}/oauth/callback?code=abc&state={state}"))
        .header(COOKIE, cookie_header(&state_cookies))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 303);
    assert_eq!(response.headers()[LOCATION], "/reports?year=2024");
    let session_cookies = set_cookies(&response);
    assert_eq!(cookie_value(&session_cookies, "kc-access"), Some(token.as_str()));
    assert_eq!(cookie_value(&session_cookies, "kc-state"), Some("rt-1"));
    assert!(session_cookies
        .iter()
        .any(|c| c.starts_with(&format!("{REQUEST_STATE_COOKIE}=;"))));

    // The browser now gets through.
    let session: Vec<String> = session_cookies
        .iter()
        .filter(|c| c.starts_with("kc-"))
        .cloned()
        .collect();
    let response = client
        .get(format!("http://{gatekeeper}/reports?year=2024"))
        .header(COOKIE, cookie_header(&session))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let echoed: Value = response.json().await.unwrap();
    assert_eq!(echoed["headers"]["x-auth-subject"], "jane");
    shutdown.trigger();
}

#[tokio::test]
async fn test_logout_clears_divided_cookies() {
    let backend = start_echo_backend().await;
    let shutdown = Shutdown::new();
    let gatekeeper = start(&config(backend, false), None, &shutdown).await;

    let response = client()
        .post(format!("http://{gatekeeper}/oauth/logout"))
        .header(COOKIE, "kc-access=a; kc-access-1=b; kc-access-2=c; kc-state=r; theme=dark")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let cleared = set_cookies(&response);
    for name in ["kc-access", "kc-access-1", "kc-access-2", "kc-state", REQUEST_STATE_COOKIE, REQUEST_URI_COOKIE] {
        assert!(
            cleared.iter().any(|c| c.starts_with(&format!("{name}=;")) && c.contains("Expires=")),
            "{name} was not cleared: {cleared:?}"
        );
    }
    assert!(!cleared.iter().any(|c| c.starts_with("kc-access-3")));
    assert!(!cleared.iter().any(|c| c.starts_with("theme")));
    shutdown.trigger();
}
