//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{TimeDelta, Utc};
use hyper::{body::Incoming, service::service_fn, Request, Response};
use hyper_util::rt::TokioIo;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Map, Value};
use tokio::net::TcpListener;

use gatekeeper::provider::{IdentityProvider, ProviderError, TokenResponse};
use gatekeeper::{HttpServer, Shutdown};

pub const SECRET: &str = "integration-secret";

/// Start a backend that answers every request with a JSON description of it:
/// `{"method": .., "uri": .., "headers": {name: value}}`.
pub async fn start_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let service = service_fn(|request: Request<Incoming>| async move {
                    let headers: Map<String, Value> = request
                        .headers()
                        .iter()
                        .map(|(name, value)| {
                            (name.to_string(), Value::String(value.to_str().unwrap_or_default().to_string()))
                        })
                        .collect();
                    let body = json!({
                        "method": request.method().as_str(),
                        "uri": request.uri().to_string(),
                        "headers": headers,
                    })
                    .to_string();

                    Ok::<_, Infallible>(
                        Response::builder()
                            .header("content-type", "application/json")
                            .body(body)
                            .unwrap(),
                    )
                });
                let _ = hyper::server::conn::http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });

    addr
}

/// Serve `server` on an ephemeral port until `shutdown` fires.
pub async fn spawn_gatekeeper(server: HttpServer, shutdown: &Shutdown) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(server.run(listener, shutdown.subscribe()));
    addr
}

/// HS256 token verifiable with [`SECRET`].
pub fn mint_token(subject: &str, audience: &str, lifetime_secs: i64, extra: Value) -> String {
    let mut claims = json!({
        "sub": subject,
        "aud": audience,
        "email": format!("{subject}@example.com"),
        "preferred_username": subject,
        "exp": (Utc::now() + TimeDelta::seconds(lifetime_secs)).timestamp(),
        "realm_access": {"roles": ["user"]},
    });
    if let (Some(claims), Value::Object(extra)) = (claims.as_object_mut(), extra) {
        claims.extend(extra);
    }
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}

/// Unsigned token as handed out to a service account.
pub fn unsigned_token(subject: &str, lifetime_secs: i64) -> String {
    let payload = json!({
        "sub": subject,
        "aud": "services",
        "exp": (Utc::now() + TimeDelta::seconds(lifetime_secs)).timestamp(),
    });
    format!(
        "{}.{}.",
        URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#),
        URL_SAFE_NO_PAD.encode(payload.to_string())
    )
}

/// Identity provider answering every grant with the same tokens.
pub struct StaticProvider {
    access_token: String,
    refresh_token: Option<String>,
    pub calls: AtomicUsize,
}

impl StaticProvider {
    pub fn new(access_token: String, refresh_token: Option<&str>) -> Self {
        Self {
            access_token,
            refresh_token: refresh_token.map(str::to_string),
            calls: AtomicUsize::new(0),
        }
    }

    fn respond(&self) -> Result<TokenResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(TokenResponse {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            expires_in: Some(3600),
            id_token: None,
        })
    }
}

#[async_trait]
impl IdentityProvider for StaticProvider {
    async fn password_grant(&self, _: &str, _: &str) -> Result<TokenResponse, ProviderError> {
        self.respond()
    }

    async fn refresh_grant(&self, _: &str) -> Result<TokenResponse, ProviderError> {
        self.respond()
    }

    async fn exchange_code(&self, _: &str, _: &str) -> Result<TokenResponse, ProviderError> {
        self.respond()
    }
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..40 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

/// `Set-Cookie` header values of a response.
pub fn set_cookies(response: &reqwest::Response) -> Vec<String> {
    response
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect()
}
