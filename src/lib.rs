//! Gatekeeper: an authenticating reverse proxy and signing forward proxy
//! for OpenID Connect identity providers.

pub mod auth;
pub mod config;
pub mod cookies;
pub mod forwarding;
pub mod http;
pub mod identity;
pub mod lifecycle;
pub mod observability;
pub mod provider;
pub mod security;

pub use config::GatekeeperConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
