//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks for the selected mode)
//!     → GatekeeperConfig (validated, immutable)
//!     → derived value objects built once at startup
//!       (cookie policy, chunk budget, token verifier, provider client)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::{
    AuthConfig, CookieConfig, ForwardingConfig, GatekeeperConfig, ListenerConfig, LogFormat,
    ObservabilityConfig, OidcConfig, TimeoutConfig, UpstreamConfig,
};
