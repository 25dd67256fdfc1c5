//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, timeout)
//!     → reverse mode:    oauth.rs (callback, logout) | reverse.rs (session → upstream)
//!     → forwarding mode: forward.rs (sign → target)
//!     → response.rs (JSON errors for everything answered locally)
//! ```

pub mod forward;
pub mod oauth;
pub mod request;
pub mod response;
pub mod reverse;
pub mod server;

pub use forward::ForwardState;
pub use request::{RequestIdExt, X_REQUEST_ID};
pub use response::ApiError;
pub use reverse::{InvalidUpstream, ReverseState, Upstream};
pub use server::{upstream_client, HttpServer, Mode, UpstreamClient};
