//! Session cookie transport.
//!
//! # Data Flow
//! ```text
//! CookieConfig (startup)
//!     → policy.rs (domain / expiry rule, immutable)
//!     → budget.rs (bytes available per cookie, immutable)
//!     → codec.rs (write / read / clear divided cookie sets)
//!
//! Per request:
//!     Cookie header → jar.rs (ordered pairs)
//!         → codec.rs read_value (reassemble token)
//!         → filter.rs (redact before forwarding upstream)
//!     codec.rs write_value / clear_value → Set-Cookie headers
//! ```
//!
//! # Design Decisions
//! - Continuation cookies are named `<base>-<n>`, contiguous from 1
//! - Nothing here holds mutable state; calls are safe from any task

pub mod budget;
pub mod codec;
pub mod filter;
pub mod jar;
pub mod policy;

pub use budget::ChunkBudget;
pub use codec::{append_set_cookies, CookieCodec, REQUEST_STATE_COOKIE, REQUEST_URI_COOKIE};
pub use filter::{filter_cookies, REDACTED};
pub use jar::RequestCookies;
pub use policy::{CookieAttributePolicy, SameSite, SetCookie};
