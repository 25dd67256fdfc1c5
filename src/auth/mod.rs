//! Reverse-mode authentication.
//!
//! # Data Flow
//! ```text
//! request headers
//!     → session.rs (bearer header or divided access cookie)
//!     → verifier.rs (signature, expiry, issuer)
//!     → identity extraction + audience policy
//!     → authenticated | refresh | login redirect (login.rs) | denied
//! ```

pub mod login;
pub mod session;
pub mod verifier;

pub use login::{callback_uri, AuthorizationRedirect, CALLBACK_PATH, LOGOUT_PATH};
pub use session::{CompletedLogin, RequestContext, SessionError, SessionGuard, SessionOutcome};
pub use verifier::{JwtVerifier, KeyError, TokenVerifier, VerifyError};
