//! Identity extraction from token claims.
//!
//! # Responsibilities
//! - Read the claims a Keycloak-style token carries (subject, audience, roles, groups)
//! - Build an immutable [`UserIdentity`] for authorization and upstream headers
//!
//! # Design Decisions
//! - Audience and groups are strict: a bad shape fails extraction
//! - Role claims are lenient: a bad shape yields no roles
//! - Client roles are qualified as `client:role`

pub mod claims;
pub mod error;
pub mod user;

pub use claims::Claims;
pub use error::IdentityError;
pub use user::{TokenOrigin, UserIdentity};
