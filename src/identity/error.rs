use thiserror::Error;

/// Failure to build a [`UserIdentity`](super::UserIdentity) from a token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("the token does not contain an audience claim")]
    NoTokenAudience,

    #[error("malformed token: {0}")]
    MalformedToken(String),

    #[error("unable to parse claim '{0}'")]
    InvalidClaim(String),

    #[error("missing required claim '{0}'")]
    MissingClaim(&'static str),
}
