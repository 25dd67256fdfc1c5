//! Forward signing proxy.
//!
//! # Data Flow
//! ```text
//! renewal.rs (single writer)
//!     → password / refresh grants against the identity provider
//!     → state.rs (SharedCredential behind an RwLock)
//!
//! outbound request
//!     → signer.rs (domain filter, copy token under read lock)
//!     → Authorization: Bearer <token>, X-Forwarded-Agent
//!     → upstream target
//! ```

pub mod renewal;
pub mod signer;
pub mod state;

pub use renewal::{renewal_delay, CredentialRenewer, Pause, LOGIN_RETRY_DELAY};
pub use signer::RequestSigner;
pub use state::{CredentialState, SharedCredential};
