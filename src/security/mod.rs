//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Authenticated request:
//!     → headers.rs (strip client X-Auth-*, inject identity headers)
//!     → headers.rs (strip hop-by-hop, add X-Forwarded-*)
//!     → Pass to upstream
//! ```
//!
//! # Design Decisions
//! - No trust in client input

pub mod headers;
