//! Per-cookie payload budget.
//!
//! A browser accepts roughly 4096 bytes per `Set-Cookie` header, attributes
//! included. The budget is what remains for the value once the name, the
//! attributes the policy always emits, and a safety margin are accounted for.
//! Everything known at startup is folded into a single number so the
//! per-request check is plain arithmetic.

use crate::config::CookieConfig;
use crate::cookies::policy::strip_port;

/// Conservative margin for strict clients (Safari) plus the header prefix.
const COOKIE_MARGIN: usize = 12 + "set-cookie: ".len() + 3;

const BASE_CHUNK_LENGTH: usize = 4096 - COOKIE_MARGIN;

/// Reserved for persistent cookies whatever their eventual lifetime.
const EXPIRES_RESERVATION: &str = "Expires=Mon, 02 Jan 2006 03:04:05 MST; ";

/// Maximum value length for one cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkBudget {
    /// Domain is configured; only the cookie name varies.
    Fixed(usize),
    /// Domain comes from the request host; its length is charged per request.
    HostDerived(usize),
}

impl ChunkBudget {
    pub fn from_config(config: &CookieConfig) -> Self {
        let mut budget = BASE_CHUNK_LENGTH - "; Path=/".len();
        if config.http_only {
            budget -= "HttpOnly; ".len();
        }
        if !config.session_cookies {
            budget -= EXPIRES_RESERVATION.len();
        }
        if let Some(same_site) = config.same_site {
            budget -= "SameSite=; ".len() + same_site.as_str().len();
        }
        if config.secure {
            budget -= "Secure".len();
        }

        if config.domain.is_empty() {
            ChunkBudget::HostDerived(budget)
        } else {
            let domain_cost = "Domain=; ".len() + config.domain.len();
            ChunkBudget::Fixed(budget.saturating_sub(domain_cost))
        }
    }

    /// Value bytes available to cookie `name` on a response to `host`.
    pub fn for_cookie(&self, host: &str, name: &str) -> usize {
        match *self {
            ChunkBudget::Fixed(budget) => budget.saturating_sub(name.len()),
            ChunkBudget::HostDerived(budget) => budget
                .saturating_sub(name.len())
                .saturating_sub(strip_port(host).len()),
        }
    }
}
