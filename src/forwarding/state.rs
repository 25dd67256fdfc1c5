//! Credential shared between the renewal task and the request signers.
//!
//! # Design Decisions
//! - Exactly one writer (the renewal task), any number of readers
//! - The lock is held for field assignments and copies only, never across
//!   a network call or a sleep
//! - Readers get owned copies; nothing outside this module holds a reference
//!   into the state

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use crate::identity::UserIdentity;

/// Snapshot of the forwarding credential.
#[derive(Debug, Clone)]
pub struct CredentialState {
    /// Current access token; empty until the first login succeeds.
    pub token: String,
    pub refresh_token: Option<String>,
    pub identity: Option<Arc<UserIdentity>>,
    pub expires_at: Option<DateTime<Utc>>,
    /// The next iteration must perform a full login.
    pub needs_login: bool,
    /// The next iteration waits for the token to approach expiry.
    pub awaiting_expiry: bool,
}

impl Default for CredentialState {
    fn default() -> Self {
        Self {
            token: String::new(),
            refresh_token: None,
            identity: None,
            expires_at: None,
            needs_login: true,
            awaiting_expiry: false,
        }
    }
}

impl CredentialState {
    pub fn subject(&self) -> &str {
        self.identity.as_deref().map_or("", UserIdentity::id)
    }

    pub fn email(&self) -> &str {
        self.identity.as_deref().map_or("", UserIdentity::email)
    }
}

/// Handle on the shared credential. Cloning shares the same state.
#[derive(Debug, Clone, Default)]
pub struct SharedCredential {
    inner: Arc<RwLock<CredentialState>>,
}

impl SharedCredential {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, CredentialState> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CredentialState> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current access token, if one has been obtained.
    pub fn token(&self) -> Option<String> {
        let state = self.read();
        (!state.token.is_empty()).then(|| state.token.clone())
    }

    pub fn snapshot(&self) -> CredentialState {
        self.read().clone()
    }

    /// Apply an in-memory update atomically with respect to readers.
    pub(crate) fn update<F>(&self, apply: F)
    where
        F: FnOnce(&mut CredentialState),
    {
        let mut state = self.write();
        apply(&mut state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_needing_login() {
        let shared = SharedCredential::new();
        let state = shared.snapshot();
        assert!(state.needs_login);
        assert!(!state.awaiting_expiry);
        assert_eq!(shared.token(), None);
        assert_eq!(state.subject(), "");
    }

    #[test]
    fn test_clones_share_state() {
        let writer = SharedCredential::new();
        let reader = writer.clone();

        writer.update(|s| {
            s.token = "abc".into();
            s.needs_login = false;
        });

        assert_eq!(reader.token().as_deref(), Some("abc"));
        assert!(!reader.snapshot().needs_login);
    }

    #[test]
    fn test_readers_see_whole_updates() {
        let shared = SharedCredential::new();
        let writer = shared.clone();

        let handle = std::thread::spawn(move || {
            for i in 0..1000 {
                writer.update(|s| {
                    s.token = format!("token-{i}");
                    s.refresh_token = Some(format!("refresh-{i}"));
                });
            }
        });

        for _ in 0..1000 {
            let state = shared.snapshot();
            if let Some(refresh) = state.refresh_token {
                assert_eq!(refresh.trim_start_matches("refresh-"), state.token.trim_start_matches("token-"));
            }
        }
        handle.join().unwrap();
    }
}
