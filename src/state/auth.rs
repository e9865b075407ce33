//! Auth-session state for the current client.
//!
//! SYSTEM CONTEXT
//! ==============
//! Read by route guards and user-aware consumers to coordinate sign-in
//! redirects and identity-dependent rendering. Written only by
//! [`crate::auth::context::AuthContext`].

#[cfg(test)]
#[path = "auth_test.rs"]
mod auth_test;

use serde::Serialize;

use crate::net::types::User;

/// Where the client is in the session lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthPhase {
    /// Mounted, first session check not started.
    Uninitialized,
    /// First session check in flight.
    Checking,
    Authenticated,
    Anonymous,
}

/// Authentication state tracking the current user and loading status.
///
/// `is_authenticated` is derived from `user` and never stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthState {
    user: Option<User>,
    is_initializing: bool,
    loading: bool,
}

impl Default for AuthState {
    fn default() -> Self {
        Self { user: None, is_initializing: true, loading: false }
    }
}

impl AuthState {
    #[must_use]
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// True from construction until the first session check resolves.
    #[must_use]
    pub fn is_initializing(&self) -> bool {
        self.is_initializing
    }

    /// True while any session request is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    #[must_use]
    pub fn phase(&self) -> AuthPhase {
        match (self.is_initializing, self.loading, &self.user) {
            (true, false, _) => AuthPhase::Uninitialized,
            (true, true, _) => AuthPhase::Checking,
            (false, _, Some(_)) => AuthPhase::Authenticated,
            (false, _, None) => AuthPhase::Anonymous,
        }
    }

    /// Replace the user and mark initialization done.
    ///
    /// Returns true when the user's identity changed (not just its fields).
    pub(crate) fn set_user(&mut self, user: Option<User>) -> bool {
        let changed = self.user.as_ref().map(|u| u.id) != user.as_ref().map(|u| u.id);
        self.user = user;
        self.is_initializing = false;
        changed
    }

    pub(crate) fn finish_initializing(&mut self) {
        self.is_initializing = false;
    }

    pub(crate) fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }
}
