//! Route guards shared by auth-aware consumers.
//!
//! SYSTEM CONTEXT
//! ==============
//! Protected pages and sign-in forms should apply identical redirect
//! behavior, and none of them should decide anything while the first
//! session check is still pending.

#[cfg(test)]
#[path = "guard_test.rs"]
mod guard_test;

use crate::net::types::User;
use crate::state::auth::AuthState;

pub const LOGIN_PATH: &str = "/login";
pub const HOME_PATH: &str = "/";

/// Verdict of a route guard.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Access {
    /// First session check still running; render a placeholder.
    Pending,
    Granted(Option<User>),
    Redirect(String),
}

/// Guard for pages that need a signed-in user.
#[must_use]
pub fn require_user(state: &AuthState, login_path: &str) -> Access {
    if state.is_initializing() {
        return Access::Pending;
    }
    match state.user() {
        Some(user) => Access::Granted(Some(user.clone())),
        None => Access::Redirect(login_path.to_owned()),
    }
}

/// Guard for sign-in and sign-up pages: signed-in users are sent home.
#[must_use]
pub fn require_guest(state: &AuthState, home_path: &str) -> Access {
    if state.is_initializing() {
        return Access::Pending;
    }
    if state.is_authenticated() { Access::Redirect(home_path.to_owned()) } else { Access::Granted(None) }
}

/// Redirect to the login page once auth has loaded and no user is present.
#[must_use]
pub fn should_redirect_unauth(state: &AuthState) -> bool {
    !state.is_initializing() && !state.is_authenticated()
}
