//! # farmstand
//!
//! Session and authentication client for the farmstand marketplace API.
//!
//! The server owns the session (an HTTP-only cookie); this crate keeps a
//! client-side view of who is signed in consistent with it. One
//! [`auth::context::AuthContext`] is built at the application root and shared
//! by cloning; a [`auth::poller::SessionPoller`] re-validates it in the
//! background and [`auth::guard`] turns it into routing decisions.

pub mod auth;
pub mod config;
pub mod error;
pub mod net;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;
