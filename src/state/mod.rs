//! Client-side state owned by the auth context.
//!
//! DESIGN
//! ======
//! `auth` holds the observable session state; `cache` holds data derived
//! from it that must not outlive the session.

pub mod auth;
pub mod cache;
