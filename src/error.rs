//! Error taxonomy for session and authentication operations.
//!
//! DESIGN
//! ======
//! Every non-2xx response is normalized into a variant that carries a single
//! human-readable `message`, mirroring the server's `{ "message": ... }` body.
//! Callers that only need text use [`AuthError::message`]. Sign-in
//! confirmation uses [`AuthError::is_transient`] to decide whether the
//! sign-in response may stand in for an unreachable session check.

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;

use crate::net::types::ErrorBody;

/// Errors produced by the API client and the auth context.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The request never produced a response (offline, DNS, timeout).
    #[error("network error: {0}")]
    Network(String),

    /// The session endpoint reported that no session exists.
    #[error("not signed in")]
    Unauthorized,

    /// The server rejected the request with a 4xx and a message.
    #[error("{message}")]
    Validation { status: u16, message: String },

    /// The server failed with a 5xx or an unexpected status.
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },

    /// A success response body could not be decoded.
    #[error("response decode failed: {0}")]
    Decode(String),

    /// Sign-in succeeded but the follow-up session check found no session,
    /// so the cookie was never stored.
    #[error("session was not established after sign-in")]
    SessionNotEstablished,

    /// A sign-out or another sign-in landed while this sign-in was being
    /// confirmed; the later write stands.
    #[error("sign-in was superseded by a later session change")]
    Superseded,

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    /// The configured base URL is not a valid absolute URL.
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
}

impl AuthError {
    /// Normalize a non-2xx response into an error.
    ///
    /// `action` names the request in the fallback message used when the body
    /// carries no `message` (e.g. `"sign in failed: 502"`).
    #[must_use]
    pub fn from_response(action: &str, status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<ErrorBody>(body)
            .ok()
            .map(|b| b.message)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| request_failed_message(action, status));

        if (400..500).contains(&status) {
            Self::Validation { status, message }
        } else {
            Self::Server { status, message }
        }
    }

    /// The single user-facing message for this error.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Validation { message, .. } | Self::Server { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Whether the failure says nothing about the session itself.
    ///
    /// Only transient failures let a sign-in fall back to its response
    /// payload. No session-check failure other than 401 evicts a user.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Server { .. } | Self::Decode(_))
    }

    /// HTTP status attached to the error, if a response was received.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized => Some(401),
            Self::Validation { status, .. } | Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() { Self::Decode(e.to_string()) } else { Self::Network(e.to_string()) }
    }
}

pub(crate) fn request_failed_message(action: &str, status: u16) -> String {
    format!("{action} failed: {status}")
}
