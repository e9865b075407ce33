//! REST client for the session endpoints.
//!
//! DESIGN
//! ======
//! `SessionApi` is the seam the auth context depends on; `ApiClient` is the
//! reqwest implementation. The client owns a cookie jar so the HTTP-only
//! session cookie set by sign-in rides along on every later request.
//!
//! ERROR HANDLING
//! ==============
//! Every non-2xx is normalized through [`AuthError::from_response`] so callers
//! see one `message` regardless of endpoint. Only the session endpoint maps
//! 401 to [`AuthError::Unauthorized`]; a 401 from sign-in is a rejected
//! credential and surfaces as a validation error for the form.

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;

use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::{CookieStore, Jar};
use reqwest::{Response, StatusCode, Url};
use serde::de::DeserializeOwned;

use super::types::{SessionEnvelope, SignInRequest, SignUpRequest, User};
use crate::config::AuthConfig;
use crate::error::AuthError;

pub const SESSION_PATH: &str = "/api/auth/session";
pub const SIGN_IN_PATH: &str = "/api/auth/signin";
pub const SIGN_UP_PATH: &str = "/api/auth/signup";
pub const LOGOUT_PATH: &str = "/api/auth/logout";

// =============================================================================
// SESSION API TRAIT
// =============================================================================

/// Session-store operations consumed by the auth context. Enables mocking in tests.
#[async_trait::async_trait]
pub trait SessionApi: Send + Sync {
    /// `GET /api/auth/session`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Unauthorized`] when there is no session, or a
    /// transient error when the server could not answer.
    async fn session(&self) -> Result<User, AuthError>;

    /// `POST /api/auth/signin`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Validation`] carrying the server's message when
    /// the credentials are rejected.
    async fn sign_in(&self, request: &SignInRequest) -> Result<User, AuthError>;

    /// `POST /api/auth/signup`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Validation`] carrying the server's message when
    /// the account cannot be created.
    async fn sign_up(&self, request: &SignUpRequest) -> Result<User, AuthError>;

    /// `POST /api/auth/logout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the server could not be reached or refused.
    async fn logout(&self) -> Result<(), AuthError>;

    /// Drop any locally held session credential.
    fn forget_session(&self) {}
}

// =============================================================================
// API CLIENT
// =============================================================================

/// reqwest-backed [`SessionApi`] with its own cookie jar.
pub struct ApiClient {
    http: reqwest::Client,
    jar: Arc<Jar>,
    base_url: String,
    cookie_url: Url,
    session_cookie: String,
}

impl ApiClient {
    /// Build a client from config, seeding the jar with a known session token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidBaseUrl`] if the base URL does not parse,
    /// or [`AuthError::HttpClientBuild`] if reqwest cannot build a client.
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        let base_url = config.base_url.trim_end_matches('/').to_owned();
        let cookie_url =
            Url::parse(&format!("{base_url}/")).map_err(|e| AuthError::InvalidBaseUrl(format!("{base_url}: {e}")))?;

        let jar = Arc::new(Jar::default());
        if let Some(token) = &config.session_token {
            jar.add_cookie_str(&format!("{}={token}; Path=/", config.session_cookie), &cookie_url);
        }

        let http = reqwest::Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| AuthError::HttpClientBuild(e.to_string()))?;

        Ok(Self { http, jar, base_url, cookie_url, session_cookie: config.session_cookie.clone() })
    }

    /// Current value of the session cookie, if the jar holds one.
    #[must_use]
    pub fn session_token(&self) -> Option<String> {
        let header = self.jar.cookies(&self.cookie_url)?;
        let header = header.to_str().ok()?;
        find_cookie(header, &self.session_cookie)
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait::async_trait]
impl SessionApi for ApiClient {
    async fn session(&self) -> Result<User, AuthError> {
        let response = self.http.get(self.endpoint(SESSION_PATH)).send().await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(AuthError::Unauthorized);
        }
        let envelope: SessionEnvelope = read_json("session check", response).await?;
        envelope.user.ok_or(AuthError::Unauthorized)
    }

    async fn sign_in(&self, request: &SignInRequest) -> Result<User, AuthError> {
        let response = self
            .http
            .post(self.endpoint(SIGN_IN_PATH))
            .json(request)
            .send()
            .await?;
        let envelope: SessionEnvelope = read_json("sign in", response).await?;
        envelope.user.ok_or_else(|| missing_user("sign in"))
    }

    async fn sign_up(&self, request: &SignUpRequest) -> Result<User, AuthError> {
        let response = self
            .http
            .post(self.endpoint(SIGN_UP_PATH))
            .json(request)
            .send()
            .await?;
        let envelope: SessionEnvelope = read_json("sign up", response).await?;
        envelope.user.ok_or_else(|| missing_user("sign up"))
    }

    async fn logout(&self) -> Result<(), AuthError> {
        let response = self.http.post(self.endpoint(LOGOUT_PATH)).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(AuthError::from_response("sign out", status.as_u16(), &body))
    }

    fn forget_session(&self) {
        // Max-Age=0 evicts the cookie from the jar.
        self.jar
            .add_cookie_str(&format!("{}=; Path=/; Max-Age=0", self.session_cookie), &self.cookie_url);
    }
}

// =============================================================================
// HELPERS
// =============================================================================

async fn read_json<T: DeserializeOwned>(action: &str, response: Response) -> Result<T, AuthError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(AuthError::from_response(action, status.as_u16(), &body));
    }
    serde_json::from_str(&body).map_err(|e| AuthError::Decode(format!("{action}: {e}")))
}

fn missing_user(action: &str) -> AuthError {
    AuthError::Decode(format!("{action}: response carried no user"))
}

/// Extract one cookie's value from a `Cookie` header (`a=1; b=2`).
pub(crate) fn find_cookie(header: &str, name: &str) -> Option<String> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_owned())
        .filter(|value| !value.is_empty())
}
