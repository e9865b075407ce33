//! Client configuration parsed from environment variables.

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:3000";
pub const DEFAULT_SESSION_POLL_SECS: u64 = 300;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_SIGNIN_CONFIRM_DELAY_MS: u64 = 500;
pub const DEFAULT_SESSION_COOKIE: &str = "session_token";

/// Errors raised while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A configuration value could not be parsed.
    #[error("config parse failed: {0}")]
    Parse(String),
}

/// How a successful sign-in or sign-up is reconciled with the server session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignInConfirmation {
    /// Await an authoritative session check before resolving.
    Await,
    /// Write the response payload immediately, then re-check after the delay.
    Deferred(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

/// Everything the API client and auth context need to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    pub base_url: String,
    pub poll_interval: Duration,
    pub timeouts: HttpTimeouts,
    pub confirmation: SignInConfirmation,
    pub session_cookie: String,
    /// Known session token to seed the cookie jar with.
    pub session_token: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_owned(),
            poll_interval: Duration::from_secs(DEFAULT_SESSION_POLL_SECS),
            timeouts: HttpTimeouts {
                request_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
                connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            },
            confirmation: SignInConfirmation::Await,
            session_cookie: DEFAULT_SESSION_COOKIE.to_owned(),
            session_token: None,
        }
    }
}

impl AuthConfig {
    /// Build typed config from environment variables.
    ///
    /// Optional:
    /// - `FARMSTAND_API_URL`: server base URL (default `http://127.0.0.1:3000`)
    /// - `FARMSTAND_SESSION_POLL_SECS`: default 300
    /// - `FARMSTAND_REQUEST_TIMEOUT_SECS`: default 30
    /// - `FARMSTAND_CONNECT_TIMEOUT_SECS`: default 10
    /// - `FARMSTAND_SIGNIN_CONFIRM`: `await` (default) or `deferred`
    /// - `FARMSTAND_SIGNIN_CONFIRM_DELAY_MS`: default 500, used by `deferred`
    /// - `FARMSTAND_SESSION_COOKIE`: default `session_token`
    /// - `FARMSTAND_SESSION_TOKEN`: unset by default
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for an unknown confirmation mode or a
    /// base URL that is empty or not `http(s)`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = parse_base_url(&std::env::var("FARMSTAND_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.into()))?;
        let delay_ms = env_parse("FARMSTAND_SIGNIN_CONFIRM_DELAY_MS", DEFAULT_SIGNIN_CONFIRM_DELAY_MS);
        let confirmation = parse_confirmation(std::env::var("FARMSTAND_SIGNIN_CONFIRM").ok().as_deref(), delay_ms)?;

        let session_cookie = std::env::var("FARMSTAND_SESSION_COOKIE")
            .ok()
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_SESSION_COOKIE.to_owned());
        let session_token = std::env::var("FARMSTAND_SESSION_TOKEN")
            .ok()
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty());

        Ok(Self {
            base_url,
            poll_interval: Duration::from_secs(env_parse("FARMSTAND_SESSION_POLL_SECS", DEFAULT_SESSION_POLL_SECS).max(1)),
            timeouts: HttpTimeouts {
                request_secs: env_parse("FARMSTAND_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
                connect_secs: env_parse("FARMSTAND_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
            },
            confirmation,
            session_cookie,
            session_token,
        })
    }

    /// Replace the base URL, applying the same validation as [`Self::from_env`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the URL is empty or not `http(s)`.
    pub fn with_base_url(mut self, raw: &str) -> Result<Self, ConfigError> {
        self.base_url = parse_base_url(raw)?;
        Ok(self)
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn parse_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(ConfigError::Parse("FARMSTAND_API_URL is empty".into()));
    }
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ConfigError::Parse(format!("FARMSTAND_API_URL must be http(s): {trimmed}")));
    }
    Ok(trimmed.to_owned())
}

fn parse_confirmation(raw: Option<&str>, delay_ms: u64) -> Result<SignInConfirmation, ConfigError> {
    match raw.map_or("await", str::trim) {
        "await" => Ok(SignInConfirmation::Await),
        "deferred" => Ok(SignInConfirmation::Deferred(Duration::from_millis(delay_ms))),
        other => Err(ConfigError::Parse(format!(
            "unsupported FARMSTAND_SIGNIN_CONFIRM '{other}' (expected 'await' or 'deferred')"
        ))),
    }
}
