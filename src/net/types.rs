//! Wire DTOs for the session endpoints.
//!
//! DESIGN
//! ======
//! The server owns the user record; the client only holds a read-only copy.
//! Every field except `id` defaults when absent so a minimal payload such as
//! `{ "id": 1, "name": "John" }` still decodes.

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;

use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

/// Client-visible projection of a marketplace user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Server-assigned identifier.
    #[serde(deserialize_with = "deserialize_user_id")]
    pub id: i64,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: String,
    /// Profile image URL.
    #[serde(default, alias = "image")]
    pub image_url: Option<String>,
    /// Postal code used to localize listings.
    #[serde(default, alias = "zip")]
    pub zip_code: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    /// How the account authenticates (e.g. `"password"`, `"google"`).
    #[serde(default)]
    pub auth_method: Option<String>,
    /// Identifier at the external auth provider, when there is one.
    #[serde(default)]
    pub auth_id: Option<String>,
}

impl User {
    /// Name to show in navigation, falling back to the email address.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.email)
    }
}

/// `{ "user": ... }` envelope returned by session, sign-in and sign-up.
///
/// A `null` user on the session endpoint means no session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEnvelope {
    #[serde(default)]
    pub user: Option<User>,
}

/// Body of `POST /api/auth/signin`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

impl SignInRequest {
    #[must_use]
    pub fn new(email: &str, password: &str) -> Self {
        Self { email: email.trim().to_owned(), password: password.to_owned() }
    }
}

impl fmt::Debug for SignInRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignInRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Body of `POST /api/auth/signup`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignUpRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub zip: String,
}

impl SignUpRequest {
    #[must_use]
    pub fn new(name: &str, email: &str, password: &str, zip: &str) -> Self {
        Self {
            name: name.trim().to_owned(),
            email: email.trim().to_owned(),
            password: password.to_owned(),
            zip: zip.trim().to_owned(),
        }
    }
}

impl fmt::Debug for SignUpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignUpRequest")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("zip", &self.zip)
            .finish()
    }
}

/// Error body shape shared by all endpoints.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

/// Accept integer ids sent as numbers, integral floats, or numeric strings.
fn deserialize_user_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::Number(number) => {
            if let Some(int) = number.as_i64() {
                return Ok(int);
            }
            #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
            if let Some(float) = number.as_f64()
                && float.is_finite()
                && float.fract() == 0.0
                && float >= i64::MIN as f64
                && float < i64::MAX as f64
            {
                return Ok(float as i64);
            }
            Err(D::Error::custom("expected integer-compatible user id"))
        }
        serde_json::Value::String(raw) => raw
            .trim()
            .parse::<i64>()
            .map_err(|_| D::Error::custom(format!("expected numeric user id, got {raw:?}"))),
        _ => Err(D::Error::custom("expected user id")),
    }
}
