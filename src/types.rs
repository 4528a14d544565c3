use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Short-lived bearer credential for API calls.
///
/// `Debug` is redacted so tokens never reach logs.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, From, Into)]
#[serde(transparent)]
pub struct AccessToken(pub String);

impl AccessToken {
    /// Raw token text, for building headers.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

impl From<&str> for AccessToken {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Credential used only to mint a new access token.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, From, Into)]
#[serde(transparent)]
pub struct RefreshToken(pub String);

impl RefreshToken {
    /// Raw token text, for the refresh query parameter.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for RefreshToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RefreshToken(***)")
    }
}

impl From<&str> for RefreshToken {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Cached profile of the signed-in admin.
///
/// Display-only: nothing in this crate makes authorization decisions from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct Principal(pub JsonValue);

impl Principal {
    /// Gets a profile field by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.0.get(key)
    }

    /// Convenience accessor for the `email` field.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.get("email").and_then(JsonValue::as_str)
    }

    /// Convenience accessor for the `name` field.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.get("name").and_then(JsonValue::as_str)
    }

    /// The profile as received.
    #[must_use]
    pub fn as_json(&self) -> &JsonValue {
        &self.0
    }
}

/// Login form credentials.
#[derive(Clone, Serialize)]
pub struct Credentials {
    /// Login email.
    pub email: String,
    /// Plain-text password; never logged.
    pub password: String,
}

impl Credentials {
    /// Credentials for the login form.
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}
