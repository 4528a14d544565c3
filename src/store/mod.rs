//! Persistent key-value surface for the admin session.
//!
//! The store is deliberately dumb: it writes and reads the five session keys
//! and does no validation. Interpretation (expiry parsing, partial-session
//! detection) happens in [`TokenStore::session`] and the session manager.
//!
//! | key | value |
//! |---|---|
//! | `admin_token` | access token |
//! | `admin_refresh_token` | refresh token |
//! | `admin_token_expires_at` | RFC 3339 access token expiry |
//! | `admin_refresh_token_expires_at` | RFC 3339 refresh token expiry |
//! | `admin_data` | principal as JSON (`null` when unknown) |

mod file;
mod memory;

pub use file::FileTokenStore;
pub use memory::MemoryTokenStore;

use crate::error::Error;
use crate::expiry::{format_timestamp, parse_timestamp};
use crate::session::{Session, TokenGrant};
use crate::types::Principal;

/// One of the five persisted session keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StorageKey {
    /// `admin_token`
    AccessToken,
    /// `admin_refresh_token`
    RefreshToken,
    /// `admin_token_expires_at`
    AccessTokenExpiresAt,
    /// `admin_refresh_token_expires_at`
    RefreshTokenExpiresAt,
    /// `admin_data`
    Principal,
}

impl StorageKey {
    /// Every key, in persisted order.
    pub const ALL: [Self; 5] = [
        Self::AccessToken,
        Self::RefreshToken,
        Self::AccessTokenExpiresAt,
        Self::RefreshTokenExpiresAt,
        Self::Principal,
    ];

    /// Persisted key name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AccessToken => "admin_token",
            Self::RefreshToken => "admin_refresh_token",
            Self::AccessTokenExpiresAt => "admin_token_expires_at",
            Self::RefreshTokenExpiresAt => "admin_refresh_token_expires_at",
            Self::Principal => "admin_data",
        }
    }

    /// Key for a persisted name; `None` for anything unknown.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }
}

impl std::fmt::Display for StorageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Consumer-replaceable session persistence.
///
/// Implementations must make [`set_all`](TokenStore::set_all) and
/// [`clear`](TokenStore::clear) all-or-nothing: a reader never observes a mix
/// of old and new keys.
///
/// # Example
///
/// ```rust,ignore
/// impl TokenStore for BrowserStorage {
///     fn get(&self, key: StorageKey) -> Option<String> {
///         self.local_storage.get_item(key.as_str()).ok().flatten()
///     }
///
///     fn set_all(&self, grant: &TokenGrant) -> Result<(), Error> {
///         for (key, value) in admin_session::store::encode_grant(grant) {
///             self.local_storage.set_item(key.as_str(), &value)?;
///         }
///         Ok(())
///     }
///
///     fn clear(&self) -> Result<(), Error> {
///         for key in StorageKey::ALL {
///             self.local_storage.remove_item(key.as_str())?;
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait TokenStore: Send + Sync + 'static {
    /// Raw stored value for a key.
    fn get(&self, key: StorageKey) -> Option<String>;

    /// Overwrite all five keys from a freshly minted grant.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the backing medium cannot be written.
    fn set_all(&self, grant: &TokenGrant) -> Result<(), Error>;

    /// Remove all five keys. Clearing an empty store is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the backing medium cannot be written.
    fn clear(&self) -> Result<(), Error>;

    /// Read the stored keys back as a typed [`Session`].
    ///
    /// Values that do not parse read as absent, which the expiry check then
    /// treats as expired.
    fn session(&self) -> Session {
        Session {
            access_token: self.get(StorageKey::AccessToken).map(Into::into),
            access_token_expires_at: self
                .get(StorageKey::AccessTokenExpiresAt)
                .as_deref()
                .and_then(parse_timestamp),
            refresh_token: self.get(StorageKey::RefreshToken).map(Into::into),
            refresh_token_expires_at: self
                .get(StorageKey::RefreshTokenExpiresAt)
                .as_deref()
                .and_then(parse_timestamp),
            principal: self
                .get(StorageKey::Principal)
                .as_deref()
                .and_then(decode_principal),
        }
    }
}

impl<T: TokenStore> TokenStore for std::sync::Arc<T> {
    fn get(&self, key: StorageKey) -> Option<String> {
        (**self).get(key)
    }

    fn set_all(&self, grant: &TokenGrant) -> Result<(), Error> {
        (**self).set_all(grant)
    }

    fn clear(&self) -> Result<(), Error> {
        (**self).clear()
    }
}

/// Encode a grant as the five `(key, value)` pairs to persist.
#[must_use]
pub fn encode_grant(grant: &TokenGrant) -> [(StorageKey, String); 5] {
    let principal = grant
        .principal
        .as_ref()
        .map_or_else(|| "null".to_owned(), |p| p.0.to_string());
    [
        (StorageKey::AccessToken, grant.access_token.as_str().to_owned()),
        (StorageKey::RefreshToken, grant.refresh_token.as_str().to_owned()),
        (
            StorageKey::AccessTokenExpiresAt,
            format_timestamp(grant.access_token_expires_at),
        ),
        (
            StorageKey::RefreshTokenExpiresAt,
            format_timestamp(grant.refresh_token_expires_at),
        ),
        (StorageKey::Principal, principal),
    ]
}

fn decode_principal(raw: &str) -> Option<Principal> {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Null) => None,
        Ok(value) => Some(Principal(value)),
        Err(e) => {
            tracing::warn!(error = %e, "Stored principal is not valid JSON");
            None
        }
    }
}
