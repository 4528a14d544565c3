#![doc = include_str!("../README.md")]

pub mod api;
pub mod config;
pub mod error;
pub mod expiry;
pub mod guard;
pub mod manager;
pub mod session;
pub mod store;
pub mod traits;
pub mod types;

#[cfg(test)]
mod test_support;

// Re-exports for convenient access
pub use api::{ApiConfig, AuthClient};
pub use config::SessionConfig;
pub use error::Error;
pub use expiry::{is_expired, is_expired_at, parse_timestamp};
pub use guard::{GuardHandle, GuardSettings, GuardState, LoginRedirect, SessionGuard};
pub use manager::{SessionEndReason, SessionEvent, SessionManager};
pub use session::{Session, TokenGrant};
pub use store::{FileTokenStore, MemoryTokenStore, StorageKey, TokenStore};
pub use traits::{AuthBackend, Redirector};
pub use types::{AccessToken, Credentials, Principal, RefreshToken};
