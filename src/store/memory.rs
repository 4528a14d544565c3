use std::collections::HashMap;

use parking_lot::Mutex;

use super::{StorageKey, TokenStore, encode_grant};
use crate::error::Error;
use crate::session::TokenGrant;

/// In-process token store. Does not survive a restart.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    entries: Mutex<HashMap<StorageKey, String>>,
}

impl MemoryTokenStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with a grant, for tests and fixtures.
    #[must_use]
    pub fn with_grant(grant: &TokenGrant) -> Self {
        Self {
            entries: Mutex::new(encode_grant(grant).into_iter().collect()),
        }
    }

    /// Write a single raw key, bypassing the all-or-nothing contract.
    ///
    /// Only useful for simulating corrupted or half-written storage.
    pub fn insert_raw(&self, key: StorageKey, value: impl Into<String>) {
        self.entries.lock().insert(key, value.into());
    }

    /// Number of keys currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no key is held at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, key: StorageKey) -> Option<String> {
        self.entries.lock().get(&key).cloned()
    }

    fn set_all(&self, grant: &TokenGrant) -> Result<(), Error> {
        let mut entries = self.entries.lock();
        entries.clear();
        entries.extend(encode_grant(grant));
        Ok(())
    }

    fn clear(&self) -> Result<(), Error> {
        self.entries.lock().clear();
        Ok(())
    }
}
