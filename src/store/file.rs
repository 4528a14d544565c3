use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::{StorageKey, TokenStore, encode_grant};
use crate::error::Error;
use crate::session::TokenGrant;

/// Token store persisted as a small JSON document on disk.
///
/// The document is an object keyed by the persisted key names. Writes go to a
/// sibling temp file that is renamed over the target, so a crash mid-write
/// leaves either the old session or the new one.
///
/// Reads are served from memory. `set_all` and `clear` touch the disk
/// synchronously while holding the internal lock; the document is a few
/// hundred bytes, so this blocks an async caller for one small write and a
/// rename. Callers with a slow or remote filesystem should implement
/// [`TokenStore`] on top of their own I/O instead.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<StorageKey, String>>,
}

impl FileTokenStore {
    /// Open (or lazily create) the store at `path`.
    ///
    /// A missing file is an empty session. An unreadable or corrupt file is
    /// also treated as empty; it is replaced on the next login.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the file exists but cannot be read.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, Error> {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => parse_document(&raw, &path),
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(Error::Storage(format!("{}: {e}", path.display()))),
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Location of the session document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_document(&self, entries: &BTreeMap<StorageKey, String>) -> Result<(), Error> {
        let document: BTreeMap<&str, &str> = entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let body = serde_json::to_vec_pretty(&document)
            .map_err(|e| Error::Storage(e.to_string()))?;

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, body)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self, key: StorageKey) -> Option<String> {
        self.entries.lock().get(&key).cloned()
    }

    fn set_all(&self, grant: &TokenGrant) -> Result<(), Error> {
        let mut entries = self.entries.lock();
        let next: BTreeMap<_, _> = encode_grant(grant).into_iter().collect();
        self.write_document(&next)?;
        *entries = next;
        Ok(())
    }

    fn clear(&self) -> Result<(), Error> {
        let mut entries = self.entries.lock();
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(Error::Storage(format!("{}: {e}", self.path.display()))),
        }
        entries.clear();
        Ok(())
    }
}

fn parse_document(raw: &str, path: &Path) -> BTreeMap<StorageKey, String> {
    let document: BTreeMap<String, String> = match serde_json::from_str(raw) {
        Ok(doc) => doc,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Ignoring corrupt session file");
            return BTreeMap::new();
        }
    };
    document
        .into_iter()
        .filter_map(|(name, value)| StorageKey::from_name(&name).map(|key| (key, value)))
        .collect()
}
