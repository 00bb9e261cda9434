//! Durable key-value storage for the cart.
//!
//! The cart store is the only writer. Writes are synchronous; callers treat a
//! failed write as non-fatal and keep the in-memory state authoritative.

use std::collections::HashMap;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tenant_cart_core::CartLineItem;

/// Version written into every persisted cart document.
pub const PERSISTED_VERSION: u32 = 1;

/// Errors raised by a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The cart could not be encoded.
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Key contains characters the backend cannot store.
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    /// The backend refuses all access (e.g. disabled by the environment).
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// A simple get/set key-value persistence substrate.
pub trait CartStorage: Send + Sync {
    /// Read the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    fn load(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    fn save(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete `key`. Missing keys are not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the delete fails.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

// =============================================================================
// Persisted Document
// =============================================================================

/// On-disk shape of the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedCart {
    pub version: u32,
    pub items: Vec<CartLineItem>,
    /// Server cart of the last confirmed merge; absent in documents written
    /// before any login.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synced: Option<SyncBaseline>,
}

/// The server cart a confirmed merge returned, and whose it was.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncBaseline {
    pub subject: String,
    pub items: Vec<CartLineItem>,
}

impl PersistedCart {
    /// Encode `items` and the sync baseline as a current-version document.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialize` if encoding fails.
    pub fn encode(
        items: &[CartLineItem],
        synced: Option<&SyncBaseline>,
    ) -> Result<String, StorageError> {
        #[derive(Serialize)]
        struct Borrowed<'a> {
            version: u32,
            items: &'a [CartLineItem],
            #[serde(skip_serializing_if = "Option::is_none")]
            synced: Option<&'a SyncBaseline>,
        }

        Ok(serde_json::to_string(&Borrowed {
            version: PERSISTED_VERSION,
            items,
            synced,
        })?)
    }

    /// Decode a stored document, rejecting unknown versions.
    ///
    /// Returns `None` for anything that is not a readable current-version cart.
    #[must_use]
    pub fn decode(raw: &str) -> Option<Self> {
        let doc: Self = match serde_json::from_str(raw) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable persisted cart");
                return None;
            }
        };

        if doc.version != PERSISTED_VERSION {
            tracing::warn!(
                version = doc.version,
                expected = PERSISTED_VERSION,
                "Discarding persisted cart with unknown version"
            );
            return None;
        }

        Some(doc)
    }
}

// =============================================================================
// MemoryStorage
// =============================================================================

/// In-process storage, lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CartStorage for MemoryStorage {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .lock()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

// =============================================================================
// FileStorage
// =============================================================================

/// One JSON file per key inside a directory.
///
/// Writes go to a sibling temp file that is renamed over the target, so a
/// crash mid-write leaves the previous cart intact.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Use `dir` as the storage root. The directory is created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The storage root.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !key.starts_with('.');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl CartStorage for FileStorage {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        std::fs::create_dir_all(&self.dir)?;

        let tmp = path.with_extension("json.tmp");
        {
            let mut file = std::fs::File::create(&tmp)?;
            file.write_all(value.as_bytes())?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
