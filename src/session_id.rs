//! Client session identity.
//!
//! A [`SessionId`] correlates this client with server-side conversation state. It is read from a
//! [`Storage`] under a fixed key and generated (UUIDv4) only when absent. [`MemoryStorage`] gives
//! an identity that lives as long as the process; [`FileStorage`] persists it across runs.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{from_reader, to_writer_pretty};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Storage key the session identifier is kept under.
pub const SESSION_STORAGE_KEY: &str = "chat_session_id";

/// An opaque session token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wraps an existing token.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random token.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Client-local key/value storage.
pub trait Storage: Send {
    /// Returns the value stored under `key`.
    fn get(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key`.
    fn set(&mut self, key: &str, value: &str);
}

impl<S: Storage + ?Sized> Storage for Box<S> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) {
        (**self).set(key, value)
    }
}

/// Returns the stored session identifier, generating and storing one if absent.
///
/// Calling this twice without an intervening write to `storage` yields the same identifier.
pub fn get_or_create_session_id(storage: &mut dyn Storage) -> SessionId {
    if let Some(existing) = storage.get(SESSION_STORAGE_KEY).filter(|s| !s.is_empty()) {
        return SessionId::new(existing);
    }
    let id = SessionId::generate();
    storage.set(SESSION_STORAGE_KEY, id.as_str());
    tracing::info!(session_id = %id, "generated new session id");
    id
}

/////////////////////////////////////////// Memory ////////////////////////////////////////////

/// Storage that lives for the lifetime of the process.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    entries: BTreeMap<String, String>,
}

impl MemoryStorage {
    /// Creates empty storage.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }
}

//////////////////////////////////////////// File /////////////////////////////////////////////

/// Storage persisted as a JSON object in a single file.
///
/// Writes go through to disk immediately. A write that fails is logged and the value stays
/// available in memory, so identity degrades to process scope instead of failing.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

#[derive(Serialize, Deserialize)]
struct StorageFile {
    version: u8,
    entries: BTreeMap<String, String>,
}

impl FileStorage {
    /// Opens the storage file at `path`; a missing file is treated as empty.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = match File::open(&path) {
            Ok(file) => {
                let reader = BufReader::new(file);
                let stored: StorageFile = from_reader(reader).map_err(|err| {
                    Error::serialization("failed to parse storage file", Some(Box::new(err)))
                })?;
                stored.entries
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(Error::io("failed to open storage file", err)),
        };
        Ok(Self { path, entries })
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<()> {
        let stored = StorageFile {
            version: 1,
            entries: self.entries.clone(),
        };
        let file = File::create(&self.path)
            .map_err(|err| Error::io("failed to create storage file", err))?;
        let mut writer = BufWriter::new(file);
        to_writer_pretty(&mut writer, &stored).map_err(|err| {
            Error::serialization("failed to serialize storage file", Some(Box::new(err)))
        })?;
        writer
            .flush()
            .map_err(|err| Error::io("failed to write storage file", err))
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
        if let Err(err) = self.persist() {
            tracing::warn!(path = %self.path.display(), error = %err, "storage write failed");
        }
    }
}
