//! Key/value document storage scoped to one profile directory.
//!
//! Documents are opaque strings. `set` always replaces the whole document;
//! there is no partial patching. A read-modify-write must hold the key's
//! [`DocumentLock`], which excludes every other handle on the same backing
//! storage, including handles owned by other processes.

use fs2::FileExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Storage I/O error for '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize ledger: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub trait DocumentStore: Send + Sync {
    /// `Ok(None)` when nothing has been written under `key` yet.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, key: &str, document: &str) -> Result<(), StoreError>;

    /// Blocks until exclusive access to `key` is granted. Released on drop.
    fn lock(&self, key: &str) -> Result<DocumentLock<'_>, StoreError>;
}

trait Held {}

impl<T> Held for T {}

/// Exclusive access to one key of a [`DocumentStore`].
pub struct DocumentLock<'a> {
    _held: Box<dyn Held + 'a>,
}

impl<'a> DocumentLock<'a> {
    /// Wraps whatever keeps the lock held; dropping it must release the lock.
    pub fn new<T: 'a>(held: T) -> Self {
        Self {
            _held: Box::new(held),
        }
    }
}

/// Advisory lock on `<key>.lock`, shared with every process using the directory.
struct LockFile(File);

impl Drop for LockFile {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.0);
    }
}

/// One file per key inside the profile directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    fn lock_path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.lock", key))
    }
}

impl DocumentStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match std::fs::read(self.path_for(key)) {
            Ok(bytes) => match String::from_utf8(bytes) {
                Ok(contents) => Ok(Some(contents)),
                // Not a readable document at all; callers treat it as corrupt.
                Err(e) => {
                    tracing::warn!("store: '{}' is not valid UTF-8, treating as corrupt", key);
                    Ok(Some(String::from_utf8_lossy(e.as_bytes()).into_owned()))
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    /// Write-to-temp-then-rename so a crash mid-write never leaves a torn document.
    fn set(&self, key: &str, document: &str) -> Result<(), StoreError> {
        let io_err = |source: std::io::Error| StoreError::Io {
            key: key.to_string(),
            source,
        };
        std::fs::create_dir_all(&self.dir).map_err(io_err)?;

        let path = self.path_for(key);
        let temp = path.with_extension(format!("json.{}.tmp", uuid::Uuid::new_v4().simple()));
        std::fs::write(&temp, document).map_err(io_err)?;
        std::fs::rename(&temp, &path).map_err(|e| {
            let _ = std::fs::remove_file(&temp);
            io_err(e)
        })
    }

    fn lock(&self, key: &str) -> Result<DocumentLock<'_>, StoreError> {
        let io_err = |source: std::io::Error| StoreError::Io {
            key: key.to_string(),
            source,
        };
        std::fs::create_dir_all(&self.dir).map_err(io_err)?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.lock_path_for(key))
            .map_err(io_err)?;
        FileExt::lock_exclusive(&file).map_err(io_err)?;
        Ok(DocumentLock::new(LockFile(file)))
    }
}

#[derive(Default)]
pub struct MemoryStore {
    docs: Mutex<HashMap<String, String>>,
    /// One lock for all keys; memory stores only ever hold the ledger.
    rmw: Mutex<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.docs.lock().get(key).cloned())
    }

    fn set(&self, key: &str, document: &str) -> Result<(), StoreError> {
        self.docs.lock().insert(key.to_string(), document.to_string());
        Ok(())
    }

    fn lock(&self, _key: &str) -> Result<DocumentLock<'_>, StoreError> {
        Ok(DocumentLock::new(self.rmw.lock()))
    }
}
