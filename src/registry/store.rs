//! Grid stores
//!
//! Durable `get/put` of grid records by key, plus an exclusive write lock
//! bracketing a search session.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{GridError, Result};

/// Storage contract for grid records
pub trait GridStore: Send + Sync {
    /// Read a record, `None` when absent
    fn load(&self, key: &str) -> Result<Option<serde_json::Value>>;

    /// Create or replace a record
    fn save(&self, key: &str, record: &serde_json::Value) -> Result<()>;

    /// Delete a record. Returns whether it existed.
    fn remove(&self, key: &str) -> Result<bool>;

    /// Keys of all stored records
    fn keys(&self) -> Result<Vec<String>>;

    /// Take the exclusive write lock of `key` for `owner`.
    /// Re-acquiring a lock already held by the same owner succeeds.
    fn acquire(&self, key: &str, owner: &str) -> Result<()>;

    /// Release a lock held by `owner`
    fn release(&self, key: &str, owner: &str) -> Result<()>;
}

/// Write lock released on drop
pub struct GridLock {
    store: Arc<dyn GridStore>,
    key: String,
    owner: String,
    released: bool,
}

impl GridLock {
    pub fn acquire(store: Arc<dyn GridStore>, key: &str, owner: &str) -> Result<Self> {
        store.acquire(key, owner)?;
        tracing::debug!(grid = %key, owner = %owner, "Grid lock acquired");
        Ok(Self {
            store,
            key: key.to_string(),
            owner: owner.to_string(),
            released: false,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Release explicitly, reporting errors
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.store.release(&self.key, &self.owner)
    }
}

impl Drop for GridLock {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.store.release(&self.key, &self.owner) {
            tracing::warn!(grid = %self.key, error = %e, "Failed to release grid lock");
        }
    }
}

/// Process local store
#[derive(Debug, Default)]
pub struct InMemoryGridStore {
    records: RwLock<HashMap<String, serde_json::Value>>,
    locks: Mutex<HashMap<String, String>>,
}

impl InMemoryGridStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Current holder of the lock on `key`
    pub fn lock_owner(&self, key: &str) -> Option<String> {
        self.locks.lock().get(key).cloned()
    }
}

impl GridStore for InMemoryGridStore {
    fn load(&self, key: &str) -> Result<Option<serde_json::Value>> {
        Ok(self.records.read().get(key).cloned())
    }

    fn save(&self, key: &str, record: &serde_json::Value) -> Result<()> {
        self.records.write().insert(key.to_string(), record.clone());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.records.write().remove(key).is_some())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self.records.read().keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    fn acquire(&self, key: &str, owner: &str) -> Result<()> {
        let mut locks = self.locks.lock();
        match locks.get(key) {
            Some(holder) if holder != owner => Err(GridError::Locked {
                key: key.to_string(),
                owner: holder.clone(),
            }),
            _ => {
                locks.insert(key.to_string(), owner.to_string());
                Ok(())
            }
        }
    }

    fn release(&self, key: &str, owner: &str) -> Result<()> {
        let mut locks = self.locks.lock();
        match locks.get(key) {
            Some(holder) if holder == owner => {
                locks.remove(key);
                Ok(())
            }
            Some(holder) => Err(GridError::Locked {
                key: key.to_string(),
                owner: holder.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// One pretty printed JSON file per grid under a root directory.
///
/// Locks are `<key>.lock` files holding the owner id, created atomically.
/// Keys are used verbatim as file names and may only contain ASCII
/// letters, digits, `-`, `_` and `.`.
#[derive(Debug, Clone)]
pub struct FileGridStore {
    root: PathBuf,
}

impl FileGridStore {
    /// Create or open a store at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        if !root.exists() {
            fs::create_dir_all(&root).map_err(|e| {
                GridError::Registry(format!("Failed to create grid store: {}", e))
            })?;
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_stem(key: &str) -> Result<&str> {
        if key.is_empty() {
            return Err(GridError::Registry("Grid key cannot be empty".to_string()));
        }
        if let Some(c) = key
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        {
            return Err(GridError::Registry(format!(
                "Grid key '{}' cannot be stored as a file: unsupported character {:?}",
                key, c
            )));
        }
        Ok(key)
    }

    fn record_path(&self, key: &str) -> Result<PathBuf> {
        Ok(self.root.join(format!("{}.json", Self::file_stem(key)?)))
    }

    fn lock_path(&self, key: &str) -> Result<PathBuf> {
        Ok(self.root.join(format!("{}.lock", Self::file_stem(key)?)))
    }
}

impl GridStore for FileGridStore {
    fn load(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let path = self.record_path(key)?;
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let value = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            GridError::Serialization(format!("Failed to read grid {}: {}", key, e))
        })?;
        Ok(Some(value))
    }

    fn save(&self, key: &str, record: &serde_json::Value) -> Result<()> {
        let path = self.record_path(key)?;
        let tmp = path.with_extension("json.tmp");
        {
            let file = File::create(&tmp)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, record).map_err(|e| {
                GridError::Serialization(format!("Failed to write grid {}: {}", key, e))
            })?;
            writer.flush()?;
        }
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        match fs::remove_file(self.record_path(key)?) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                keys.push(stem.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn acquire(&self, key: &str, owner: &str) -> Result<()> {
        let path = self.lock_path(key)?;
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(owner.as_bytes())?;
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let holder = fs::read_to_string(&path)?;
                if holder == owner {
                    Ok(())
                } else {
                    Err(GridError::Locked {
                        key: key.to_string(),
                        owner: holder,
                    })
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    fn release(&self, key: &str, owner: &str) -> Result<()> {
        let path = self.lock_path(key)?;
        let holder = match fs::read_to_string(&path) {
            Ok(holder) => holder,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        if holder != owner {
            return Err(GridError::Locked {
                key: key.to_string(),
                owner: holder,
            });
        }
        fs::remove_file(&path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_in_memory_lock_contention() {
        let store = InMemoryGridStore::new();
        store.acquire("grid", "a").unwrap();
        store.acquire("grid", "a").unwrap();
        assert!(matches!(store.acquire("grid", "b"), Err(GridError::Locked { .. })));
        assert!(store.release("grid", "b").is_err());
        store.release("grid", "a").unwrap();
        store.acquire("grid", "b").unwrap();
        assert_eq!(store.lock_owner("grid").as_deref(), Some("b"));
    }

    #[test]
    fn test_lock_guard_releases_on_drop() {
        let store: Arc<dyn GridStore> = Arc::new(InMemoryGridStore::new());
        {
            let _lock = GridLock::acquire(Arc::clone(&store), "grid", "a").unwrap();
            assert!(store.acquire("grid", "b").is_err());
        }
        assert!(store.acquire("grid", "b").is_ok());
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileGridStore::open(dir.path().join("grids")).unwrap();
        assert!(store.load("g1").unwrap().is_none());

        store.save("g1", &json!({"models": [1, 2]})).unwrap();
        store.save("g_2", &json!({"models": []})).unwrap();
        assert_eq!(store.load("g1").unwrap(), Some(json!({"models": [1, 2]})));
        assert_eq!(store.keys().unwrap(), vec!["g1".to_string(), "g_2".to_string()]);

        assert!(store.remove("g1").unwrap());
        assert!(!store.remove("g1").unwrap());
    }

    #[test]
    fn test_file_store_rejects_unsafe_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileGridStore::open(dir.path()).unwrap();
        store.save("a_b", &json!({"grid": "a_b"})).unwrap();

        for key in ["a/b", "a b", "../a_b", ""] {
            assert!(
                matches!(store.save(key, &json!({})), Err(GridError::Registry(_))),
                "key {:?} should be rejected",
                key
            );
            assert!(store.load(key).is_err());
            assert!(store.acquire(key, "owner").is_err());
        }
        assert_eq!(store.load("a_b").unwrap(), Some(json!({"grid": "a_b"})));
        assert_eq!(store.keys().unwrap(), vec!["a_b".to_string()]);
    }

    #[test]
    fn test_file_store_locks() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileGridStore::open(dir.path()).unwrap();
        store.acquire("g1", "owner-a").unwrap();
        assert!(matches!(store.acquire("g1", "owner-b"), Err(GridError::Locked { .. })));
        store.release("g1", "owner-a").unwrap();
        store.acquire("g1", "owner-b").unwrap();
        assert!(store.keys().unwrap().is_empty());
    }
}
