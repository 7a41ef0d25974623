//! Key-value blob storage for local persistence.
//!
//! Every local store in PikaWorld persists itself as one serialized string
//! per key. This module provides the storage seam and two backends:
//!
//! - [`FileStore`]: one file per key in a data directory (`<key>.json`).
//! - [`MemoryStore`]: an in-process map with an optional byte quota.
//!
//! Storage layout for [`FileStore`]:
//! ```text
//! ~/.local/share/pikaworld/
//! ├── pikaworld_calendar_data.json
//! ├── pikaworld_calendar_backup.json
//! ├── pikaworld_workspaces.json
//! └── pikaworld_current_workspace.json   # bare id string
//! ```

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::Serialize;
use thiserror::Error;

/// File extension for stored blobs.
const BLOB_EXTENSION: &str = "json";

/// Assumed capacity of the local store, used for usage reporting only.
pub const DEFAULT_CAPACITY_BYTES: u64 = 5 * 1024 * 1024;

/// Errors that can occur while reading or writing local storage.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error for {}: {}", .0.display(), .1)]
    Io(PathBuf, #[source] io::Error),

    #[error("Storage quota exceeded: writing {key} needs {needed} bytes, {capacity} allowed")]
    QuotaExceeded {
        key: String,
        needed: u64,
        capacity: u64,
    },

    #[error("Failed to serialize {0}: {1}")]
    Serialize(String, #[source] serde_json::Error),
}

/// A string-keyed store of serialized blobs.
///
/// Writes are all-or-nothing per key: after a failed `set`, `get` returns
/// the previous value.
pub trait KeyValueStore: Send + Sync {
    /// Returns the blob stored under `key`, or `None` if absent.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Stores `value` under `key`, replacing any previous blob.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removes `key`. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for std::sync::Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key)
    }
}

/// File-backed storage: each key is a file in the data directory.
#[derive(Clone, Debug)]
pub struct FileStore {
    data_dir: PathBuf,
}

impl FileStore {
    /// Creates a new store rooted at `data_dir`.
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    /// Returns the data directory path.
    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    /// Returns the full path for a key.
    pub fn path(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{}.{}", key, BLOB_EXTENSION))
    }

    /// Checks if a blob exists on disk.
    pub fn exists(&self, key: &str) -> bool {
        self.path(key).exists()
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path(key);

        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(path, e)),
        }
    }

    /// Writes to a sibling temp file and renames it over the target, so a
    /// failed write never leaves a truncated blob behind.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.data_dir)
            .map_err(|e| StorageError::Io(self.data_dir.clone(), e))?;

        let path = self.path(key);
        let tmp_path = self.data_dir.join(format!(".{}.{}.tmp", key, BLOB_EXTENSION));

        fs::write(&tmp_path, value).map_err(|e| StorageError::Io(tmp_path.clone(), e))?;
        if let Err(e) = fs::rename(&tmp_path, &path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(StorageError::Io(path, e));
        }

        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path(key);

        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(path, e)),
        }
    }
}

/// In-memory storage with an optional total byte quota.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    capacity: Option<u64>,
}

impl MemoryStore {
    /// Creates an unbounded in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that rejects writes once the sum of all stored
    /// values would exceed `capacity` bytes.
    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity: Some(capacity),
        }
    }

    /// Returns the number of stored keys.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // A poisoned map is still structurally valid.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.lock();

        if let Some(capacity) = self.capacity {
            let others: u64 = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(_, v)| v.len() as u64)
                .sum();
            let needed = others + value.len() as u64;
            if needed > capacity {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                    needed,
                    capacity,
                });
            }
        }

        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.lock().remove(key);
        Ok(())
    }
}

/// Storage usage report for a serialized aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StorageInfo {
    /// Serialized size in bytes.
    pub used: u64,
    /// Bytes left before the assumed capacity.
    pub available: u64,
    /// Percentage of capacity used, rounded to two decimals.
    pub percentage: f64,
}

impl StorageInfo {
    /// Measures `used` bytes against `capacity`.
    pub fn measure(used: u64, capacity: u64) -> Self {
        let percentage = if capacity == 0 {
            100.0
        } else {
            let raw = used as f64 / capacity as f64 * 100.0;
            (raw * 100.0).round() / 100.0
        };

        Self {
            used,
            available: capacity.saturating_sub(used),
            percentage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_storage() -> (FileStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStore::new(temp_dir.path().to_path_buf());
        (storage, temp_dir)
    }

    #[test]
    fn test_storage_path() {
        let (storage, _temp) = test_storage();
        let path = storage.path("pikaworld_workspaces");
        assert!(path.ends_with("pikaworld_workspaces.json"));
    }

    #[test]
    fn test_get_nonexistent_returns_none() {
        let (storage, _temp) = test_storage();
        assert!(storage.get("missing").unwrap().is_none());
    }

    #[test]
    fn test_set_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let nested_dir = temp_dir.path().join("nested").join("data");
        let storage = FileStore::new(nested_dir.clone());

        storage.set("key", "{}").unwrap();

        assert!(nested_dir.exists());
        assert!(storage.exists("key"));
    }

    #[test]
    fn test_overwrite_and_remove() {
        let (storage, _temp) = test_storage();

        storage.set("key", "one").unwrap();
        storage.set("key", "two").unwrap();
        assert_eq!(storage.get("key").unwrap().as_deref(), Some("two"));

        storage.remove("key").unwrap();
        assert!(storage.get("key").unwrap().is_none());

        // Removing again is fine
        storage.remove("key").unwrap();
    }

    #[test]
    fn test_no_temp_file_left_behind() {
        let (storage, temp) = test_storage();
        storage.set("key", "value").unwrap();

        let names: Vec<String> = fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["key.json".to_string()]);
    }

    #[test]
    fn test_memory_store_quota() {
        let store = MemoryStore::with_capacity(10);

        store.set("a", "12345").unwrap();
        let err = store.set("b", "123456").unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { .. }));
        assert!(store.get("b").unwrap().is_none());

        // Replacing a key only counts the new value
        store.set("a", "1234567890").unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_storage_info_rounding() {
        let info = StorageInfo::measure(1, 3);
        assert_eq!(info.used, 1);
        assert_eq!(info.available, 2);
        assert_eq!(info.percentage, 33.33);

        let over = StorageInfo::measure(20, 10);
        assert_eq!(over.available, 0);
        assert_eq!(over.percentage, 200.0);
    }
}
