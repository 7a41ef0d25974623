//! Server-side JSON state files.
//!
//! Each server store keeps its whole state in one JSON file:
//! ```text
//! <DATA_DIR>/
//!   accounts.json     # users, credentials, sessions
//!   documents.json    # collection -> id -> document
//! ```
//!
//! Files are replaced atomically (temp file + rename).

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::PathBuf;

/// Errors that can occur during server storage operations.
#[derive(Debug)]
pub enum ServerStorageError {
    /// I/O error reading or writing a file.
    IoError(PathBuf, io::Error),
    /// A state file exists but is not valid JSON for its type.
    ParseError(PathBuf, serde_json::Error),
    /// Invalid name (e.g., contains path separators).
    InvalidName(String),
}

impl std::fmt::Display for ServerStorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerStorageError::IoError(path, e) => {
                write!(f, "I/O error for {}: {}", path.display(), e)
            }
            ServerStorageError::ParseError(path, e) => {
                write!(f, "Failed to parse {}: {}", path.display(), e)
            }
            ServerStorageError::InvalidName(name) => {
                write!(f, "Invalid name: {}", name)
            }
        }
    }
}

impl std::error::Error for ServerStorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerStorageError::IoError(_, e) => Some(e),
            ServerStorageError::ParseError(_, e) => Some(e),
            _ => None,
        }
    }
}

/// Directory of JSON state files.
#[derive(Debug, Clone)]
pub struct ServerStorage {
    data_dir: PathBuf,
}

impl ServerStorage {
    /// Creates a new server storage instance.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Returns the data directory path.
    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    /// Validates a file, collection, or document name.
    ///
    /// Names may contain ASCII letters, digits, `-` and `_` only.
    pub fn validate_name(name: &str) -> Result<(), ServerStorageError> {
        let valid = !name.is_empty()
            && name.len() <= 128
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(ServerStorageError::InvalidName(name.to_string()));
        }
        Ok(())
    }

    fn path(&self, name: &str) -> PathBuf {
        self.data_dir.join(format!("{}.json", name))
    }

    /// Loads a state file, or the default value if it does not exist yet.
    pub fn load<T: DeserializeOwned + Default>(&self, name: &str) -> Result<T, ServerStorageError> {
        Self::validate_name(name)?;
        let path = self.path(name);

        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(T::default()),
            Err(e) => return Err(ServerStorageError::IoError(path, e)),
        };

        serde_json::from_str(&contents).map_err(|e| ServerStorageError::ParseError(path, e))
    }

    /// Saves a state file atomically.
    pub fn save<T: Serialize>(&self, name: &str, value: &T) -> Result<(), ServerStorageError> {
        Self::validate_name(name)?;

        fs::create_dir_all(&self.data_dir)
            .map_err(|e| ServerStorageError::IoError(self.data_dir.clone(), e))?;

        let path = self.path(name);
        let tmp_path = self.data_dir.join(format!(".{}.json.tmp", name));

        let contents = serde_json::to_string_pretty(value)
            .map_err(|e| ServerStorageError::ParseError(path.clone(), e))?;
        fs::write(&tmp_path, contents)
            .map_err(|e| ServerStorageError::IoError(tmp_path.clone(), e))?;
        fs::rename(&tmp_path, &path).map_err(|e| ServerStorageError::IoError(path, e))
    }
}
