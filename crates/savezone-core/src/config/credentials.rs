//! Persistent per-storage credentials.
//!
//! Stored format: one JSON object mapping a storage key to its credential.
//! The value is either a bare bearer token or a serialized OAuth credential
//! blob, depending on the storage.

use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::error::{Result, SavezoneError};

/// Key-value store for storage credentials.
pub trait TokenStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;
}

/// JSON file token store, re-read on every access.
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str(&content)? {
            Value::Object(map) => Ok(map),
            _ => Err(SavezoneError::Config(format!(
                "token store {} is not a JSON object",
                self.path.display()
            ))),
        }
    }

    fn write(&self, map: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(map)?)?;
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(match self.read()?.remove(key) {
            Some(Value::String(s)) => Some(s),
            Some(Value::Null) | None => None,
            // Structured blobs are handed back serialized.
            Some(other) => Some(other.to_string()),
        })
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut map = self.read()?;
        map.insert(key.to_string(), Value::String(value.to_string()));
        self.write(&map)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut map = self.read()?;
        if map.remove(key).is_some() {
            self.write(&map)?;
        }
        Ok(())
    }
}
