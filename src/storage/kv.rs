//! String key-value boundary.
//!
//! All domain objects are serialized through this interface. Implementations
//! must treat a missing key as `None`; callers treat malformed stored JSON
//! as an empty default, so the boundary itself never inspects values.

use super::StorageError;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Persistent string-keyed storage of serialized blobs.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// In-memory implementation for tests and passive read-only contexts.
#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a raw entry, bypassing the store. Test hook for malformed-data
    /// scenarios.
    pub fn seed(&self, key: &str, value: &str) {
        self.entries
            .write()
            .insert(key.to_string(), value.to_string());
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .write()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.entries.write().remove(key);
        Ok(())
    }
}

/// File-backed implementation holding the whole keyspace as one JSON object
/// (`key -> string`), the same dump format the browser-side tracker exports.
///
/// Writes go to a temporary file and are renamed into place so an
/// interrupted process never leaves a truncated dump behind.
#[derive(Debug)]
pub struct JsonFileKv {
    path: PathBuf,
    entries: RwLock<HashMap<String, String>>,
}

impl JsonFileKv {
    /// Open (or create) a dump file. A missing file starts empty; a
    /// malformed one is treated as empty with a warning, matching the
    /// fail-soft contract of the persistence layer.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<HashMap<String, String>>(&raw) {
                Ok(map) => map,
                Err(error) => {
                    warn!(
                        path = %path.display(),
                        %error,
                        "malformed storage dump; starting from an empty keyspace"
                    );
                    HashMap::new()
                }
            },
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(error) => {
                return Err(StorageError::Backend(format!(
                    "failed to read {}: {error}",
                    path.display()
                )))
            }
        };
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    fn persist(&self) -> Result<(), StorageError> {
        let serialized = {
            let entries = self.entries.read();
            serde_json::to_string_pretty(&*entries)?
        };
        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, serialized).map_err(|e| {
            StorageError::Backend(format!("failed to write {}: {e}", tmp_path.display()))
        })?;
        std::fs::rename(&tmp_path, &self.path).map_err(|e| {
            StorageError::Backend(format!("failed to replace {}: {e}", self.path.display()))
        })
    }
}

#[async_trait]
impl KeyValueStore for JsonFileKv {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .write()
            .insert(key.to_string(), value.to_string());
        self.persist()
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let removed = self.entries.write().remove(key).is_some();
        if removed {
            self.persist()?;
        }
        Ok(())
    }
}
