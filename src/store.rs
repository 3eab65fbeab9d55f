//! Key/value persistence for application state.
//!
//! [`PersistedValue`] loads once from its slot on creation and writes the
//! encoded value back to the same slot after every change.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::error::StorageError;

/// A durable string slot per key.
pub trait StorageBackend: Send {
  fn read(&self, key: &str) -> Result<Option<String>, StorageError>;
  fn write(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// One `<key>.json` file per slot inside a directory.
#[derive(Debug)]
pub struct FileStorage {
  dir: PathBuf,
}

impl FileStorage {
  pub fn new(dir: PathBuf) -> Result<Self, StorageError> {
    std::fs::create_dir_all(&dir)?;
    Ok(Self { dir })
  }

  /// Slot names map one-to-one onto file names, so only keys that are already
  /// safe file stems are accepted.
  fn slot_path(&self, key: &str) -> Result<PathBuf, StorageError> {
    if !is_valid_key(key) {
      return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(self.dir.join(format!("{}.json", key)))
  }
}

/// Non-empty and made of ASCII letters, digits, `-` and `_`.
pub fn is_valid_key(key: &str) -> bool {
  !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

impl StorageBackend for FileStorage {
  fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
    match std::fs::read_to_string(self.slot_path(key)?) {
      Ok(content) => Ok(Some(content)),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
      Err(e) => Err(e.into()),
    }
  }

  /// Write-to-temp then rename, so a crash mid-write leaves the old value intact.
  fn write(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
    let path = self.slot_path(key)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, value)?;
    std::fs::rename(&tmp, &path)?;
    Ok(())
  }
}

/// Volatile backend, used when no data directory is available and in tests.
#[derive(Debug, Default)]
pub struct MemoryStorage {
  slots: HashMap<String, String>,
}

impl StorageBackend for MemoryStorage {
  fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
    Ok(self.slots.get(key).cloned())
  }

  fn write(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
    self.slots.insert(key.to_string(), value.to_string());
    Ok(())
  }
}

/// A value mirrored to a storage slot.
pub struct PersistedValue<T> {
  key: String,
  value: T,
  backend: Box<dyn StorageBackend>,
}

impl<T: Serialize + DeserializeOwned> PersistedValue<T> {
  /// Load `key` from `backend`, or fall back to `initial` when the slot is empty,
  /// unreadable or holds data that no longer decodes.
  pub fn load(backend: Box<dyn StorageBackend>, key: &str, initial: T) -> Self {
    let value = match backend.read(key) {
      Ok(Some(raw)) => match decode(key, &raw) {
        Ok(value) => {
          debug!(key, "restored persisted value");
          value
        }
        Err(err) => {
          warn!(err = %err, "falling back to initial value");
          initial
        }
      },
      Ok(None) => {
        debug!(key, "no persisted value, using initial");
        initial
      }
      Err(err) => {
        warn!(key, err = %err, "persisted value unreadable, using initial");
        initial
      }
    };
    Self { key: key.to_string(), value, backend }
  }

  pub fn get(&self) -> &T {
    &self.value
  }

  pub fn key(&self) -> &str {
    &self.key
  }

  /// Mutate the value and write it back under the same key.
  pub fn update(&mut self, f: impl FnOnce(&mut T)) -> Result<(), StorageError> {
    f(&mut self.value);
    self.save()
  }

  pub fn set(&mut self, value: T) -> Result<(), StorageError> {
    self.update(|v| *v = value)
  }

  fn save(&mut self) -> Result<(), StorageError> {
    let encoded = serde_json::to_string(&self.value).map_err(StorageError::Encode)?;
    self.backend.write(&self.key, &encoded)?;
    info!(key = %self.key, bytes = encoded.len(), "persisted value saved");
    Ok(())
  }
}

fn decode<T: DeserializeOwned>(key: &str, raw: &str) -> Result<T, StorageError> {
  serde_json::from_str(raw).map_err(|source| StorageError::Decode { key: key.to_string(), source })
}
