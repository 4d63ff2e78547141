//! Local persisted key-value store (the page's per-origin storage).

use crate::model::StoreError;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Key of the persisted model-marking toggle.
pub const MARKING_ENABLED_KEY: &str = "voucher_marker_enabled";

/// Key of the persisted subject identifier.
pub const SUBJECT_ID_KEY: &str = "subjectId";

/// String key-value storage shared by the engine's components.
pub trait KeyValueStore {
    /// Stored value for `key`.
    fn get(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove `key`. Removing a missing key succeeds.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// In-memory store; contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RefCell<BTreeMap<String, String>>,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `entries`.
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: RefCell::new(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.values
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.values.borrow_mut().remove(key);
        Ok(())
    }
}

/// Flat string map persisted as one JSON object.
///
/// Loaded on first access; every mutation rewrites the whole file. A missing
/// file reads as empty. An unreadable or corrupt file also reads as empty
/// (logged) so a damaged store never blocks the engine; the next write
/// replaces it.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: RefCell<Option<BTreeMap<String, String>>>,
}

impl JsonFileStore {
    /// Store backed by `path`. Nothing is read until first use.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            values: RefCell::new(None),
        }
    }

    /// Backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> BTreeMap<String, String> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to read store, starting empty");
                return BTreeMap::new();
            }
        };
        match serde_json::from_str(&contents) {
            Ok(values) => values,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Corrupt store, starting empty");
                BTreeMap::new()
            }
        }
    }

    fn with_values<R>(&self, f: impl FnOnce(&mut BTreeMap<String, String>) -> R) -> R {
        let mut slot = self.values.borrow_mut();
        let values = slot.get_or_insert_with(|| self.load());
        f(values)
    }

    /// Write `next` to disk, then make it the in-memory view. A failed write
    /// leaves the in-memory view untouched.
    fn commit(&self, next: BTreeMap<String, String>) -> Result<(), StoreError> {
        self.persist(&next)?;
        *self.values.borrow_mut() = Some(next);
        Ok(())
    }

    fn persist(&self, values: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let encoded = serde_json::to_string_pretty(values)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }
        fs::write(&self.path, encoded).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.with_values(|values| values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut next = self.with_values(|values| values.clone());
        next.insert(key.to_string(), value.to_string());
        self.commit(next)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut next = self.with_values(|values| values.clone());
        if next.remove(key).is_none() {
            return Ok(());
        }
        self.commit(next)
    }
}
