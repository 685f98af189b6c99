use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use tracing::{debug, warn};

use crate::models::Record;
use crate::normalize;

/// Key-value persistence for collection snapshots.
pub trait CacheStore: Send + Sync + 'static {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Stores each key as `<dir>/<key>.json`.
pub struct FileCacheStore {
    dir: PathBuf,
}

impl FileCacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{file_name}.json"))
    }
}

impl CacheStore for FileCacheStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("failed to read cache key {key}")),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir).with_context(|| {
            format!("failed to create cache directory {}", self.dir.display())
        })?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value).with_context(|| format!("failed to write cache key {key}"))?;
        fs::rename(&tmp, &path).with_context(|| format!("failed to commit cache key {key}"))?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let guard = self
            .entries
            .lock()
            .map_err(|_| anyhow!("cache lock poisoned"))?;
        Ok(guard.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|_| anyhow!("cache lock poisoned"))?;
        guard.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Typed access to collection snapshots. Reads never fail and writes never
/// propagate errors: in-memory state stays authoritative for the session.
#[derive(Clone)]
pub struct LocalCache {
    store: Arc<dyn CacheStore>,
}

impl LocalCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    pub fn read<T: Record>(&self) -> Vec<T> {
        let key = T::COLLECTION.cache_key();
        let raw = match self.store.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(err) => {
                warn!(%key, error = %err, "failed to read local cache");
                return Vec::new();
            }
        };

        match serde_json::from_str::<Value>(&raw) {
            Ok(value) => normalize::collection(&value),
            Err(err) => {
                debug!(%key, error = %err, "local cache entry is not valid JSON");
                Vec::new()
            }
        }
    }

    /// Returns whether a snapshot was stored. Empty collections are skipped
    /// so an emptied view does not erase the previous snapshot.
    pub fn write<T: Record>(&self, records: &[T]) -> bool {
        if records.is_empty() {
            return false;
        }

        let key = T::COLLECTION.cache_key();
        let serialized = match serde_json::to_string(records) {
            Ok(serialized) => serialized,
            Err(err) => {
                warn!(%key, error = %err, "failed to serialize collection for local cache");
                return false;
            }
        };

        match self.store.set(key, &serialized) {
            Ok(()) => true,
            Err(err) => {
                warn!(%key, error = %err, "failed to persist collection to local cache");
                false
            }
        }
    }
}
