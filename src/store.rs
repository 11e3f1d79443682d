use serde_json::Value;
use sha2::{Digest, Sha256};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Persistent key/value store behind the metadata cache.
///
/// Lives for the whole editor session, across validation passes.
pub trait MetadataStore {
    fn get(&self, key: &str) -> Option<Value>;
    fn update(&self, key: &str, value: Value);
    fn remove(&self, key: &str);
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RefCell<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.borrow().is_empty()
    }
}

impl MetadataStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.borrow().get(key).cloned()
    }

    fn update(&self, key: &str, value: Value) {
        self.values.borrow_mut().insert(key.to_string(), value);
    }

    fn remove(&self, key: &str) {
        self.values.borrow_mut().remove(key);
    }
}

/// One JSON file per key under a cache directory.
pub struct FileStore {
    cache_dir: PathBuf,
}

impl FileStore {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        let cache_dir = cache_dir.into();
        if !cache_dir.exists() {
            if let Err(e) = fs::create_dir_all(&cache_dir) {
                tracing::warn!(dir = %cache_dir.display(), error = %e, "cannot create metadata cache dir");
            }
        }
        Self { cache_dir }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        // Graph names contain dots and plus signs; hash them into a stable file name.
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        self.cache_dir.join(format!("{:x}.json", hasher.finalize()))
    }
}

impl MetadataStore for FileStore {
    fn get(&self, key: &str) -> Option<Value> {
        let path = self.entry_path(key);
        let data = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&data) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "corrupt metadata cache entry, discarding");
                fs::remove_file(path).ok();
                None
            }
        }
    }

    fn update(&self, key: &str, value: Value) {
        let path = self.entry_path(key);
        match serde_json::to_string(&value) {
            Ok(data) => {
                if let Err(e) = fs::write(&path, data) {
                    tracing::warn!(key, error = %e, "failed to persist metadata cache entry");
                }
            }
            Err(e) => tracing::warn!(key, error = %e, "failed to serialize metadata cache entry"),
        }
    }

    fn remove(&self, key: &str) {
        fs::remove_file(self.entry_path(key)).ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        assert!(store.get("graphs").is_none());
        store.update("graphs", json!([{ "name": "X" }]));
        assert_eq!(store.get("graphs"), Some(json!([{ "name": "X" }])));
        store.remove("graphs");
        assert!(store.is_empty());
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("cache"));
        store.update("structure:PX.Objects.SO.SOOrderEntry", json!({ "views": {} }));

        let reopened = FileStore::new(dir.path().join("cache"));
        assert_eq!(
            reopened.get("structure:PX.Objects.SO.SOOrderEntry"),
            Some(json!({ "views": {} }))
        );
        assert!(reopened.get("structure:other").is_none());
    }

    #[test]
    fn test_file_store_discards_corrupt_entry() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let path = store.entry_path("features");
        fs::write(&path, "{ not json").unwrap();
        assert!(store.get("features").is_none());
        assert!(!path.exists());
    }
}
