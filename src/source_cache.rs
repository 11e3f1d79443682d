use sha2::{Digest, Sha256};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::SystemTime;

use crate::error::{EngineError, EngineResult};
use crate::module_resolver::normalize_path;
use crate::source_module::{parse_source_module, SourceModule};

/// What a cached parse was computed from.
#[derive(Debug, Clone, PartialEq, Eq)]
enum CacheStamp {
    Modified(SystemTime),
    Content(String),
}

struct CacheEntry {
    stamp: CacheStamp,
    module: Rc<SourceModule>,
}

/// Per-file parse cache keyed by normalized path.
///
/// Files read from disk are revalidated by modification time; in-memory text (an unsaved editor
/// buffer) by a SHA-256 of its content.
#[derive(Default)]
pub struct SourceCache {
    entries: RefCell<HashMap<PathBuf, CacheEntry>>,
}

impl SourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compute_hash(source: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Parse the file at `path`, reusing the cached module while its mtime is unchanged.
    pub fn load(&self, path: &Path) -> EngineResult<Rc<SourceModule>> {
        let key = normalize_path(path);
        let modified = fs::metadata(&key)
            .and_then(|m| m.modified())
            .map_err(|e| EngineError::io(&key, e))?;
        let stamp = CacheStamp::Modified(modified);

        if let Some(module) = self.lookup(&key, &stamp) {
            return Ok(module);
        }

        let source = fs::read_to_string(&key).map_err(|e| EngineError::io(&key, e))?;
        self.parse_and_store(key, stamp, &source)
    }

    /// Parse in-memory `text` for `path`, reusing the cached module while the text is unchanged.
    pub fn load_text(&self, path: &Path, text: &str) -> EngineResult<Rc<SourceModule>> {
        let key = normalize_path(path);
        let stamp = CacheStamp::Content(Self::compute_hash(text));

        if let Some(module) = self.lookup(&key, &stamp) {
            return Ok(module);
        }
        self.parse_and_store(key, stamp, text)
    }

    pub fn invalidate(&self, path: &Path) {
        self.entries.borrow_mut().remove(&normalize_path(path));
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    fn lookup(&self, key: &Path, stamp: &CacheStamp) -> Option<Rc<SourceModule>> {
        let entries = self.entries.borrow();
        let entry = entries.get(key)?;
        if &entry.stamp == stamp {
            tracing::trace!(path = %key.display(), "source cache hit");
            Some(Rc::clone(&entry.module))
        } else {
            None
        }
    }

    fn parse_and_store(
        &self,
        key: PathBuf,
        stamp: CacheStamp,
        source: &str,
    ) -> EngineResult<Rc<SourceModule>> {
        let module = parse_source_module(source)
            .map(Rc::new)
            .map_err(|message| EngineError::parse(&key, message))?;
        self.entries.borrow_mut().insert(
            key,
            CacheEntry {
                stamp,
                module: Rc::clone(&module),
            },
        );
        Ok(module)
    }
}
