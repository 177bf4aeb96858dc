//! Key-value persistence backends.
//!
//! Persistence is best-effort. A read that fails for any reason looks like a
//! missing key; a write that fails returns `false` and is logged. Nothing here
//! can fail the caller, so a read-only disk or a full quota degrades to
//! in-memory behavior.
//!
//! ## Storage
//!
//! [`FileStore`] keeps one JSON file per key inside a directory:
//!
//! ```text
//! .headshot-studio/
//! ├── headshot-studio.settings.v1.json
//! └── headshot-studio.profiles.v1.json
//! ```
//!
//! Writes go to a temporary sibling first and are renamed into place, so a
//! crash mid-write leaves the previous value intact.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Read/write a named blob of text.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    /// Returns false if the value could not be stored.
    fn set(&mut self, key: &str, value: &str) -> bool;
}

/// Directory-backed store.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.path_for(key)).ok()
    }

    fn set(&mut self, key: &str, value: &str) -> bool {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        let result = fs::create_dir_all(&self.dir)
            .and_then(|_| fs::write(&tmp, value))
            .and_then(|_| fs::rename(&tmp, &path));
        match result {
            Ok(()) => true,
            Err(err) => {
                warn!(key, path = %path.display(), error = %err, "failed to persist value");
                let _ = fs::remove_file(&tmp);
                false
            }
        }
    }
}

/// In-memory store. Can be told to refuse writes, for exercising the
/// degraded path.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
    read_only: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read_only() -> Self {
        Self {
            values: HashMap::new(),
            read_only: true,
        }
    }

    /// Seed a value, bypassing the read-only flag.
    pub fn with_value(mut self, key: &str, value: &str) -> Self {
        self.values.insert(key.to_string(), value.to_string());
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> bool {
        if self.read_only {
            warn!(key, "store is read-only, value not persisted");
            return false;
        }
        self.values.insert(key.to_string(), value.to_string());
        true
    }
}
