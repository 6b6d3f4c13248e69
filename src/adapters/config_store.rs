//! File-backed configuration store
//!
//! Persists the bucket-sequence string (and nothing else of note) as
//! `key=value` lines in a single file. Writes go through a
//! read-modify-write cycle under a lock so concurrent stores cannot
//! interleave.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use parking_lot::Mutex;

use crate::domain::ConfigStore;
use crate::error::{Error, Result};

/// [`ConfigStore`] writing `key=value` lines to one file.
pub struct FileConfigStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileConfigStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    fn read_all(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        if let Ok(content) = fs::read_to_string(&self.path) {
            for line in content.lines() {
                if let Some((key, value)) = line.split_once('=') {
                    map.insert(key.trim().to_string(), value.trim().to_string());
                }
            }
        }
        map
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self, key: &str) -> Option<String> {
        let _guard = self.lock.lock();
        self.read_all().get(key).cloned()
    }

    fn store(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock.lock();
        let mut map = self.read_all();
        map.insert(key.to_string(), value.to_string());

        let mut content = String::new();
        for (k, v) in &map {
            content.push_str(k);
            content.push('=');
            content.push_str(v);
            content.push('\n');
        }
        fs::write(&self.path, content).map_err(|e| Error::ConfigStore(e.to_string()))
    }
}

/// In-memory [`ConfigStore`] for tests.
#[derive(Default)]
pub struct MemConfigStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(key: &str, value: &str) -> Self {
        let store = Self::default();
        store
            .values
            .lock()
            .insert(key.to_string(), value.to_string());
        store
    }
}

impl ConfigStore for MemConfigStore {
    fn load(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    fn store(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .lock()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
