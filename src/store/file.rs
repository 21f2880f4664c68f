// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Key-value store persisted as a single JSON object on disk.

use super::KeyValueStore;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// JSON-file backed key-value store.
///
/// Every read goes to disk and every mutation is a read-modify-write of the
/// whole map (temp file + rename, so a crash never leaves a torn file).
/// Several stores opened on the same path therefore see each other's writes.
#[derive(Debug)]
pub struct FileKvStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this handle
    lock: Mutex<()>,
}

impl FileKvStore {
    /// Open the store at `path`, creating parent directories as needed.
    ///
    /// A missing file is an empty store. A corrupt file is logged and
    /// replaced on the next write.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let store = Self {
            path,
            lock: Mutex::new(()),
        };
        let keys = store.load()?.len();
        tracing::debug!(path = %store.path.display(), keys, "Opened storage file");

        Ok(store)
    }

    fn load(&self) -> io::Result<BTreeMap<String, String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(serde_json::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!(path = %self.path.display(), error = %e, "Ignoring corrupt storage file");
                BTreeMap::new()
            })),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e),
        }
    }

    fn load_or_empty(&self) -> BTreeMap<String, String> {
        self.load().unwrap_or_else(|e| {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to read storage file");
            BTreeMap::new()
        })
    }

    /// Apply `f` to the current on-disk map and write it back if it changed.
    fn update(&self, f: impl FnOnce(&mut BTreeMap<String, String>) -> bool) {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut entries = match self.load() {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to read storage file, write skipped");
                return;
            }
        };
        if !f(&mut entries) {
            return;
        }
        if let Err(e) = self.write_atomic(&entries) {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to persist storage file");
        }
    }

    fn write_atomic(&self, entries: &BTreeMap<String, String>) -> io::Result<()> {
        let json = serde_json::to_vec_pretty(entries)?;
        let tmp = self
            .path
            .with_extension(format!("tmp.{}", std::process::id()));
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)
    }
}

impl KeyValueStore for FileKvStore {
    fn get(&self, key: &str) -> Option<String> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        self.load_or_empty().remove(key)
    }

    fn set(&self, key: &str, value: &str) {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string()).as_deref() != Some(value)
        });
    }

    fn remove(&self, key: &str) {
        self.update(|entries| entries.remove(key).is_some());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("storage.json");

        let store = FileKvStore::open(&path).unwrap();
        store.set("login_attempts", "3");
        store.set("other", "x");
        store.remove("other");
        drop(store);

        let reopened = FileKvStore::open(&path).unwrap();
        assert_eq!(reopened.get("login_attempts").as_deref(), Some("3"));
        assert_eq!(reopened.get("other"), None);
    }

    #[test]
    fn test_corrupt_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        std::fs::write(&path, "not json").unwrap();

        let store = FileKvStore::open(&path).unwrap();
        assert_eq!(store.get("anything"), None);

        store.set("k", "v");
        let reopened = FileKvStore::open(&path).unwrap();
        assert_eq!(reopened.get("k").as_deref(), Some("v"));
    }

    #[test]
    fn test_handles_on_same_file_see_each_other() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        let first = FileKvStore::open(&path).unwrap();
        let second = FileKvStore::open(&path).unwrap();

        first.set("a", "1");
        assert_eq!(second.get("a").as_deref(), Some("1"));

        second.set("b", "2");
        assert_eq!(first.get("a").as_deref(), Some("1"));
        assert_eq!(first.get("b").as_deref(), Some("2"));

        first.remove("a");
        assert_eq!(second.get("a"), None);
        assert_eq!(second.get("b").as_deref(), Some("2"));
    }
}
