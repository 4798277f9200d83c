//! Durable name -> values mapping.
//!
//! The mapping file is the authoritative, hand-editable table consumed by
//! downstream CSV processing. It is a pretty-printed JSON object with sorted
//! keys; single-value entries are written as plain strings and multi-value
//! entries as arrays, so both
//!
//! ```json
//! { "Las Vegas": "Nevada" }
//! ```
//!
//! and
//!
//! ```json
//! { "Coldplay": ["pop", "rock"] }
//! ```
//!
//! load unchanged. Saves replace the file atomically.
//!
//! Several stores may share one file. A save holds an exclusive lock on a
//! sibling `.<name>.lock` file, re-reads the mapping and writes back only the
//! keys this store changed, so another writer's saved entries survive.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::enrichment::domain::EntityName;
use crate::records::Record;

/// Errors loading or saving the mapping file
#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    #[error("Mapping file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid mapping file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize mapping: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// On-disk form of one entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum StoredValue {
    One(String),
    Many(Vec<String>),
}

impl From<StoredValue> for Vec<String> {
    fn from(value: StoredValue) -> Self {
        match value {
            StoredValue::One(v) => vec![v],
            StoredValue::Many(vs) => vs,
        }
    }
}

impl From<&[String]> for StoredValue {
    fn from(values: &[String]) -> Self {
        match values {
            [single] => StoredValue::One(single.clone()),
            many => StoredValue::Many(many.to_vec()),
        }
    }
}

/// Trim, drop blanks and duplicates, keep order
fn clean(values: &[String]) -> Vec<String> {
    let mut cleaned: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        let value = value.trim();
        if !value.is_empty() && !cleaned.iter().any(|v| v == value) {
            cleaned.push(value.to_string());
        }
    }
    cleaned
}

/// Read and clean the mapping at `path`; `None` when there is no file.
fn read_entries(path: &Path) -> Result<Option<BTreeMap<String, Vec<String>>>, MappingError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(MappingError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let raw: BTreeMap<String, StoredValue> = if contents.trim().is_empty() {
        BTreeMap::new()
    } else {
        serde_json::from_str(&contents).map_err(|source| MappingError::Parse {
            path: path.to_path_buf(),
            source,
        })?
    };

    let mut entries = BTreeMap::new();
    for (name, value) in raw {
        let values = clean(&Vec::from(value));
        if values.is_empty() {
            tracing::warn!("Ignoring empty mapping entry for '{}'", name);
            continue;
        }
        entries.insert(name, values);
    }
    Ok(Some(entries))
}

/// The mapping table plus the file it belongs to
#[derive(Debug, Clone)]
pub struct MappingStore {
    path: PathBuf,
    entries: BTreeMap<String, Vec<String>>,
    /// Keys merged since load or the last save
    pending: BTreeSet<String>,
}

impl MappingStore {
    /// Empty store that will save to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: BTreeMap::new(),
            pending: BTreeSet::new(),
        }
    }

    /// Load the mapping at `path`; a missing file is an empty mapping.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, MappingError> {
        let path = path.into();

        let Some(entries) = read_entries(&path)? else {
            tracing::warn!("No mapping file at {:?}, starting empty", path);
            return Ok(Self::new(path));
        };

        tracing::info!("Loaded {} mapping entries from {:?}", entries.len(), path);
        Ok(Self {
            path,
            entries,
            pending: BTreeSet::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Unsaved changes since load or the last save
    pub fn is_dirty(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Candidates without an entry, deduplicated, in first-appearance order.
    pub fn unmapped<'a, I>(&self, candidates: I) -> Vec<EntityName>
    where
        I: IntoIterator<Item = &'a EntityName>,
    {
        let mut seen = HashSet::new();
        candidates
            .into_iter()
            .filter(|c| !self.contains(c.as_str()))
            .filter(|c| seen.insert(c.as_str().to_string()))
            .cloned()
            .collect()
    }

    /// Insert or replace the entry for `name`. Returns whether anything changed.
    ///
    /// Empty `values` are ignored: an entry always has at least one value.
    pub fn merge(&mut self, name: &EntityName, values: &[String]) -> bool {
        let values = clean(values);
        if values.is_empty() {
            return false;
        }
        if self.entries.get(name.as_str()) == Some(&values) {
            return false;
        }

        self.entries.insert(name.as_str().to_string(), values);
        self.pending.insert(name.as_str().to_string());
        true
    }

    /// Mapped values for the record's `key_field`, if any.
    pub fn apply(&self, record: &Record, key_field: &str) -> Option<&[String]> {
        record.get(key_field).and_then(|key| self.get(key))
    }

    /// Write the mapping to its file atomically.
    ///
    /// Under the file lock, entries saved by other stores since this one was
    /// loaded are picked up and only this store's pending keys overwrite
    /// them. The result is written to a sibling temp file, fsynced and
    /// renamed over the target, so readers see either the old or the new file.
    pub fn save(&mut self) -> Result<(), MappingError> {
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source: std::io::Error| MappingError::Io { path, source }
        };

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(io_err(dir))?;
        }

        let lock_path = self.sibling_path("lock");
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(io_err(&lock_path))?;
        let mut lock = fd_lock::RwLock::new(lock_file);
        let _guard = lock.write().map_err(io_err(&lock_path))?;

        let mut merged = read_entries(&self.path)?.unwrap_or_default();
        for key in &self.pending {
            if let Some(values) = self.entries.get(key) {
                merged.insert(key.clone(), values.clone());
            }
        }

        let stored: BTreeMap<&str, StoredValue> = merged
            .iter()
            .map(|(k, v)| (k.as_str(), StoredValue::from(v.as_slice())))
            .collect();
        let mut contents = serde_json::to_string_pretty(&stored)?;
        contents.push('\n');

        let temp_path = self.sibling_path(&format!("{}.tmp", std::process::id()));
        let write = || -> std::io::Result<()> {
            let mut file = File::create(&temp_path)?;
            file.write_all(contents.as_bytes())?;
            file.sync_all()
        };
        if let Err(source) = write() {
            let _ = std::fs::remove_file(&temp_path);
            return Err(MappingError::Io {
                path: temp_path,
                source,
            });
        }

        std::fs::rename(&temp_path, &self.path).map_err(io_err(&self.path))?;

        self.entries = merged;
        self.pending.clear();
        tracing::debug!("Saved {} mapping entries to {:?}", self.entries.len(), self.path);
        Ok(())
    }

    /// `merge` then `save` if anything changed.
    pub fn merge_and_save(&mut self, name: &EntityName, values: &[String]) -> Result<bool, MappingError> {
        let changed = self.merge(name, values);
        if changed {
            self.save()?;
        }
        Ok(changed)
    }

    /// Hidden file next to the mapping: `.<file name>.<suffix>`
    fn sibling_path(&self, suffix: &str) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "mapping.json".to_string());
        self.path
            .with_file_name(format!(".{}.{}", file_name, suffix))
    }
}


/// Property-based tests using proptest
#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// unmapped never returns a mapped name or the same name twice
        #[test]
        fn unmapped_is_disjoint_and_unique(
            mapped in proptest::collection::vec("[a-e]", 0..5),
            candidates in proptest::collection::vec("[a-h]", 0..20),
        ) {
            let mut store = MappingStore::new("unused.json");
            for m in &mapped {
                store.merge(&EntityName::new(m.as_str()).unwrap(), &[m.to_uppercase()]);
            }
            let candidates: Vec<EntityName> = candidates
                .iter()
                .map(|c| EntityName::new(c.as_str()).unwrap())
                .collect();

            let unmapped = store.unmapped(&candidates);

            for (i, name) in unmapped.iter().enumerate() {
                prop_assert!(!store.contains(name.as_str()));
                prop_assert!(!unmapped[i + 1..].contains(name));
            }
            for c in &candidates {
                prop_assert!(store.contains(c.as_str()) || unmapped.contains(c));
            }
        }

        /// Merging the same entry twice is the same as merging it once
        #[test]
        fn merge_twice_equals_once(key in "[a-z]{1,8}", values in proptest::collection::vec("[a-z]{1,5}", 1..4)) {
            let key = EntityName::new(key).unwrap();
            let mut once = MappingStore::new("unused.json");
            once.merge(&key, &values);
            let mut twice = once.clone();
            prop_assert!(!twice.merge(&key, &values));
            prop_assert_eq!(once.get(key.as_str()), twice.get(key.as_str()));
        }
    }
}
