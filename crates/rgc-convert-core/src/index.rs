//! Key-grouped registry of parsed charts

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// One successfully parsed chart
#[derive(Debug)]
pub struct ParseEntry<T> {
    pub data: T,
    /// Virtual path the chart was parsed from
    pub original_path: String,
}

#[derive(Debug)]
struct IndexState<T> {
    entries: Vec<Arc<ParseEntry<T>>>,
    by_key: HashMap<String, Vec<Arc<ParseEntry<T>>>>,
    /// Keys in first-insertion order
    keys: Vec<String>,
}

impl<T> Default for IndexState<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            by_key: HashMap::new(),
            keys: Vec::new(),
        }
    }
}

/// Append-only index of parsed entries, grouped by mapset key.
///
/// Every mutation holds the write lock for its whole duration, so readers
/// never observe an entry in `entries` that is missing from its key group
/// or a half-cleared index. Entries of one key appear in `entries_for` in
/// the same relative order as in `entries`.
#[derive(Debug)]
pub struct ParseIndex<T> {
    root: String,
    state: RwLock<IndexState<T>>,
}

impl<T> ParseIndex<T> {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            state: RwLock::new(IndexState::default()),
        }
    }

    /// Directory the indexed mapsets were read from
    pub fn root(&self) -> &str {
        &self.root
    }

    fn read(&self) -> RwLockReadGuard<'_, IndexState<T>> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, IndexState<T>> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Append an entry under `key`
    pub fn add_entry(&self, key: &str, original_path: impl Into<String>, data: T) {
        let entry = Arc::new(ParseEntry {
            data,
            original_path: original_path.into(),
        });

        let mut state = self.write();
        state.entries.push(Arc::clone(&entry));
        match state.by_key.get_mut(key) {
            Some(group) => group.push(entry),
            None => {
                state.by_key.insert(key.to_string(), vec![entry]);
                state.keys.push(key.to_string());
            }
        }
    }

    /// All entries in global insertion order
    pub fn entries(&self) -> Vec<Arc<ParseEntry<T>>> {
        self.read().entries.clone()
    }

    /// Entries recorded under `key`, in insertion order
    pub fn entries_for(&self, key: &str) -> Vec<Arc<ParseEntry<T>>> {
        self.read().by_key.get(key).cloned().unwrap_or_default()
    }

    /// Keys in the order they were first inserted
    pub fn keys(&self) -> Vec<String> {
        self.read().keys.clone()
    }

    /// Remove every entry
    pub fn clear(&self) {
        *self.write() = IndexState::default();
    }

    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().entries.is_empty()
    }

    pub fn key_count(&self) -> usize {
        self.read().keys.len()
    }
}
