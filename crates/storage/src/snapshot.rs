//! Point-in-time views of a record store
//!
//! A [`StoreSnapshot`] pins one immutable [`StoreState`]. Writers never touch
//! a pinned state: they copy it on write, so a snapshot stays valid and
//! unchanged for as long as it is held.

use std::sync::Arc;

use tansu_core::{StoreKind, Value};

use crate::index::IndexSet;
use crate::state::StoreState;

/// Immutable view of a store at one version
#[derive(Debug, Clone)]
pub struct StoreSnapshot {
    state: Arc<StoreState>,
}

impl StoreSnapshot {
    pub(crate) fn new(state: Arc<StoreState>) -> Self {
        Self { state }
    }

    /// Version of the last batch visible in this snapshot
    pub fn version(&self) -> u64 {
        self.state.version()
    }

    /// Backend shape
    pub fn kind(&self) -> StoreKind {
        self.state.backend().kind()
    }

    /// Value stored under `key`
    pub fn get(&self, key: &str) -> Option<Value> {
        self.state.get(key).map(|r| r.value.clone())
    }

    /// Value and the version that wrote it
    pub fn get_versioned(&self, key: &str) -> Option<(Value, u64)> {
        self.state.get(key).map(|r| (r.value.clone(), r.version))
    }

    /// Version that wrote `key`, or 0 if absent
    pub fn version_of(&self, key: &str) -> u64 {
        self.state.get(key).map(|r| r.version).unwrap_or(0)
    }

    /// True if `key` is present
    pub fn contains(&self, key: &str) -> bool {
        self.state.get(key).is_some()
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.state.len()
    }

    /// True if there are no records
    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }

    /// Record weight in bytes
    pub fn weight(&self) -> u64 {
        self.state.weight()
    }

    /// Secondary indices
    pub fn indexes(&self) -> &IndexSet {
        self.state.indexes()
    }

    /// Borrow the pinned state
    pub fn state(&self) -> &StoreState {
        &self.state
    }

    /// Keys in backend order
    pub fn keys(&self) -> Vec<String> {
        self.state.backend().iter().map(|(k, _)| k.clone()).collect()
    }

    /// Keys starting with `prefix`, in backend order, at most `limit`
    pub fn keys_with_prefix(&self, prefix: &str, limit: Option<usize>) -> Vec<String> {
        let it = self.state.backend().keys_with_prefix(prefix).cloned();
        match limit {
            Some(n) => it.take(n).collect(),
            None => it.collect(),
        }
    }

    /// Owned iterator over `(key, value)` pairs in backend order
    ///
    /// Tree snapshots walk lazily with a key cursor; hash snapshots capture
    /// the key list up front.
    pub fn iter(&self) -> SnapshotIter {
        let cursor = match self.kind() {
            StoreKind::Tree => Cursor::Tree { last: None },
            StoreKind::Hash => Cursor::Hash(self.keys().into_iter()),
        };
        SnapshotIter {
            state: Arc::clone(&self.state),
            cursor,
            finished: false,
        }
    }
}

enum Cursor {
    Tree { last: Option<String> },
    Hash(std::vec::IntoIter<String>),
}

/// Iterator returned by [`StoreSnapshot::iter`]
pub struct SnapshotIter {
    state: Arc<StoreState>,
    cursor: Cursor,
    finished: bool,
}

impl Iterator for SnapshotIter {
    type Item = (String, Value);

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let item = match &mut self.cursor {
            Cursor::Tree { last } => {
                let next = self
                    .state
                    .backend()
                    .tree_next_after(last.as_deref())
                    .map(|(k, r)| (k.clone(), r.value.clone()));
                if let Some((k, _)) = &next {
                    *last = Some(k.clone());
                }
                next
            }
            Cursor::Hash(keys) => keys
                .by_ref()
                .find_map(|k| self.state.get(&k).map(|r| (k, r.value.clone()))),
        };
        if item.is_none() {
            self.finished = true;
        }
        item
    }
}

#[cfg(test)]
mod tests {
    use crate::store::RecordStore;
    use tansu_core::{Mutation, StoreKind, Value};

    fn put(key: &str, v: &str) -> Mutation {
        Mutation::Put {
            key: key.into(),
            value: Value::from(v),
        }
    }

    #[test]
    fn test_snapshot_isolated_from_later_writes() {
        let store = RecordStore::new(StoreKind::Hash, 16);
        store.apply_batch(&[put("a", "1")], 1);
        let snap = store.snapshot();
        store.apply_batch(&[put("a", "2"), put("b", "3")], 2);

        assert_eq!(snap.get("a"), Some(Value::from("1")));
        assert!(snap.get("b").is_none());
        assert_eq!(snap.len(), 1);
        assert_eq!(store.snapshot().len(), 2);
    }

    #[test]
    fn test_tree_iter_sorted_and_owned() {
        let store = RecordStore::new(StoreKind::Tree, 0);
        store.apply_batch(&[put("b", "2"), put("a", "1"), put("c", "3")], 1);
        let iter = store.snapshot().iter();
        store.apply_batch(&[Mutation::Clear], 2);
        let keys: Vec<String> = iter.map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_hash_iter_visits_everything() {
        let store = RecordStore::new(StoreKind::Hash, 16);
        store.apply_batch(&[put("x", "1"), put("y", "2")], 1);
        let mut keys: Vec<String> = store.snapshot().iter().map(|(k, _)| k).collect();
        keys.sort();
        assert_eq!(keys, vec!["x", "y"]);
    }

    #[test]
    fn test_prefix_limit() {
        let store = RecordStore::new(StoreKind::Tree, 0);
        store.apply_batch(&[put("p1", ""), put("p2", ""), put("p3", ""), put("q", "")], 1);
        let keys = store.snapshot().keys_with_prefix("p", Some(2));
        assert_eq!(keys, vec!["p1", "p2"]);
    }
}
