//! Store state: records, indices and bookkeeping that change together
//!
//! A [`StoreState`] is only ever mutated through [`StoreState::apply`], which
//! keeps the backend and every secondary index consistent within one batch.

use tansu_core::{is_primary_key_column, IndexKind, Mutation, StoreKind, Value};

use crate::backend::{Backend, StoredRecord};
use crate::index::{indexed_value, ColumnIndex, IndexSet};

/// Summary of one applied batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyResult {
    /// Records inserted or overwritten
    pub puts: usize,
    /// Records removed (deletes of absent keys are not counted)
    pub deletes: usize,
    /// Previously logged entries made obsolete by this batch
    pub superseded: u64,
}

/// Records plus their indices at one version
#[derive(Debug, Clone)]
pub struct StoreState {
    backend: Backend,
    indexes: IndexSet,
    weight: u64,
    version: u64,
}

impl StoreState {
    /// Empty state
    pub fn new(kind: StoreKind, bucket_count: u64) -> Self {
        Self {
            backend: Backend::new(kind, bucket_count),
            indexes: IndexSet::new(),
            weight: 0,
            version: 0,
        }
    }

    /// Backing map
    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// Secondary indices
    pub fn indexes(&self) -> &IndexSet {
        &self.indexes
    }

    /// Sum of key and value sizes of all records
    pub fn weight(&self) -> u64 {
        self.weight
    }

    /// Version of the last applied batch
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.backend.len()
    }

    /// True if the store holds no records
    pub fn is_empty(&self) -> bool {
        self.backend.is_empty()
    }

    /// Look up a record
    pub fn get(&self, key: &str) -> Option<&StoredRecord> {
        self.backend.get(key)
    }

    /// Apply `ops` in order, stamping every written record with `version`
    pub fn apply(&mut self, ops: &[Mutation], version: u64) -> ApplyResult {
        let mut result = ApplyResult::default();
        for op in ops {
            match op {
                Mutation::Put { key, value } => {
                    self.put(key, value.clone(), version, &mut result);
                }
                Mutation::Delete { key } => {
                    self.delete(key, &mut result);
                }
                Mutation::Clear => {
                    result.superseded += self.backend.len() as u64;
                    self.backend.clear();
                    self.indexes.clear_entries();
                    self.weight = 0;
                }
                Mutation::SetIndex { column, kind } => {
                    self.build_index(column, *kind);
                }
                Mutation::DropIndex { column } => {
                    self.indexes.drop_index(normalize_column(column));
                    result.superseded += 1;
                }
            }
        }
        self.version = self.version.max(version);
        result
    }

    fn put(&mut self, key: &str, value: Value, version: u64, result: &mut ApplyResult) {
        if let Some(old) = self.backend.get(key) {
            self.indexes.on_remove(key, &old.value);
            self.weight -= record_weight(key, &old.value);
            result.superseded += 1;
        }
        self.indexes.on_insert(key, &value);
        self.weight += record_weight(key, &value);
        self.backend
            .insert(key.to_string(), StoredRecord::new(value, version));
        result.puts += 1;
    }

    fn delete(&mut self, key: &str, result: &mut ApplyResult) {
        if let Some(old) = self.backend.remove(key) {
            self.indexes.on_remove(key, &old.value);
            self.weight -= record_weight(key, &old.value);
            // both the original put and the delete entry are now dead
            result.superseded += 2;
            result.deletes += 1;
        }
    }

    fn build_index(&mut self, column: &str, kind: IndexKind) {
        let column = normalize_column(column);
        let mut index = ColumnIndex::new(kind);
        for (key, record) in self.backend.iter() {
            if let Some(v) = indexed_value(column, key, &record.value) {
                index.insert(v, key);
            }
        }
        self.indexes.install(column.to_string(), index);
    }
}

/// Fold the primary key alias into the canonical empty column name
pub fn normalize_column(column: &str) -> &str {
    if is_primary_key_column(column) {
        tansu_core::PRIMARY_KEY_COLUMN
    } else {
        column
    }
}

fn record_weight(key: &str, value: &Value) -> u64 {
    (key.len() + value.weight()) as u64
}
