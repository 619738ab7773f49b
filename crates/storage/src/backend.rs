//! Backing structures for record storage
//!
//! - `Hash`: `FxHashMap`, O(1) amortized, iteration order unspecified
//! - `Tree`: `BTreeMap`, O(log n), keys iterate in sorted order

use std::collections::{btree_map, hash_map, BTreeMap};
use std::ops::Bound;

use rustc_hash::FxHashMap;
use tansu_core::{StoreKind, Value};

/// Upper bound on the bucket count honoured as an up-front allocation
const MAX_PREALLOCATED_BUCKETS: u64 = 1 << 20;

/// A value together with the commit version that wrote it
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    /// The stored value
    pub value: Value,
    /// Version of the commit that wrote this value
    pub version: u64,
}

impl StoredRecord {
    /// Wrap a value written at `version`
    pub fn new(value: Value, version: u64) -> Self {
        Self { value, version }
    }
}

/// Primary key → record map, hash or tree shaped
#[derive(Debug, Clone)]
pub enum Backend {
    /// Hash table backend
    Hash(FxHashMap<String, StoredRecord>),
    /// Ordered tree backend
    Tree(BTreeMap<String, StoredRecord>),
}

impl Backend {
    /// Create an empty backend; `bucket_count` sizes the hash table
    pub fn new(kind: StoreKind, bucket_count: u64) -> Self {
        match kind {
            StoreKind::Hash => {
                let buckets = bucket_count.min(MAX_PREALLOCATED_BUCKETS) as usize;
                Backend::Hash(FxHashMap::with_capacity_and_hasher(
                    buckets,
                    Default::default(),
                ))
            }
            StoreKind::Tree => Backend::Tree(BTreeMap::new()),
        }
    }

    /// Which shape this is
    pub fn kind(&self) -> StoreKind {
        match self {
            Backend::Hash(_) => StoreKind::Hash,
            Backend::Tree(_) => StoreKind::Tree,
        }
    }

    /// Look up a record
    pub fn get(&self, key: &str) -> Option<&StoredRecord> {
        match self {
            Backend::Hash(m) => m.get(key),
            Backend::Tree(m) => m.get(key),
        }
    }

    /// Insert or replace, returning the previous record
    pub fn insert(&mut self, key: String, record: StoredRecord) -> Option<StoredRecord> {
        match self {
            Backend::Hash(m) => m.insert(key, record),
            Backend::Tree(m) => m.insert(key, record),
        }
    }

    /// Remove a record
    pub fn remove(&mut self, key: &str) -> Option<StoredRecord> {
        match self {
            Backend::Hash(m) => m.remove(key),
            Backend::Tree(m) => m.remove(key),
        }
    }

    /// Remove everything; hash tables keep their capacity
    pub fn clear(&mut self) {
        match self {
            Backend::Hash(m) => m.clear(),
            Backend::Tree(m) => m.clear(),
        }
    }

    /// Number of records
    pub fn len(&self) -> usize {
        match self {
            Backend::Hash(m) => m.len(),
            Backend::Tree(m) => m.len(),
        }
    }

    /// True if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate in backend order
    pub fn iter(&self) -> BackendIter<'_> {
        match self {
            Backend::Hash(m) => BackendIter::Hash(m.iter()),
            Backend::Tree(m) => BackendIter::Tree(m.iter()),
        }
    }

    /// Keys starting with `prefix`, in backend order
    ///
    /// Tree backends seek straight to the prefix; hash backends filter.
    pub fn keys_with_prefix<'a>(&'a self, prefix: &'a str) -> Box<dyn Iterator<Item = &'a String> + 'a> {
        match self {
            Backend::Hash(m) => Box::new(m.keys().filter(move |k| k.starts_with(prefix))),
            Backend::Tree(m) => Box::new(
                m.range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
                    .map(|(k, _)| k)
                    .take_while(move |k| k.starts_with(prefix)),
            ),
        }
    }

    /// First tree entry strictly after `after` (or the first entry)
    ///
    /// Only meaningful for tree backends; used by lazy cursors.
    pub fn tree_next_after(&self, after: Option<&str>) -> Option<(&String, &StoredRecord)> {
        match self {
            Backend::Tree(m) => match after {
                None => m.iter().next(),
                Some(k) => m
                    .range::<str, _>((Bound::Excluded(k), Bound::Unbounded))
                    .next(),
            },
            Backend::Hash(_) => None,
        }
    }
}

/// Iterator over a backend
pub enum BackendIter<'a> {
    /// Hash iteration
    Hash(hash_map::Iter<'a, String, StoredRecord>),
    /// Tree iteration
    Tree(btree_map::Iter<'a, String, StoredRecord>),
}

impl<'a> Iterator for BackendIter<'a> {
    type Item = (&'a String, &'a StoredRecord);

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            BackendIter::Hash(it) => it.next(),
            BackendIter::Tree(it) => it.next(),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            BackendIter::Hash(it) => it.size_hint(),
            BackendIter::Tree(it) => it.size_hint(),
        }
    }
}
