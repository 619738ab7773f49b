//! Secondary column indices
//!
//! Each index maps a column value to the set of primary keys holding it:
//! - Lexical: `BTreeMap<String, BTreeSet<String>>` (exact, prefix, any-of)
//! - Decimal: `BTreeMap<DecimalKey, BTreeSet<String>>` (exact, range, any-of)
//!
//! Records that lack the column are not indexed. The primary key column
//! (`""`) indexes the key itself. All indices are updated inside the same
//! write as the record they describe.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

use tansu_core::{is_primary_key_column, parse_decimal, IndexKind, Value};

/// Total-ordered wrapper over a parsed decimal value
#[derive(Debug, Clone, Copy)]
pub struct DecimalKey(f64);

impl DecimalKey {
    /// Wrap a number; `-0.0` is folded into `0.0`
    pub fn new(v: f64) -> Self {
        if v == 0.0 {
            DecimalKey(0.0)
        } else {
            DecimalKey(v)
        }
    }

    /// The wrapped number
    pub fn get(self) -> f64 {
        self.0
    }
}

impl PartialEq for DecimalKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DecimalKey {}

impl PartialOrd for DecimalKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DecimalKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// A lookup the query planner can push down into an index
#[derive(Debug, Clone, PartialEq)]
pub enum IndexLookup {
    /// Lexical exact match
    Exact(String),
    /// Lexical forward match
    Prefix(String),
    /// Lexical match on any of the tokens
    AnyOf(Vec<String>),
    /// Decimal range
    Range {
        /// Lower bound
        lower: Bound<f64>,
        /// Upper bound
        upper: Bound<f64>,
    },
    /// Decimal match on any of the numbers
    AnyNumber(Vec<f64>),
}

impl IndexLookup {
    /// Index kind able to answer this lookup
    pub fn kind(&self) -> IndexKind {
        match self {
            IndexLookup::Exact(_) | IndexLookup::Prefix(_) | IndexLookup::AnyOf(_) => {
                IndexKind::Lexical
            }
            IndexLookup::Range { .. } | IndexLookup::AnyNumber(_) => IndexKind::Decimal,
        }
    }
}

/// Index over one column
#[derive(Debug, Clone)]
pub enum ColumnIndex {
    /// String ordering
    Lexical(BTreeMap<String, BTreeSet<String>>),
    /// Numeric ordering
    Decimal(BTreeMap<DecimalKey, BTreeSet<String>>),
}

impl ColumnIndex {
    /// Empty index of the given kind
    pub fn new(kind: IndexKind) -> Self {
        match kind {
            IndexKind::Lexical => ColumnIndex::Lexical(BTreeMap::new()),
            IndexKind::Decimal => ColumnIndex::Decimal(BTreeMap::new()),
        }
    }

    /// Kind of this index
    pub fn kind(&self) -> IndexKind {
        match self {
            ColumnIndex::Lexical(_) => IndexKind::Lexical,
            ColumnIndex::Decimal(_) => IndexKind::Decimal,
        }
    }

    /// Add `pk` under `value`
    pub fn insert(&mut self, value: &str, pk: &str) {
        match self {
            ColumnIndex::Lexical(m) => {
                m.entry(value.to_string()).or_default().insert(pk.to_string());
            }
            ColumnIndex::Decimal(m) => {
                m.entry(DecimalKey::new(parse_decimal(value)))
                    .or_default()
                    .insert(pk.to_string());
            }
        }
    }

    /// Remove `pk` from under `value`; empty sets are dropped
    pub fn remove(&mut self, value: &str, pk: &str) {
        match self {
            ColumnIndex::Lexical(m) => {
                if let Some(keys) = m.get_mut(value) {
                    keys.remove(pk);
                    if keys.is_empty() {
                        m.remove(value);
                    }
                }
            }
            ColumnIndex::Decimal(m) => {
                let dk = DecimalKey::new(parse_decimal(value));
                if let Some(keys) = m.get_mut(&dk) {
                    keys.remove(pk);
                    if keys.is_empty() {
                        m.remove(&dk);
                    }
                }
            }
        }
    }

    /// Drop all entries
    pub fn clear(&mut self) {
        match self {
            ColumnIndex::Lexical(m) => m.clear(),
            ColumnIndex::Decimal(m) => m.clear(),
        }
    }

    /// Number of distinct indexed values
    pub fn distinct_values(&self) -> usize {
        match self {
            ColumnIndex::Lexical(m) => m.len(),
            ColumnIndex::Decimal(m) => m.len(),
        }
    }

    /// Answer a lookup; `None` if this index kind cannot answer it
    pub fn lookup(&self, lookup: &IndexLookup) -> Option<BTreeSet<String>> {
        let mut out = BTreeSet::new();
        match (self, lookup) {
            (ColumnIndex::Lexical(m), IndexLookup::Exact(v)) => {
                if let Some(keys) = m.get(v) {
                    out.extend(keys.iter().cloned());
                }
            }
            (ColumnIndex::Lexical(m), IndexLookup::Prefix(p)) => {
                for (_, keys) in m
                    .range::<str, _>((Bound::Included(p.as_str()), Bound::Unbounded))
                    .take_while(|(v, _)| v.starts_with(p.as_str()))
                {
                    out.extend(keys.iter().cloned());
                }
            }
            (ColumnIndex::Lexical(m), IndexLookup::AnyOf(tokens)) => {
                for t in tokens {
                    if let Some(keys) = m.get(t) {
                        out.extend(keys.iter().cloned());
                    }
                }
            }
            (ColumnIndex::Decimal(m), IndexLookup::Range { lower, upper }) => {
                if !range_is_valid(*lower, *upper) {
                    return Some(out);
                }
                let range = (map_bound(*lower), map_bound(*upper));
                for (_, keys) in m.range(range) {
                    out.extend(keys.iter().cloned());
                }
            }
            (ColumnIndex::Decimal(m), IndexLookup::AnyNumber(numbers)) => {
                for n in numbers {
                    if let Some(keys) = m.get(&DecimalKey::new(*n)) {
                        out.extend(keys.iter().cloned());
                    }
                }
            }
            _ => return None,
        }
        Some(out)
    }
}

fn map_bound(b: Bound<f64>) -> Bound<DecimalKey> {
    match b {
        Bound::Included(v) => Bound::Included(DecimalKey::new(v)),
        Bound::Excluded(v) => Bound::Excluded(DecimalKey::new(v)),
        Bound::Unbounded => Bound::Unbounded,
    }
}

/// `BTreeMap::range` panics on inverted or empty-exclusive ranges
fn range_is_valid(lower: Bound<f64>, upper: Bound<f64>) -> bool {
    let lo = match lower {
        Bound::Included(v) | Bound::Excluded(v) => DecimalKey::new(v),
        Bound::Unbounded => return true,
    };
    let hi = match upper {
        Bound::Included(v) | Bound::Excluded(v) => DecimalKey::new(v),
        Bound::Unbounded => return true,
    };
    match lo.cmp(&hi) {
        Ordering::Less => true,
        Ordering::Equal => {
            matches!(lower, Bound::Included(_)) && matches!(upper, Bound::Included(_))
        }
        Ordering::Greater => false,
    }
}

/// The value an index on `column` sees for a record
pub fn indexed_value<'a>(column: &str, key: &'a str, value: &'a Value) -> Option<&'a str> {
    if is_primary_key_column(column) {
        Some(key)
    } else {
        value.column(column)
    }
}

/// All indices of a store, keyed by column (`""` for the primary key)
#[derive(Debug, Clone, Default)]
pub struct IndexSet {
    columns: BTreeMap<String, ColumnIndex>,
}

impl IndexSet {
    /// Create a new empty IndexSet
    pub fn new() -> Self {
        Self::default()
    }

    /// Index a newly written record
    pub fn on_insert(&mut self, key: &str, value: &Value) {
        for (column, index) in self.columns.iter_mut() {
            if let Some(v) = indexed_value(column, key, value) {
                index.insert(v, key);
            }
        }
    }

    /// Unindex a record that is being replaced or removed
    pub fn on_remove(&mut self, key: &str, value: &Value) {
        for (column, index) in self.columns.iter_mut() {
            if let Some(v) = indexed_value(column, key, value) {
                index.remove(v, key);
            }
        }
    }

    /// Drop every entry, keeping definitions
    pub fn clear_entries(&mut self) {
        for index in self.columns.values_mut() {
            index.clear();
        }
    }

    /// Install `index` on `column`, replacing any existing one
    pub fn install(&mut self, column: String, index: ColumnIndex) {
        self.columns.insert(column, index);
    }

    /// Remove the index on `column`; `false` if there was none
    pub fn drop_index(&mut self, column: &str) -> bool {
        self.columns.remove(column).is_some()
    }

    /// Index on `column`
    pub fn get(&self, column: &str) -> Option<&ColumnIndex> {
        self.columns.get(column)
    }

    /// Kind of the index on `column`
    pub fn kind_of(&self, column: &str) -> Option<IndexKind> {
        self.columns.get(column).map(|i| i.kind())
    }

    /// (column, kind) for every index
    pub fn definitions(&self) -> Vec<(String, IndexKind)> {
        self.columns
            .iter()
            .map(|(c, i)| (c.clone(), i.kind()))
            .collect()
    }

    /// Number of indices
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// True if no index is defined
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
