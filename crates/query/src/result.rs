//! Query result sets
//!
//! A [`ResultSet`] owns the matching primary keys and the snapshot they were
//! computed against. Records are resolved from that snapshot one row at a
//! time as the set is consumed, so later writes to the store never leak
//! into a running result set.
//!
//! The set shares the store's [`HandleState`]: once either the store or the
//! set itself is closed, the next `next()` yields `Err(Closed)` exactly once
//! and iteration ends.

use std::collections::VecDeque;

use tansu_core::{is_primary_key_column, Error, HandleState, Record, Result, Value};
use tansu_storage::StoreSnapshot;

/// One result row
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pk: Option<String>,
    value: Option<Value>,
}

impl Row {
    /// Row from its parts
    pub fn new(pk: Option<String>, value: Option<Value>) -> Self {
        Self { pk, value }
    }

    /// Primary key, unless the query asked for `no_pk`
    pub fn pk(&self) -> Option<&str> {
        self.pk.as_deref()
    }

    /// Stored value, unless the query asked for `keys_only`
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Column lookup; `""` and `":pk"` return the primary key
    pub fn get(&self, column: &str) -> Option<&str> {
        if is_primary_key_column(column) {
            return self.pk();
        }
        self.value.as_ref().and_then(|v| v.column(column))
    }

    /// The row as a record, primary key first under the `""` column
    ///
    /// Raw values contribute no columns.
    pub fn to_record(&self) -> Record {
        let mut record = Record::new();
        if let Some(pk) = &self.pk {
            record.set("", pk.clone());
        }
        if let Some(fields) = self.value.as_ref().and_then(Value::as_record) {
            for (column, text) in fields.iter() {
                record.set(column, text);
            }
        }
        record
    }

    /// Split into primary key and value
    pub fn into_parts(self) -> (Option<String>, Option<Value>) {
        (self.pk, self.value)
    }
}

/// Lazy, one-shot sequence of query rows
#[derive(Debug)]
pub struct ResultSet {
    keys: VecDeque<String>,
    total: usize,
    snapshot: Option<StoreSnapshot>,
    store: HandleState,
    own: HandleState,
    keys_only: bool,
    no_pk: bool,
    closed_reported: bool,
}

impl ResultSet {
    /// Wrap matched keys for consumption
    pub fn new(
        keys: Vec<String>,
        snapshot: StoreSnapshot,
        store: HandleState,
        keys_only: bool,
        no_pk: bool,
    ) -> Self {
        let total = keys.len();
        Self {
            keys: keys.into(),
            total,
            snapshot: Some(snapshot),
            store,
            own: HandleState::new(),
            keys_only,
            no_pk,
            closed_reported: false,
        }
    }

    /// Number of rows the query produced
    pub fn len(&self) -> usize {
        self.total
    }

    /// True if the query matched nothing
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Rows not yet consumed
    pub fn remaining(&self) -> usize {
        self.keys.len()
    }

    /// Keys not yet consumed, in result order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    /// True once the set or its store was closed
    pub fn is_closed(&self) -> bool {
        self.own.is_closed() || self.store.is_closed()
    }

    /// Release the pinned snapshot; later calls are no-ops
    pub fn close(&mut self) {
        if self.own.close() {
            self.keys.clear();
            self.snapshot = None;
        }
    }

    /// Drain the remaining rows, stopping at the first error
    pub fn collect_rows(self) -> Result<Vec<Row>> {
        self.collect()
    }
}

impl Iterator for ResultSet {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_closed() {
            if self.closed_reported {
                return None;
            }
            self.closed_reported = true;
            self.keys.clear();
            self.snapshot = None;
            return Some(Err(Error::Closed));
        }
        let key = self.keys.pop_front()?;
        let value = if self.keys_only {
            None
        } else {
            self.snapshot.as_ref().and_then(|s| s.get(&key))
        };
        let pk = if self.no_pk && !self.keys_only {
            None
        } else {
            Some(key)
        };
        Some(Ok(Row::new(pk, value)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.keys.len() + 1))
    }
}

impl Drop for ResultSet {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tansu_core::{Mutation, StoreKind};
    use tansu_storage::RecordStore;

    fn fixture() -> (RecordStore, HandleState) {
        let store = RecordStore::new(StoreKind::Tree, 0);
        store.apply_batch(
            &[
                Mutation::Put {
                    key: "a".into(),
                    value: Value::from(Record::from([("name", "alice")])),
                },
                Mutation::Put {
                    key: "b".into(),
                    value: Value::from(Record::from([("name", "bob")])),
                },
            ],
            1,
        );
        (store, HandleState::new())
    }

    #[test]
    fn test_rows_resolve_from_snapshot() {
        let (store, handle) = fixture();
        let rs = ResultSet::new(vec!["b".into(), "a".into()], store.snapshot(), handle, false, false);
        store.apply_batch(&[Mutation::Clear], 2);

        let rows = rs.collect_rows().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].pk(), Some("b"));
        assert_eq!(rows[0].get("name"), Some("bob"));
        assert_eq!(rows[1].get(":pk"), Some("a"));
        assert_eq!(rows[1].to_record().get(""), Some("a"));
    }

    #[test]
    fn test_keys_only_and_no_pk() {
        let (store, handle) = fixture();
        let mut rs = ResultSet::new(vec!["a".into()], store.snapshot(), handle.clone(), true, false);
        let row = rs.next().unwrap().unwrap();
        assert_eq!(row.pk(), Some("a"));
        assert!(row.value().is_none());

        let mut rs = ResultSet::new(vec!["a".into()], store.snapshot(), handle, false, true);
        let row = rs.next().unwrap().unwrap();
        assert!(row.pk().is_none());
        assert_eq!(row.get("name"), Some("alice"));
    }

    #[test]
    fn test_close_reports_once() {
        let (store, handle) = fixture();
        let mut rs = ResultSet::new(vec!["a".into(), "b".into()], store.snapshot(), handle, false, false);
        assert!(rs.next().unwrap().is_ok());
        rs.close();
        rs.close();
        assert!(matches!(rs.next(), Some(Err(Error::Closed))));
        assert!(rs.next().is_none());
        assert_eq!(rs.len(), 2);
    }

    #[test]
    fn test_store_close_invalidates_set() {
        let (store, handle) = fixture();
        let mut rs = ResultSet::new(vec!["a".into()], store.snapshot(), handle.clone(), false, false);
        handle.close();
        assert!(rs.is_closed());
        assert!(matches!(rs.next(), Some(Err(Error::Closed))));
        assert!(rs.next().is_none());
    }
}
