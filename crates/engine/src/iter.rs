//! Record iteration over an open store

use tansu_core::{Error, HandleState, Result, Value};
use tansu_storage::SnapshotIter;

/// One pass over the records of a store
///
/// Iterates the snapshot taken when [`Store::iter`](crate::Store::iter)
/// was called: sorted key order for tree stores, unspecified for hash
/// stores. Closing the store ends the pass with a single `Err(Closed)`.
pub struct Records {
    inner: Option<SnapshotIter>,
    handle: HandleState,
}

impl Records {
    pub(crate) fn new(inner: SnapshotIter, handle: HandleState) -> Self {
        Self {
            inner: Some(inner),
            handle,
        }
    }
}

impl Iterator for Records {
    type Item = Result<(String, Value)>;

    fn next(&mut self) -> Option<Self::Item> {
        let inner = self.inner.as_mut()?;
        if self.handle.is_closed() {
            self.inner = None;
            return Some(Err(Error::Closed));
        }
        match inner.next() {
            Some(pair) => Some(Ok(pair)),
            None => {
                self.inner = None;
                None
            }
        }
    }
}
