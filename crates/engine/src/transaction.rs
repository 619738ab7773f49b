//! Transaction guard
//!
//! A [`Transaction`] buffers every mutation made through it. Reads see the
//! store as of `begin()` plus the transaction's own writes; other handles
//! and threads see none of it until [`Transaction::commit`]. Dropping an
//! uncommitted guard aborts it.

use parking_lot::Mutex;
use tansu_concurrency::{PendingOperations, TransactionContext};
use tansu_core::value::{increment_double, increment_double_field, increment_int, increment_int_field};
use tansu_core::{Error, RecordOps, Result, TransactionError, Value};
use tracing::debug;

use crate::store::Store;

/// An open transaction on a [`Store`]
pub struct Transaction<'a> {
    store: &'a Store,
    ctx: Mutex<TransactionContext>,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(store: &'a Store, ctx: TransactionContext) -> Self {
        Self {
            store,
            ctx: Mutex::new(ctx),
        }
    }

    /// Transaction id, unique per store handle
    pub fn id(&self) -> u64 {
        self.ctx.lock().txn_id
    }

    /// True until committed or aborted
    pub fn is_active(&self) -> bool {
        self.ctx.lock().is_active()
    }

    /// Counts of buffered writes
    pub fn pending_operations(&self) -> PendingOperations {
        self.ctx.lock().pending_operations()
    }

    /// Make every buffered write visible and durable, atomically
    ///
    /// Returns the commit version. Fails with `NotActive` if already
    /// finished, and with `Conflict` if a key this transaction read was
    /// changed by another writer since `begin()`; the transaction is
    /// aborted in that case and the store is unchanged.
    pub fn commit(&mut self) -> Result<u64> {
        let store = self.store;
        let _serial = store.serialize();
        let ctx = self.ctx.get_mut();
        if !ctx.is_active() {
            return Err(Error::Transaction(TransactionError::NotActive));
        }
        if let Err(e) = store.ensure_open() {
            store.manager.abort(ctx, "store closed")?;
            return Err(e);
        }
        let mut writer = store.writer.lock();
        let (version, result) = store
            .manager
            .commit(ctx, &store.records, writer.file.as_mut())?;
        writer.superseded += result.superseded;
        Ok(version)
    }

    /// Discard every buffered write
    ///
    /// Fails with `NotActive` if already finished.
    pub fn abort(&mut self) -> Result<()> {
        let ctx = self.ctx.get_mut();
        if !ctx.is_active() {
            return Err(Error::Transaction(TransactionError::NotActive));
        }
        self.store.manager.abort(ctx, "aborted by caller")
    }

    fn update<T, F>(&self, key: &str, f: F) -> Result<T>
    where
        F: FnOnce(Option<&Value>) -> Result<(T, Value)>,
    {
        self.store.ensure_writable()?;
        let mut ctx = self.ctx.lock();
        let current = ctx.get(key)?;
        let (out, value) = f(current.as_ref())?;
        ctx.put(key.to_string(), value)?;
        Ok(out)
    }
}

impl RecordOps for Transaction<'_> {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let _serial = self.store.serialize();
        self.store.ensure_open()?;
        self.ctx.lock().get(key)
    }

    fn put<V: Into<Value>>(&self, key: &str, value: V) -> Result<()> {
        let _serial = self.store.serialize();
        self.store.ensure_writable()?;
        self.ctx.lock().put(key.to_string(), value.into())
    }

    fn delete(&self, key: &str) -> Result<Option<Value>> {
        let _serial = self.store.serialize();
        self.store.ensure_writable()?;
        self.ctx.lock().delete(key)
    }

    fn clear(&self) -> Result<()> {
        let _serial = self.store.serialize();
        self.store.ensure_writable()?;
        self.ctx.lock().clear()
    }

    fn add_int(&self, key: &str, delta: i64) -> Result<i64> {
        let _serial = self.store.serialize();
        self.update(key, |current| increment_int(key, current, delta))
    }

    fn add_double(&self, key: &str, delta: f64) -> Result<f64> {
        let _serial = self.store.serialize();
        self.update(key, |current| increment_double(key, current, delta))
    }

    fn add_int_field(&self, key: &str, column: &str, delta: i64) -> Result<i64> {
        let _serial = self.store.serialize();
        self.update(key, |current| increment_int_field(key, current, column, delta))
    }

    fn add_double_field(&self, key: &str, column: &str, delta: f64) -> Result<f64> {
        let _serial = self.store.serialize();
        self.update(key, |current| {
            increment_double_field(key, current, column, delta)
        })
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        let ctx = self.ctx.get_mut();
        if ctx.is_active() {
            let txn_id = ctx.txn_id;
            if self.store.manager.abort(ctx, "dropped without commit").is_ok() {
                debug!(target: "tansu::txn", txn_id, "Uncommitted transaction aborted on drop");
            }
        }
    }
}

impl std::fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ctx = self.ctx.lock();
        f.debug_struct("Transaction")
            .field("id", &ctx.txn_id)
            .field("status", ctx.status())
            .finish()
    }
}
