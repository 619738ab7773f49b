//! Store handle and open/close logic
//!
//! [`Store`] ties the layers together:
//! - RecordStore: in-memory records and indexes
//! - StoreFile: the single log file (absent for in-memory stores)
//! - TransactionManager: commit versions and the one-active-transaction rule
//!
//! ## Write path
//!
//! Every mutation, transactional or not, runs under the writer lock:
//! read the current state, compute the batch, append it to the log, then
//! apply it. A failure at any step before the apply leaves the store as it
//! was.
//!
//! ## Threading
//!
//! A `Store` is `Send + Sync` and its internal structures are always
//! protected. With `mutex_enabled` every call additionally runs under one
//! handle-wide reentrant lock, so compound caller sequences on one thread
//! are not interleaved with calls from other threads.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard};
use tansu_concurrency::TransactionManager;
use tansu_core::value::{increment_double, increment_double_field, increment_int, increment_int_field};
use tansu_core::{
    Error, ErrorCode, HandleState, IndexAction, IndexKind, Mutation, OpenMode, RecordOps, Result,
    StoreConfig, StoreKind, Value,
};
use tansu_durability::{create_store_file, LogEntry, StoreFile};
use tansu_query::{count, execute, plan, Query, ResultSet};
use tansu_storage::{normalize_column, RecordStore, StoreSnapshot};
use tracing::{debug, info, warn};

use crate::config::{parse_path_spec, StoreLocation};
use crate::iter::Records;
use crate::transaction::Transaction;

/// Log file and the bookkeeping that travels with it
#[derive(Debug, Default)]
pub(crate) struct WriterState {
    pub(crate) file: Option<StoreFile>,
    /// Log entries made obsolete since the last rewrite
    pub(crate) superseded: u64,
}

/// An open store
///
/// # Example
///
/// ```ignore
/// let store = Store::open("casket.tct#mode=wc")?;
/// store.put("pk0", Record::from([("name", "alfred"), ("age", "22")]))?;
/// store.set_index("age", IndexAction::Add(IndexKind::Decimal))?;
/// let rows = store.query(&Query::new().add("age", Operator::NumGe, "20"))?;
/// store.close()?;
/// ```
#[derive(Debug)]
pub struct Store {
    location: StoreLocation,
    config: StoreConfig,
    pub(crate) records: RecordStore,
    pub(crate) manager: TransactionManager,
    pub(crate) writer: Mutex<WriterState>,
    handle: HandleState,
    serial: Option<ReentrantMutex<()>>,
    read_only: bool,
    uid: AtomicU64,
}

impl Store {
    // ========================================================================
    // Open / Close
    // ========================================================================

    /// Open a store from a path spec with default tuning
    ///
    /// See [`parse_path_spec`] for the accepted syntax.
    pub fn open(spec: &str) -> Result<Self> {
        Self::open_with(spec, &StoreConfig::default())
    }

    /// Open a store from a path spec; spec parameters override `config`
    pub fn open_with(spec: &str, config: &StoreConfig) -> Result<Self> {
        let (location, config) = parse_path_spec(spec, config).map_err(|e| e.into_open(spec))?;
        Self::open_at(location, config)
    }

    /// Open a file store at `path` with exactly `config`
    pub fn open_path(path: impl AsRef<Path>, config: StoreConfig) -> Result<Self> {
        Self::open_at(StoreLocation::File(path.as_ref().to_path_buf()), config)
    }

    /// New empty in-memory store
    pub fn memory(kind: StoreKind) -> Self {
        let config = StoreConfig::new(kind);
        let records = RecordStore::new(kind, config.bucket_count);
        Self::assemble(StoreLocation::Memory, config, records, WriterState::default(), 0)
    }

    /// Open a store at an already parsed location
    pub fn open_at(location: StoreLocation, config: StoreConfig) -> Result<Self> {
        let path = match &location {
            StoreLocation::Memory => {
                config.validate().map_err(|e| e.into_open("*"))?;
                let records = RecordStore::new(config.kind, config.bucket_count);
                let store = Self::assemble(location, config, records, WriterState::default(), 0);
                info!(target: "tansu::engine", kind = %store.config.kind, "Opened in-memory store");
                return Ok(store);
            }
            StoreLocation::File(path) => path.clone(),
        };

        let (file, outcome) = StoreFile::open(&path, &config)?;
        let records = RecordStore::new(config.kind, config.bucket_count);
        let mut superseded = 0;
        let mut version = 0;
        for entry in &outcome.entries {
            let LogEntry::Commit { version: v, ops } = entry;
            superseded += records.apply_batch(ops, *v).superseded;
            version = version.max(*v);
        }

        let writer = WriterState {
            file: Some(file),
            superseded,
        };
        let store = Self::assemble(location, config, records, writer, version);
        info!(
            target: "tansu::engine",
            path = %path.display(),
            kind = %store.config.kind,
            records = store.records.len(),
            version,
            read_only = store.read_only,
            "Opened store"
        );
        Ok(store)
    }

    fn assemble(
        location: StoreLocation,
        config: StoreConfig,
        records: RecordStore,
        writer: WriterState,
        version: u64,
    ) -> Self {
        let uid = records
            .snapshot()
            .keys()
            .iter()
            .filter_map(|k| k.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        Self {
            read_only: !config.mode.write,
            serial: config.mutex_enabled.then(|| ReentrantMutex::new(())),
            manager: TransactionManager::new(version),
            writer: Mutex::new(writer),
            handle: HandleState::new(),
            uid: AtomicU64::new(uid),
            location,
            config,
            records,
        }
    }

    /// Release the store
    ///
    /// Runs the automatic defragmentation if enough log entries were
    /// superseded, syncs and unlocks the file. Idempotent: later calls
    /// return `Ok(())`. Every other operation on this handle, and on result
    /// sets derived from it, fails with `Closed` afterwards.
    pub fn close(&self) -> Result<()> {
        let _serial = self.serialize();
        if !self.handle.close() {
            return Ok(());
        }
        let mut writer = self.writer.lock();
        let outcome = self.finish(&mut writer);
        writer.file = None;
        self.records.reset();
        info!(
            target: "tansu::engine",
            path = ?self.location.path(),
            ok = outcome.is_ok(),
            "Closed store"
        );
        outcome
    }

    fn finish(&self, writer: &mut WriterState) -> Result<()> {
        let Some(file) = writer.file.as_mut() else {
            return Ok(());
        };
        if file.is_writable() && writer.superseded > self.config.defrag_threshold() {
            debug!(
                target: "tansu::engine",
                superseded = writer.superseded,
                threshold = self.config.defrag_threshold(),
                "Auto-defragmenting on close"
            );
            self.rewrite_live(file)?;
            writer.superseded = 0;
        }
        file.sync()
    }

    /// True once closed
    pub fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Backing file, `None` for in-memory stores
    pub fn path(&self) -> Option<&Path> {
        self.location.path()
    }

    /// Hash or tree
    pub fn kind(&self) -> StoreKind {
        self.config.kind
    }

    /// Effective tuning
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// True if opened without write access
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Number of records
    pub fn len(&self) -> Result<usize> {
        let _serial = self.serialize();
        self.ensure_open()?;
        Ok(self.records.len())
    }

    /// True if the store holds no records
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Approximate size in bytes
    ///
    /// File length for file stores; summed key and value bytes in memory.
    pub fn weight(&self) -> Result<u64> {
        let _serial = self.serialize();
        self.ensure_open()?;
        let writer = self.writer.lock();
        Ok(match &writer.file {
            Some(file) => file.len(),
            None => self.records.snapshot().weight(),
        })
    }

    /// True while a transaction is open on this store
    pub fn in_transaction(&self) -> bool {
        self.manager.active_txn().is_some()
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Lazy pass over every record
    pub fn iter(&self) -> Result<Records> {
        let _serial = self.serialize();
        self.ensure_open()?;
        Ok(Records::new(self.records.snapshot().iter(), self.handle.clone()))
    }

    /// Keys, optionally only those starting with `prefix`, at most `limit`
    ///
    /// Tree stores return sorted keys.
    pub fn keys(&self, prefix: Option<&str>, limit: Option<usize>) -> Result<Vec<String>> {
        let _serial = self.serialize();
        self.ensure_open()?;
        Ok(self
            .records
            .snapshot()
            .keys_with_prefix(prefix.unwrap_or(""), limit))
    }

    /// Every value, in iteration order
    pub fn values(&self) -> Result<Vec<Value>> {
        let _serial = self.serialize();
        self.ensure_open()?;
        Ok(self.records.snapshot().iter().map(|(_, v)| v).collect())
    }

    /// Values for `keys`; absent keys are skipped
    pub fn get_many<K: AsRef<str>>(&self, keys: &[K]) -> Result<Vec<(String, Value)>> {
        let _serial = self.serialize();
        self.ensure_open()?;
        let snapshot = self.records.snapshot();
        Ok(keys
            .iter()
            .filter_map(|k| {
                let key = k.as_ref();
                snapshot.get(key).map(|v| (key.to_string(), v))
            })
            .collect())
    }

    /// Next id from a per-handle counter
    ///
    /// The counter starts above the largest integer primary key present at
    /// open.
    pub fn generate_unique_id(&self) -> Result<u64> {
        self.ensure_open()?;
        Ok(self.uid.fetch_add(1, Ordering::SeqCst) + 1)
    }

    // ========================================================================
    // Bulk writes
    // ========================================================================

    /// Delete every key starting with `prefix` in one batch
    pub fn delete_keys_with_prefix(&self, prefix: &str) -> Result<usize> {
        self.write(|snapshot| {
            let ops: Vec<Mutation> = snapshot
                .keys_with_prefix(prefix, None)
                .into_iter()
                .map(|key| Mutation::Delete { key })
                .collect();
            let n = ops.len();
            Ok((ops, n))
        })
    }

    // ========================================================================
    // Indexes
    // ========================================================================

    /// Add, replace or remove the index on `column`
    ///
    /// `""` and `":pk"` designate the primary key. Returns `false` when
    /// nothing changed: `Add` on an indexed column, `Remove` on an
    /// unindexed one.
    pub fn set_index(&self, column: &str, action: IndexAction) -> Result<bool> {
        let column = normalize_column(column).to_string();
        self.write(|snapshot| {
            let existing = snapshot.indexes().kind_of(&column);
            let op = match (action, existing) {
                (IndexAction::Add(_), Some(_)) | (IndexAction::Remove, None) => None,
                (IndexAction::Add(kind), None) | (IndexAction::Replace(kind), _) => {
                    Some(Mutation::SetIndex {
                        column: column.clone(),
                        kind,
                    })
                }
                (IndexAction::Remove, Some(_)) => Some(Mutation::DropIndex {
                    column: column.clone(),
                }),
            };
            let changed = op.is_some();
            Ok((op.into_iter().collect(), changed))
        })
    }

    /// Kind of the index on `column`, if one exists
    pub fn index_kind(&self, column: &str) -> Result<Option<IndexKind>> {
        let _serial = self.serialize();
        self.ensure_open()?;
        Ok(self
            .records
            .snapshot()
            .indexes()
            .kind_of(normalize_column(column)))
    }

    /// True if `column` has an index of kind `kind`
    pub fn index_exists(&self, column: &str, kind: IndexKind) -> Result<bool> {
        Ok(self.index_kind(column)? == Some(kind))
    }

    /// Every index as (column, kind); the primary key is `""`
    pub fn indexes(&self) -> Result<Vec<(String, IndexKind)>> {
        let _serial = self.serialize();
        self.ensure_open()?;
        Ok(self.records.snapshot().indexes().definitions())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Run a query against a snapshot of the current state
    pub fn query(&self, query: &Query) -> Result<ResultSet> {
        let _serial = self.serialize();
        self.ensure_open()?;
        let snapshot = self.records.snapshot();
        let plan = plan(query, &snapshot)?;
        let keys = execute(&plan, &snapshot);
        debug!(target: "tansu::query", rows = keys.len(), full_scan = plan.is_full_scan(), "Query executed");
        Ok(ResultSet::new(
            keys,
            snapshot,
            self.handle.clone(),
            query.is_keys_only(),
            query.is_no_pk(),
        ))
    }

    /// Number of rows `query` returns
    ///
    /// Filters only: no sort, no record materialization; offset and limit
    /// are applied to the match count.
    pub fn count(&self, query: &Query) -> Result<usize> {
        let _serial = self.serialize();
        self.ensure_open()?;
        let snapshot = self.records.snapshot();
        let plan = plan(query, &snapshot)?;
        Ok(count(&plan, &snapshot))
    }

    /// Describe how `query` would be evaluated
    pub fn explain(&self, query: &Query) -> Result<String> {
        let _serial = self.serialize();
        self.ensure_open()?;
        Ok(plan(query, &self.records.snapshot())?.to_string())
    }

    /// Delete every row `query` returns, in one batch
    pub fn query_delete(&self, query: &Query) -> Result<usize> {
        self.write(|snapshot| {
            let plan = plan(query, snapshot)?;
            let ops: Vec<Mutation> = execute(&plan, snapshot)
                .into_iter()
                .map(|key| Mutation::Delete { key })
                .collect();
            let n = ops.len();
            Ok((ops, n))
        })
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Start a transaction
    ///
    /// Fails with `AlreadyActive` while another transaction is open on this
    /// store. The returned guard aborts on drop unless committed.
    pub fn begin(&self) -> Result<Transaction<'_>> {
        let _serial = self.serialize();
        self.ensure_open()?;
        let ctx = self.manager.begin(&self.records)?;
        Ok(Transaction::new(self, ctx))
    }

    /// Run `f` in a transaction
    ///
    /// Commits when `f` returns `Ok`, aborts and returns the error
    /// otherwise. A panic inside `f` aborts through the guard's drop.
    pub fn with_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let mut txn = self.begin()?;
        match f(&txn) {
            Ok(value) => {
                txn.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(abort_err) = txn.abort() {
                    debug!(target: "tansu::txn", error = %abort_err, "Abort after failed closure");
                }
                Err(e)
            }
        }
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Flush buffered writes to the device
    pub fn sync(&self) -> Result<()> {
        let _serial = self.serialize();
        self.ensure_open()?;
        let mut writer = self.writer.lock();
        match writer.file.as_mut() {
            Some(file) => file.sync(),
            None => Ok(()),
        }
    }

    /// Rewrite the file keeping only live records and index definitions
    ///
    /// No-op for in-memory stores.
    pub fn optimize(&self) -> Result<()> {
        let _serial = self.serialize();
        self.ensure_writable()?;
        let mut writer = self.writer.lock();
        let superseded = writer.superseded;
        if let Some(file) = writer.file.as_mut() {
            let before = file.len();
            self.rewrite_live(file)?;
            info!(
                target: "tansu::engine",
                path = %file.path().display(),
                before,
                after = file.len(),
                superseded,
                "Optimized store"
            );
        }
        writer.superseded = 0;
        Ok(())
    }

    fn rewrite_live(&self, file: &mut StoreFile) -> Result<()> {
        let entries = live_entries(&self.records.snapshot(), self.manager.current_version());
        file.rewrite(&entries)
    }

    /// Byte copy of the store file to `target`
    ///
    /// Buffered writes are synced first. In-memory stores write a fresh
    /// file holding their live state.
    pub fn copy(&self, target: impl AsRef<Path>) -> Result<()> {
        let target = target.as_ref();
        let _serial = self.serialize();
        self.ensure_open()?;
        let mut writer = self.writer.lock();
        match writer.file.as_mut() {
            Some(file) => {
                if same_file(file.path(), target) {
                    return Err(Error::invalid("cannot copy a store onto itself"));
                }
                file.sync()?;
                fs::copy(file.path(), target).map_err(|e| Error::io(ErrorCode::from_io(&e), e))?;
            }
            None => {
                let entries = live_entries(&self.records.snapshot(), self.manager.current_version());
                create_store_file(target, self.config.kind, self.config.alignment_power, &entries)?;
            }
        }
        info!(target: "tansu::engine", target = %target.display(), "Copied store");
        Ok(())
    }

    /// Copy by re-insertion into a fresh store at `target`
    ///
    /// Slower than [`Store::copy`] but the result holds no superseded
    /// entries. The copy is built beside `target` and renamed over it, so
    /// an existing file at `target` is only replaced by a complete copy.
    pub fn compact_copy(&self, target: impl AsRef<Path>) -> Result<()> {
        let target = target.as_ref();
        self.ensure_open()?;
        if let Some(path) = self.path() {
            if same_file(path, target) {
                return Err(Error::invalid("cannot copy a store onto itself"));
            }
        }
        let staging = staging_path(target);
        let copied = match self.build_copy(&staging) {
            Ok(n) => n,
            Err(e) => {
                let _ = fs::remove_file(&staging);
                return Err(e);
            }
        };
        fs::rename(&staging, target).map_err(|e| {
            let _ = fs::remove_file(&staging);
            Error::io(ErrorCode::Rename, e)
        })?;
        info!(target: "tansu::engine", target = %target.display(), records = copied, "Compact-copied store");
        Ok(())
    }

    fn build_copy(&self, path: &Path) -> Result<usize> {
        let config = StoreConfig::new(self.config.kind)
            .with_alignment_power(self.config.alignment_power)
            .with_bucket_count(self.config.bucket_count)
            .with_mode(OpenMode::truncate());
        let copy = Store::open_path(path, config)?;
        let copied = self.copy_into(&copy)?;
        copy.close()?;
        Ok(copied)
    }

    /// Insert every record and index definition of this store into `target`
    ///
    /// Runs as one batch on `target`. Returns the number of records copied.
    pub fn copy_into(&self, target: &Store) -> Result<usize> {
        if std::ptr::eq(self, target) {
            return Err(Error::invalid("cannot copy a store into itself"));
        }
        let snapshot = {
            let _serial = self.serialize();
            self.ensure_open()?;
            self.records.snapshot()
        };
        let entries = live_entries(&snapshot, 0);
        drop(snapshot);
        target.write(move |_| {
            let ops: Vec<Mutation> = entries
                .into_iter()
                .flat_map(|LogEntry::Commit { ops, .. }| ops)
                .collect();
            let n = ops
                .iter()
                .filter(|op| matches!(op, Mutation::Put { .. }))
                .count();
            Ok((ops, n))
        })
    }

    // ========================================================================
    // Internals
    // ========================================================================

    pub(crate) fn serialize(&self) -> Option<ReentrantMutexGuard<'_, ()>> {
        self.serial.as_ref().map(|m| m.lock())
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        self.handle.ensure_open()
    }

    pub(crate) fn ensure_writable(&self) -> Result<()> {
        self.ensure_open()?;
        if self.read_only {
            return Err(Error::invalid("store is opened read-only"));
        }
        Ok(())
    }

    /// Compute a batch from the current state, then log and apply it
    ///
    /// The writer lock is held throughout, so the state `f` saw is the
    /// state the batch lands on. An error from `f` changes nothing.
    fn write<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&StoreSnapshot) -> Result<(Vec<Mutation>, T)>,
    {
        let _serial = self.serialize();
        self.ensure_writable()?;
        let mut writer = self.writer.lock();
        let (ops, out) = {
            let snapshot = self.records.snapshot();
            f(&snapshot)?
        };
        let result = self.manager.apply(ops, &self.records, writer.file.as_mut())?;
        writer.superseded += result.superseded;
        Ok(out)
    }

    fn update<T, F>(&self, key: &str, f: F) -> Result<T>
    where
        F: FnOnce(Option<&Value>) -> Result<(T, Value)>,
    {
        self.write(|snapshot| {
            let (out, value) = f(snapshot.get(key).as_ref())?;
            Ok((
                vec![Mutation::Put {
                    key: key.to_string(),
                    value,
                }],
                out,
            ))
        })
    }
}

impl RecordOps for Store {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let _serial = self.serialize();
        self.ensure_open()?;
        Ok(self.records.get(key))
    }

    fn put<V: Into<Value>>(&self, key: &str, value: V) -> Result<()> {
        let value = value.into();
        self.write(|_| {
            Ok((
                vec![Mutation::Put {
                    key: key.to_string(),
                    value,
                }],
                (),
            ))
        })
    }

    fn delete(&self, key: &str) -> Result<Option<Value>> {
        self.write(|snapshot| match snapshot.get(key) {
            Some(previous) => Ok((
                vec![Mutation::Delete {
                    key: key.to_string(),
                }],
                Some(previous),
            )),
            None => Ok((Vec::new(), None)),
        })
    }

    fn clear(&self) -> Result<()> {
        self.write(|_| Ok((vec![Mutation::Clear], ())))
    }

    fn add_int(&self, key: &str, delta: i64) -> Result<i64> {
        self.update(key, |current| increment_int(key, current, delta))
    }

    fn add_double(&self, key: &str, delta: f64) -> Result<f64> {
        self.update(key, |current| increment_double(key, current, delta))
    }

    fn add_int_field(&self, key: &str, column: &str, delta: i64) -> Result<i64> {
        self.update(key, |current| increment_int_field(key, current, column, delta))
    }

    fn add_double_field(&self, key: &str, column: &str, delta: f64) -> Result<f64> {
        self.update(key, |current| {
            increment_double_field(key, current, column, delta)
        })
    }

    fn contains(&self, key: &str) -> Result<bool> {
        let _serial = self.serialize();
        self.ensure_open()?;
        Ok(self.records.snapshot().contains(key))
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if self.handle.is_closed() {
            return;
        }
        if let Err(e) = self.close() {
            warn!(
                target: "tansu::engine",
                path = ?self.location.path(),
                error = %e,
                "Failed to close store on drop"
            );
        }
    }
}

/// One commit entry that rebuilds `snapshot`: index definitions, then records
fn live_entries(snapshot: &StoreSnapshot, version: u64) -> Vec<LogEntry> {
    let mut ops: Vec<Mutation> = snapshot
        .indexes()
        .definitions()
        .into_iter()
        .map(|(column, kind)| Mutation::SetIndex { column, kind })
        .collect();
    ops.extend(snapshot.iter().map(|(key, value)| Mutation::Put { key, value }));
    if ops.is_empty() {
        return Vec::new();
    }
    vec![LogEntry::Commit {
        version: version.max(1),
        ops,
    }]
}

/// Sibling of `target` where a copy is assembled before the rename
fn staging_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".copying");
    target.with_file_name(name)
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
