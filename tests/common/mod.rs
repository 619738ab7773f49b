//! Shared test utilities for the integration suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from a suite's main.rs.

#![allow(dead_code)]
#![allow(unused_imports)]

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Once;

pub use tansu::{
    Direction, Error, ErrorKind, IndexAction, IndexKind, Operator, Query, Record, RecordOps,
    Store, StoreConfig, StoreKind, TransactionError, Value,
};
use tempfile::TempDir;

// ============================================================================
// Initialization
// ============================================================================

static INIT_TRACING: Once = Once::new();

/// Route `tracing` output through the test harness; set RUST_LOG-style
/// verbosity with `TANSU_TEST_LOG=debug`.
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let level = std::env::var("TANSU_TEST_LOG")
            .ok()
            .and_then(|l| l.parse().ok())
            .unwrap_or(tracing::Level::WARN);
        let _ = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_test_writer()
            .try_init();
    });
}

// ============================================================================
// TestStore - file-backed store in a temp directory
// ============================================================================

/// A file-backed store that can be closed and reopened in place.
pub struct TestStore {
    pub store: Option<Store>,
    pub dir: TempDir,
    pub path: PathBuf,
    pub params: String,
}

impl TestStore {
    /// Hash store with default tuning.
    pub fn hash() -> Self {
        Self::with_file("casket.tch", "")
    }

    /// Tree store with default tuning.
    pub fn tree() -> Self {
        Self::with_file("casket.tcb", "")
    }

    /// Store at `name` inside a fresh temp dir, opened with `#params`.
    pub fn with_file(name: &str, params: &str) -> Self {
        init_tracing();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(name);
        let params = params.to_string();
        let store = Store::open(&spec_of(&path, &params)).unwrap();
        Self {
            store: Some(store),
            dir,
            path,
            params,
        }
    }

    pub fn store(&self) -> &Store {
        self.store.as_ref().unwrap()
    }

    /// Close and open the same file again.
    pub fn reopen(&mut self) {
        if let Some(store) = self.store.take() {
            store.close().unwrap();
        }
        self.store = Some(Store::open(&spec_of(&self.path, &self.params)).unwrap());
    }

    /// Path for a sibling file in the same temp dir.
    pub fn sibling(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn file_size(&self) -> u64 {
        file_size(&self.path)
    }
}

fn spec_of(path: &Path, params: &str) -> String {
    if params.is_empty() {
        path.display().to_string()
    } else {
        format!("{}#{}", path.display(), params)
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Record from column/value pairs.
pub fn record(pairs: &[(&str, &str)]) -> Record {
    pairs.iter().copied().collect()
}

/// The sample table used by the query scenarios: `pk0..pk4` with ages
/// 22, 18, 45, 77, 32.
pub fn load_people(store: &Store) {
    let rows = [
        ("pk0", "alfred", "22", "ja,en"),
        ("pk1", "bob", "18", "en"),
        ("pk2", "carl", "45", "en,fr"),
        ("pk3", "dave", "77", "de"),
        ("pk4", "eve", "32", "ja"),
    ];
    for (pk, name, age, lang) in rows {
        store
            .put(pk, record(&[("name", name), ("age", age), ("lang", lang)]))
            .unwrap();
    }
}

/// Full contents as a sorted map, for whole-store comparisons.
pub fn contents(store: &Store) -> BTreeMap<String, Value> {
    store
        .iter()
        .unwrap()
        .map(|r| r.unwrap())
        .collect()
}

/// Primary keys of a query's result rows, in result order.
pub fn query_pks(store: &Store, query: &Query) -> Vec<String> {
    store
        .query(query)
        .unwrap()
        .collect_rows()
        .unwrap()
        .into_iter()
        .map(|row| row.pk().unwrap().to_string())
        .collect()
}

pub fn file_size(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// Cut a file down to `len` bytes.
pub fn truncate_file(path: &Path, len: u64) {
    let f = OpenOptions::new().write(true).open(path).unwrap();
    f.set_len(len).unwrap();
}
