//! Record access trait
//!
//! [`RecordOps`] is the closed set of per-record operations shared by an open
//! store (auto-commit) and a transaction (buffered until commit). Generic code
//! written against it runs unchanged in either context.

use crate::error::Result;
use crate::value::Value;

/// Per-record operations
pub trait RecordOps {
    /// Current value, `None` if absent; never an error for a missing key
    fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Insert or overwrite
    fn put<V: Into<Value>>(&self, key: &str, value: V) -> Result<()>;

    /// Remove, returning the previous value; `None` if absent
    fn delete(&self, key: &str) -> Result<Option<Value>>;

    /// Remove every record
    fn clear(&self) -> Result<()>;

    /// Add to a whole value holding an integer; absent keys start at 0
    fn add_int(&self, key: &str, delta: i64) -> Result<i64>;

    /// Add to a whole value holding a number; absent keys start at 0
    fn add_double(&self, key: &str, delta: f64) -> Result<f64>;

    /// Add to an integer column of a record
    fn add_int_field(&self, key: &str, column: &str, delta: i64) -> Result<i64>;

    /// Add to a numeric column of a record
    fn add_double_field(&self, key: &str, column: &str, delta: f64) -> Result<f64>;

    /// True if the key is present
    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }
}
