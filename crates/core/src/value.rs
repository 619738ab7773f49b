//! Record and value types
//!
//! A stored value is either a [`Record`] (an ordered sequence of
//! column/value string pairs, the table shape) or an opaque byte string (the
//! plain cabinet shape). Columns are dynamically typed as strings; numeric
//! comparisons and increments parse on demand.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Ordered sequence of (column, value) pairs
///
/// Column names are unique within a record. Setting an existing column
/// replaces its value in place, so column order is the order of first
/// insertion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Record {
    fields: Vec<(String, String)>,
}

impl Record {
    /// Create an empty record
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Build a record from pairs; a repeated column keeps its first position
    /// and its last value.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut record = Record::new();
        for (k, v) in pairs {
            record.set(k, v);
        }
        record
    }

    /// Value of a column
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    /// Set a column, returning the previous value
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let column = column.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(name, _)| *name == column) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.fields.push((column, value));
                None
            }
        }
    }

    /// Remove a column, returning its value
    pub fn remove(&mut self, column: &str) -> Option<String> {
        let pos = self.fields.iter().position(|(name, _)| name == column)?;
        Some(self.fields.remove(pos).1)
    }

    /// True if the column is present
    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True if the record has no columns
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate columns in order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Column names in order
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    /// Approximate byte weight (sum of column name and value lengths)
    pub fn weight(&self) -> usize {
        self.fields.iter().map(|(k, v)| k.len() + v.len()).sum()
    }

    /// Consume into the underlying pairs
    pub fn into_pairs(self) -> Vec<(String, String)> {
        self.fields
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Record::from_pairs(iter)
    }
}

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for Record {
    fn from(pairs: [(K, V); N]) -> Self {
        Record::from_pairs(pairs)
    }
}

/// A stored value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Value {
    /// Table-shaped record
    Record(Record),
    /// Opaque byte string
    Raw(Vec<u8>),
}

impl Value {
    /// Borrow as a record
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            Value::Raw(_) => None,
        }
    }

    /// Borrow raw bytes
    pub fn as_raw(&self) -> Option<&[u8]> {
        match self {
            Value::Raw(bytes) => Some(bytes),
            Value::Record(_) => None,
        }
    }

    /// Raw bytes as UTF-8 text, if they are valid UTF-8
    pub fn as_str(&self) -> Option<&str> {
        self.as_raw().and_then(|b| std::str::from_utf8(b).ok())
    }

    /// Consume into a record
    pub fn into_record(self) -> Option<Record> {
        match self {
            Value::Record(r) => Some(r),
            Value::Raw(_) => None,
        }
    }

    /// Column value; raw values have no columns
    pub fn column(&self, name: &str) -> Option<&str> {
        self.as_record().and_then(|r| r.get(name))
    }

    /// Approximate byte weight
    pub fn weight(&self) -> usize {
        match self {
            Value::Record(r) => r.weight(),
            Value::Raw(b) => b.len(),
        }
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Value::Record(r)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Raw(s.as_bytes().to_vec())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Raw(s.into_bytes())
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Raw(b)
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Value::Raw(b.to_vec())
    }
}

// ============================================================================
// Numeric parsing
// ============================================================================

/// Lenient decimal parse used for comparisons, sorting and decimal indexes
///
/// Reads the longest leading numeric prefix (optional sign, digits, fraction,
/// exponent) after leading whitespace. Text with no numeric prefix is `0`.
pub fn parse_decimal(text: &str) -> f64 {
    let s = text.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;
    if end + 1 < bytes.len() && bytes[end] == b'.' && bytes[end + 1].is_ascii_digit() {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
            digits += 1;
        }
    }
    if digits == 0 {
        return 0.0;
    }
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }
    s[..end].parse::<f64>().unwrap_or(0.0)
}

/// Strict integer parse; surrounding whitespace is ignored
pub fn parse_int_strict(text: &str) -> Option<i64> {
    text.trim().parse::<i64>().ok()
}

/// Strict finite double parse; surrounding whitespace is ignored
pub fn parse_double_strict(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

// ============================================================================
// Numeric increments
// ============================================================================

fn raw_text<'a>(key: &str, value: &'a Value) -> Result<&'a str> {
    match value {
        Value::Raw(_) => value
            .as_str()
            .ok_or_else(|| Error::type_mismatch(key, "value is not UTF-8 text")),
        Value::Record(_) => Err(Error::type_mismatch(key, "value is a record")),
    }
}

/// Compute an integer increment of a whole raw value
///
/// Returns the new number and the value to store. `current` is left
/// untouched; a non-numeric value is a type mismatch.
pub fn increment_int(key: &str, current: Option<&Value>, delta: i64) -> Result<(i64, Value)> {
    let base = match current {
        None => 0,
        Some(v) => {
            let text = raw_text(key, v)?;
            parse_int_strict(text)
                .ok_or_else(|| Error::type_mismatch(key, format!("{:?} is not an integer", text)))?
        }
    };
    let next = base
        .checked_add(delta)
        .ok_or_else(|| Error::type_mismatch(key, "integer overflow"))?;
    Ok((next, Value::from(next.to_string())))
}

/// Compute a floating-point increment of a whole raw value
pub fn increment_double(key: &str, current: Option<&Value>, delta: f64) -> Result<(f64, Value)> {
    let base = match current {
        None => 0.0,
        Some(v) => {
            let text = raw_text(key, v)?;
            parse_double_strict(text)
                .ok_or_else(|| Error::type_mismatch(key, format!("{:?} is not a number", text)))?
        }
    };
    let next = base + delta;
    if !next.is_finite() {
        return Err(Error::type_mismatch(key, "result is not finite"));
    }
    Ok((next, Value::from(next.to_string())))
}

fn record_for_field<'a>(key: &str, current: Option<&'a Value>) -> Result<Option<&'a Record>> {
    match current {
        None => Ok(None),
        Some(Value::Record(r)) => Ok(Some(r)),
        Some(Value::Raw(_)) => Err(Error::type_mismatch(key, "value is not a record")),
    }
}

/// Compute an integer increment of one column of a record
///
/// An absent record becomes `{column: delta}`; other columns are kept.
pub fn increment_int_field(
    key: &str,
    current: Option<&Value>,
    column: &str,
    delta: i64,
) -> Result<(i64, Value)> {
    let record = record_for_field(key, current)?;
    let base = match record.and_then(|r| r.get(column)) {
        None => 0,
        Some(text) => parse_int_strict(text).ok_or_else(|| {
            Error::type_mismatch(key, format!("column {:?} holds {:?}", column, text))
        })?,
    };
    let next = base
        .checked_add(delta)
        .ok_or_else(|| Error::type_mismatch(key, "integer overflow"))?;
    let mut updated = record.cloned().unwrap_or_default();
    updated.set(column, next.to_string());
    Ok((next, Value::Record(updated)))
}

/// Compute a floating-point increment of one column of a record
pub fn increment_double_field(
    key: &str,
    current: Option<&Value>,
    column: &str,
    delta: f64,
) -> Result<(f64, Value)> {
    let record = record_for_field(key, current)?;
    let base = match record.and_then(|r| r.get(column)) {
        None => 0.0,
        Some(text) => parse_double_strict(text).ok_or_else(|| {
            Error::type_mismatch(key, format!("column {:?} holds {:?}", column, text))
        })?,
    };
    let next = base + delta;
    if !next.is_finite() {
        return Err(Error::type_mismatch(key, "result is not finite"));
    }
    let mut updated = record.cloned().unwrap_or_default();
    updated.set(column, next.to_string());
    Ok((next, Value::Record(updated)))
}
