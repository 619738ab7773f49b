//! Query description
//!
//! A [`Query`] is plain data: conditions (ANDed), an optional sort, an
//! offset/limit window and row-shape options. Running it is the store's
//! job; the same query may be run any number of times.

use tansu_core::Result;

use crate::condition::Condition;
use crate::operator::{Direction, Operator};

/// Sort order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// Column to sort by (`""` for the primary key)
    pub column: String,
    /// Lexical or numeric, ascending or descending
    pub direction: Direction,
}

/// A table query
///
/// # Example
///
/// ```ignore
/// let q = Query::new()
///     .add("age", Operator::NumGe, "45")
///     .order_by("age", Direction::NumDesc)
///     .limit(10);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    conditions: Vec<Condition>,
    order: Option<OrderBy>,
    offset: usize,
    limit: Option<usize>,
    keys_only: bool,
    no_pk: bool,
}

impl Query {
    /// Empty query: matches every record
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a positive condition
    pub fn add(mut self, column: impl Into<String>, op: Operator, operand: impl Into<String>) -> Self {
        self.conditions.push(Condition::new(column, op, operand));
        self
    }

    /// Add a condition naming the operator by string (`"numgt"`, `"bw"`, ...)
    pub fn add_named(
        self,
        column: impl Into<String>,
        op: &str,
        operand: impl Into<String>,
    ) -> Result<Self> {
        Ok(self.add(column, op.parse()?, operand))
    }

    /// Add a fully specified condition
    pub fn add_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Sort results by `column`
    pub fn order_by(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.order = Some(OrderBy {
            column: column.into(),
            direction,
        });
        self
    }

    /// Return at most `max` rows
    pub fn limit(mut self, max: usize) -> Self {
        self.limit = Some(max);
        self
    }

    /// Skip the first `n` rows
    pub fn offset(mut self, n: usize) -> Self {
        self.offset = n;
        self
    }

    /// Yield primary keys only, without resolving records
    pub fn keys_only(mut self, on: bool) -> Self {
        self.keys_only = on;
        self
    }

    /// Leave the primary key out of returned rows
    pub fn no_pk(mut self, on: bool) -> Self {
        self.no_pk = on;
        self
    }

    /// Conditions in insertion order
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Sort order
    pub fn ordering(&self) -> Option<&OrderBy> {
        self.order.as_ref()
    }

    /// Rows skipped
    pub fn skip(&self) -> usize {
        self.offset
    }

    /// Row cap
    pub fn max_rows(&self) -> Option<usize> {
        self.limit
    }

    /// True if rows carry keys only
    pub fn is_keys_only(&self) -> bool {
        self.keys_only
    }

    /// True if rows omit the primary key
    pub fn is_no_pk(&self) -> bool {
        self.no_pk
    }
}
